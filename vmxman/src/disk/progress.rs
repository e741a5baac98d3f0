//! Progress reporting for long-running image creation.
//!
//! A [`Progress`] carries an optional callback receiving fractions in
//! `[0, 1]` and an optional cancellation token. Callbacks run synchronously on
//! the thread doing the work.

use tokio_util::sync::CancellationToken;
use vmxman_shared::errors::{VmxError, VmxResult};

type Callback<'a> = Box<dyn FnMut(f64) + 'a>;

/// Progress sink handed to extent and disk creation.
pub struct Progress<'a> {
    callback: Option<Callback<'a>>,
    cancel: Option<CancellationToken>,
    last: f64,
}

impl<'a> Progress<'a> {
    /// A reporter that drops every update.
    pub fn none() -> Self {
        Self {
            callback: None,
            cancel: None,
            last: 0.0,
        }
    }

    /// Report fractions to `callback`.
    pub fn new<F: FnMut(f64) + 'a>(callback: F) -> Self {
        Self {
            callback: Some(Box::new(callback)),
            cancel: None,
            last: 0.0,
        }
    }

    /// Abort the operation at the next chunk boundary once `token` is cancelled.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Forward `fraction` (clamped to `[0, 1]`) to the callback.
    ///
    /// Values below the last reported fraction are raised to it.
    pub fn report(&mut self, fraction: f64) {
        let fraction = if fraction.is_nan() {
            self.last
        } else {
            fraction.clamp(0.0, 1.0).max(self.last)
        };
        self.last = fraction;
        if let Some(callback) = self.callback.as_mut() {
            callback(fraction);
        }
    }

    /// Emit the terminal 100% event if anyone is listening.
    pub fn finish(&mut self) {
        if self.has_callback() {
            self.report(1.0);
        }
    }

    /// Fail with [`VmxError::Cancelled`] if cancellation was requested.
    pub fn check_cancelled(&self) -> VmxResult<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(VmxError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Sub-reporter covering slice `index` of `count` equal slices.
    ///
    /// A sub-fraction `f` is forwarded as `(index + f) / count`.
    pub fn slice(&mut self, index: usize, count: usize) -> Progress<'_> {
        let cancel = self.cancel.clone();
        if self.callback.is_none() {
            return Progress {
                callback: None,
                cancel,
                last: 0.0,
            };
        }

        let count = count.max(1) as f64;
        let base = index as f64;
        Progress {
            callback: Some(Box::new(move |fraction: f64| {
                self.report((base + fraction) / count);
            })),
            cancel,
            last: 0.0,
        }
    }
}

impl Default for Progress<'_> {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("has_callback", &self.callback.is_some())
            .field("cancellable", &self.cancel.is_some())
            .field("last", &self.last)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_clamps_and_is_monotonic() {
        let mut seen = Vec::new();
        {
            let mut progress = Progress::new(|f| seen.push(f));
            progress.report(0.5);
            progress.report(0.25);
            progress.report(1.5);
            progress.report(-1.0);
        }
        assert_eq!(seen, vec![0.5, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_slice_remaps_into_parent_range() {
        let mut seen = Vec::new();
        {
            let mut progress = Progress::new(|f| seen.push(f));
            {
                let mut first = progress.slice(0, 4);
                first.report(0.5);
                first.report(1.0);
            }
            {
                let mut third = progress.slice(2, 4);
                third.report(0.5);
            }
        }
        assert_eq!(seen, vec![0.125, 0.25, 0.625]);
    }

    #[test]
    fn test_finish_without_callback_is_silent() {
        let mut progress = Progress::none();
        progress.finish();
        assert!(!progress.has_callback());
    }

    #[test]
    fn test_cancellation() {
        let token = CancellationToken::new();
        let progress = Progress::none().with_cancel(token.clone());
        assert!(progress.check_cancelled().is_ok());

        token.cancel();
        assert!(matches!(progress.check_cancelled(), Err(VmxError::Cancelled)));
    }

    #[test]
    fn test_slice_inherits_cancellation() {
        let token = CancellationToken::new();
        let mut progress = Progress::none().with_cancel(token.clone());
        token.cancel();
        let sub = progress.slice(1, 3);
        assert!(sub.check_cancelled().is_err());
    }
}
