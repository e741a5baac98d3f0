//! Errors raised while parsing descriptor extent lines.
//!
//! These are fatal for the descriptor being read and convert into
//! [`VmxError::Format`].

use thiserror::Error;
use vmxman_shared::errors::VmxError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtentLineError {
    #[error("unknown extent access '{0}'")]
    UnknownAccess(String),

    #[error("unknown extent type '{0}'")]
    UnknownType(String),

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("invalid {field} '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unterminated file name")]
    UnterminatedFileName,
}

impl From<ExtentLineError> for VmxError {
    fn from(err: ExtentLineError) -> Self {
        VmxError::Format(format!("extent line: {}", err))
    }
}
