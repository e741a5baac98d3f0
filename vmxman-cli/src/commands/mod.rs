pub mod add_disk;
pub mod add_nic;
pub mod create;
pub mod info;
pub mod list;
pub mod rm;
pub mod status;
