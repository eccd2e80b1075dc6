//! CLI command implementations

pub mod guarded;
pub mod init;
pub mod lock;
pub mod status;
pub mod sync;
