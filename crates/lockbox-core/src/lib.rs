pub mod config;
pub mod error;

pub use config::LockboxConfig;
pub use error::{LockboxError, LockboxResult};
