pub mod cave;
pub mod config;
pub mod error;

pub use config::{Config, ConfigFile, PathOverrides, Task};
pub use error::{CaveError, Result};
