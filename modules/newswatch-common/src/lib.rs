pub mod config;
pub mod error;
pub mod identity;
pub mod types;

pub use config::{Config, Limits};
pub use error::{NewsWatchError, StoreError};
pub use identity::story_identity;
pub use types::*;
