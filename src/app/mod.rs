pub mod context;
pub mod error;

pub use context::{AppContext, Hydrated};
pub use error::{Result, SyncError};
