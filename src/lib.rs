// Obscura — Library root
//
// Re-exports the config, credentials, store, vault, gateway and CLI modules.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod deadline;
pub mod error;
pub mod gateway;
pub mod store;
pub mod vault;

pub use error::{ObscuraError, Result};
