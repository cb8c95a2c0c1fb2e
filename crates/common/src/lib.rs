//! Shared types for the federated session workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
