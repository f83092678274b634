//! Core constants, errors, value types, configuration and collaborator traits.

pub mod constants;
mod config;
mod error;
mod traits;
mod types;

pub use config::*;
pub use error::*;
pub use traits::*;
pub use types::*;
