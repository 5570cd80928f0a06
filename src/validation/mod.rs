//! Snapshot validation and the session error taxonomy

pub mod data;
pub mod error;

pub use data::{validate_network, NetworkIssue, NetworkValidation};
pub use error::LocalizationError;
