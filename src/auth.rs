//! Credential models shared by the store, dispatcher, and coordinator.

pub mod credential;
pub mod secret;

pub use credential::*;
pub use secret::*;
