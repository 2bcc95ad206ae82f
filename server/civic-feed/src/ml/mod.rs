//! Clients for the external text-urgency and image-classification endpoints.

mod client;
pub mod response;

pub use client::{ImageClassifierClient, MlError, UrgencyModelClient};
pub use response::{ModelField, Verdict};
