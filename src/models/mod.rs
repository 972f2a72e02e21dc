//! Data Models Module
//!
//! Identity and profile entities, session token types, and the request/response
//! payloads of the HTTP API.

pub mod auth;
pub mod identity;
pub mod profile;
pub mod requests;

// Re-export commonly used types
pub use auth::*;
pub use identity::*;
pub use profile::*;
pub use requests::*;
