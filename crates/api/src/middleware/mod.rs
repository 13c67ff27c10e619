//! Request extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated practitioner from a JWT Bearer token.

pub mod auth;
