// handlers/public/mod.rs - No authentication required
//
// Token acquisition: the only routes that talk to the identity provider
// without a bearer token.

pub mod auth;

pub use auth::{login, register};
