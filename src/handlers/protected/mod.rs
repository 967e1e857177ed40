// handlers/protected/mod.rs - Bearer token required
//
// Every route here sits behind `require_authenticated`, so handlers can take
// `AuthContext` (or `AdminContext` for admin-only methods) as an extractor.

pub mod auth; // Current user: profile and password
pub mod events; // RSVP on top of the generic resource handlers
pub mod residents; // Resident records and directory
pub mod resources; // Generic list/show/create/update/delete over `Resource`
