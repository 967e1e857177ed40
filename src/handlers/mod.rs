// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (bearer token, role resolved per request)
// Admin-only operations live with the protected handlers and are gated by
// `require_admin` or the `AdminContext` extractor.

pub mod protected; // Bearer token required (/api/*)
pub mod public; // No authentication (/api/auth/register, /api/auth/login)
pub mod system; // /health, /api, unknown routes and panics
