pub mod residents;
pub mod resources;
pub mod rsvp;
pub mod session;

pub use resources::Resource;
pub use session::{resolve_context, resolve_role, AuthContext, Profile};
