pub mod admin;
pub mod auth;
pub mod extract;
pub mod response;

pub use admin::{authorize_admin, require_admin, AdminContext};
pub use auth::{extract_bearer_token, require_authenticated};
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use response::{ApiResponse, ApiResult};
