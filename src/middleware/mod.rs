pub mod auth;
pub mod extract;
pub mod internal;
pub mod response;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use extract::{JsonBody, PathParams, QueryParams};
pub use internal::{internal_key_middleware, INTERNAL_KEY_HEADER};
pub use response::{ApiResponse, ApiResult};
