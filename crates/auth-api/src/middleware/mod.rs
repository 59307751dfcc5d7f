pub mod audit;
pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use audit::audit_middleware;
pub use auth::jwt_auth;
pub use rate_limit::{rate_limit_middleware, RateLimiter};
pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};
pub use security_headers::security_headers_middleware;
