pub mod auth;
pub mod rate_limit;
pub mod security;

pub use auth::{AuthLayer, AuthMiddleware, AuthenticatedUser};
pub use rate_limit::{enforce_rate_limit, ip_rate_limiter, IpRateLimiter};
pub use security::with_security_headers;
