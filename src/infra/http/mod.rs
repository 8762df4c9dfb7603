//! HTTP surface: routes, middleware and JSON error mapping.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use middleware::{ClientAddress, CurrentUser, MethodAccess, RequestContext};
pub use routes::{blog_policies, blog_registry, build_router};
pub use state::AppState;
