//! Priority-ordered pattern router and middleware chain (component C1).

pub mod middleware;
pub mod pattern;
pub mod router;

pub use middleware::Middleware;
pub use pattern::Pattern;
pub use router::{Handler, Router};
