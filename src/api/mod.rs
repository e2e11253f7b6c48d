//! HTTP API.
//!
//! Exposes report upload, viewing, sharing and analysis plus the account
//! operations as JSON endpoints. Routes are nested under `/api/` and
//! protected by a middleware stack: Auth → Audit → Handler.
//!
//! The router is composable: `build_router()` returns a `Router` that can
//! be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::build_router;
pub use server::{start_api_server, ApiServer, ApiServerInfo};
pub use types::{ApiContext, CurrentUser};
