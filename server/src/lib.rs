//! HTTP surface of the TixGo reservation core.
//!
//! Exposes the router and app wiring as a library so integration tests can
//! boot the full stack in-process; the `tixgo` binary is a thin `main`.

#![forbid(unsafe_code)]

pub mod app;
pub mod config;
pub mod dto;
pub mod error;
pub mod etag;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use app::App;
pub use config::Config;
pub use routes::build_router;
pub use state::AppState;
