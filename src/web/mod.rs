//! Web interface module
//!
//! A thin HTTP surface over [`Social`](crate::social::Social). Sign-up and
//! login are open; every other request authenticates with a bearer token.
//! Everything but a failed authentication is reported in the
//! `{ "success", "result" }` envelope with status 200.

mod handlers;
mod server;

pub use handlers::{ApiResponse, AppState};
pub use server::{router, run_web_server};
