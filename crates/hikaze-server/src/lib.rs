//! Hikaze HTTP server - REST backend for the model manager UI.
//!
//! A thin axum layer over [`hikaze_core::HikazeApi`]. All catalog logic
//! lives in the core; handlers only decode requests, call the API and shape
//! JSON responses.

mod error;
mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{bind, router, start_server, AppState};
