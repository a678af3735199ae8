//! HTTP and WebSocket interface
//!
//! Thin layer over [`AppContext`](crate::state::AppContext): handlers
//! decode requests, call the player, queue, catalog or scanner, and map
//! errors to status codes.

pub mod handlers;
pub mod server;
pub mod websocket;

pub use server::{create_router, run};
