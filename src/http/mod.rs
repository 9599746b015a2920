//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tower-http middleware)
//!     → server blob hooks (request blob)
//!     → proxy handler → client blob hooks → upstream
//!     → server blob hooks (response blob)
//!     → Send to client
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
