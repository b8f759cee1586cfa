//! # Ganadero Core
//!
//! Foundational pieces shared by every crate of the ERP Ganadero offline
//! worker.
//!
//! ## Features
//!
//! - **Error Handling**: [`GanaderoError`] and the [`GanaderoResult`] alias
//! - **Configuration**: layered loading (defaults, TOML file, environment)
//! - **Observability**: `tracing` subscriber setup
//! - **HTTP snapshots**: owned [`Request`]/[`Response`] values that can be
//!   cached, queued and replayed independently of any HTTP client
//!
//! ## Quick Start
//!
//! ```rust
//! use ganadero_core::{GanaderoResult, Method, Request};
//!
//! fn build() -> GanaderoResult<Request> {
//!     Request::new(Method::Post, "/api/v1/cattle")
//!         .with_json(&serde_json::json!({ "tag": "MX-001" }))
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use config::Validate;
pub use error::{GanaderoError, GanaderoResult};
pub use http::{Headers, Method, Request, RequestMode, Response, ResponseKind};

/// Version information for the Ganadero Core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of the Ganadero Core library
pub const NAME: &str = env!("CARGO_PKG_NAME");
