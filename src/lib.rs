//! # typed-fetch - typed request/response pipeline over a pluggable HTTP transport
//!
//! `typed-fetch` wraps a single network call in a uniform contract: every call returns
//! `Result<Value, TypedError>`, whatever went wrong. URL construction, body encoding,
//! response parsing, schema validation, error classification, retries and lifecycle
//! hooks are handled by one pipeline around an injected [`Transport`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use typed_fetch::{typed_fetch, typed_fetch_as, FetchOptions, RetryPolicy, SerdeSchema};
//! use http::Method;
//!
//! #[derive(Serialize, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), typed_fetch::TypedError> {
//!     let options = FetchOptions::new()
//!         .host("https://api.example.com")
//!         .retry(RetryPolicy::new(3).delay_ms(100));
//!
//!     // Typed GET request
//!     let user: User = typed_fetch_as("users/123", &options).await?;
//!     println!("User: {}", user.name);
//!
//!     // POST with a JSON payload, validated against a schema
//!     let created = typed_fetch(
//!         "users",
//!         &options
//!             .clone()
//!             .method(Method::POST)
//!             .payload(&serde_json::json!({ "name": "Alice" }))
//!             .response_schema(SerdeSchema::<User>::new()),
//!     )
//!     .await?;
//!     println!("Created: {created}");
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Closed error taxonomy** - every failure is a [`TypedError`] with an [`ErrorKind`]
//! - **Schema validation** - any [`Schema`] implementation, with path-qualified issues
//! - **Retries** - fixed, exponential or custom delays, retryable kinds and conditions
//! - **Cancellation** - external cancellation tokens composed with per-attempt timeouts
//! - **Hooks** - `on_request`, `response_is_valid`, `on_response` and `on_error`
//! - **Logging** - structured `tracing` diagnostics plus a pluggable per-attempt [`Logger`]
//! - **Pluggable transport** - `reqwest` by default, anything implementing [`Transport`]
//!
//! ## Error Handling
//!
//! ```no_run
//! use typed_fetch::{typed_fetch, ErrorKind, FetchOptions};
//!
//! # async fn example() {
//! let options = FetchOptions::new().host("https://api.example.com");
//!
//! match typed_fetch("endpoint", &options).await {
//!     Ok(value) => println!("Success: {value}"),
//!     Err(e) => match e.kind {
//!         ErrorKind::RequestError => eprintln!("HTTP {}: {:?}", e.status, e.response),
//!         ErrorKind::ResponseValidationError => eprintln!("Unexpected body:\n{}", e.message),
//!         ErrorKind::Timeout | ErrorKind::NetworkOrCorsError => eprintln!("Transient: {e}"),
//!         kind => eprintln!("{kind}: {e}"),
//!     },
//! }
//! # }
//! ```

pub mod body;
pub mod config;
pub mod error;
pub mod hooks;
pub mod logger;
mod options;
mod pipeline;
pub mod retry;
pub mod signal;
pub mod transport;
pub mod url_builder;
pub mod validation;

pub use body::{FilePart, FormData, FormSpec, FormValue};
pub use error::{ErrorKind, Result, TypedError};
pub use logger::{LogOptions, Logger, TracingLogger};
pub use options::FetchOptions;
pub use pipeline::{typed_fetch, typed_fetch_as, typed_fetch_text};
pub use retry::{RetryDelay, RetryPolicy};
pub use transport::{ReqwestTransport, Transport};
pub use url_builder::PathOrUrl;
pub use validation::{Schema, SerdeSchema};
