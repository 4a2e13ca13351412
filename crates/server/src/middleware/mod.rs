//! HTTP middleware and request extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, HTTP transaction)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (correlation id in span, Sentry scope and response)
//!
//! Actor identity is resolved per handler with the extractors in [`actor`].

pub mod actor;
pub mod request_id;

pub use actor::{AdminActor, CurrentUser, RequireAdmin};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
