//! Middleware stack for the handler.
//!
//! Layer order (outermost first):
//! Request → Tracing → CORS → CatchPanic → BodyLimit → per-route Timeout → Handler

pub mod cors;
pub mod metrics;
pub mod panic;
pub mod timeout;
pub mod tracing;

pub use cors::create_cors_layer;
pub use metrics::{HandlerStats, RequestTimer};
pub use panic::create_panic_layer;
pub use timeout::TimeoutLayer;
pub use tracing::TracingLayer;
