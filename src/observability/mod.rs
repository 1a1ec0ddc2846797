//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! payments / blockchain produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint
//! ```

pub mod logging;
pub mod metrics;
