//! Provider normalization pipeline for freeview-epg.
//!
//! Fetches per-channel schedules from the Sky, Freeview, Freesat,
//! RadioTimes and YouView APIs, normalizes them into [`Programme`] records,
//! removes duplicates and renders an XMLTV document.

/// Per-run memoization of upstream payloads.
pub mod cache;

/// Run-scoped state shared by adapters.
pub mod context;

/// Cross-channel duplicate removal.
pub mod dedupe;

/// Error types.
pub mod error;

/// HTTP transport with retry.
pub mod http;

/// Channel and programme records.
pub mod model;

/// Run orchestration.
pub mod pipeline;

/// Upstream schedule adapters.
pub mod providers;

/// Description cleanup.
pub mod text;

/// Timestamp and duration parsing.
pub mod time;

/// XMLTV rendering.
pub mod xmltv;

#[cfg(test)]
mod testing;

pub use context::RunContext;
pub use error::FetchError;
pub use http::{HttpClient, HttpFetch, LocalHttpFetch};
pub use model::{Channel, Programme};
pub use pipeline::build_guide;
