use tracing::{Level, Span};

use super::StreamId;

/// Root span for one quantized stream. Every push/update of that stream is
/// recorded inside it.
pub fn stream_span(name: &'static str, stream_id: &StreamId) -> Span {
    tracing::span!(
        Level::INFO,
        "stream",
        name = %name,
        stream_id = %stream_id
    )
}

/// Child span (inherits stream_id from the entered parent)
pub fn child_span(name: &'static str) -> Span {
    tracing::span!(Level::INFO, "child", name = %name)
}
