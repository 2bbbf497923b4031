//! Streaming pipeline: Responses API SSE bytes in, Chat Completions SSE bytes out.

use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::logging::{JournalLevel, SharedJournal};
use crate::translate::chat_types::ChatCompletionChunk;
use crate::translate::responses_types::ResponseStreamEvent;
use crate::translate::streaming::StreamAggregator;

const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// Encode one chunk as an SSE `data:` frame.
pub fn encode_chunk(chunk: &ChatCompletionChunk) -> Option<Bytes> {
    match serde_json::to_string(chunk) {
        Ok(json) => Some(Bytes::from(format!("data: {json}\n\n"))),
        Err(e) => {
            warn!(error = %e, "Failed to encode chat chunk");
            None
        }
    }
}

/// Parse a Responses API SSE byte stream and translate it into Chat Completions SSE frames.
///
/// The output always ends with the usage chunk, the finish chunk and `data: [DONE]`,
/// even when the upstream stops early or the byte stream fails.
pub fn responses_sse_to_chat_sse<S, B, E>(
    byte_stream: S,
    model: String,
    journal: Option<SharedJournal>,
) -> impl Stream<Item = Bytes> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let mut aggregator = StreamAggregator::new(&model);
        let events = byte_stream.eventsource();
        tokio::pin!(events);

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "Upstream SSE stream error");
                    break;
                }
            };

            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                break;
            }

            let mut parsed: ResponseStreamEvent = match serde_json::from_str(data) {
                Ok(p) => p,
                Err(e) => {
                    debug!(error = %e, event = %event.event, "Skipping unparseable stream event");
                    continue;
                }
            };
            if parsed.event_type.is_empty() && !event.event.is_empty() && event.event != "message" {
                parsed.event_type = event.event.clone();
            }

            for chunk in aggregator.process_event(&parsed) {
                if let Some(frame) = encode_chunk(&chunk) {
                    yield frame;
                }
            }
        }

        for chunk in aggregator.finish() {
            if let Some(frame) = encode_chunk(&chunk) {
                yield frame;
            }
        }
        yield Bytes::from_static(DONE_FRAME);

        let summary = aggregator.summary();
        info!(
            response_id = %summary.response_id,
            completed = summary.completed,
            tool_calls = summary.tool_calls,
            "Stream translated"
        );
        if let Some(journal) = journal {
            let level = if summary.completed {
                JournalLevel::Info
            } else {
                JournalLevel::Warn
            };
            let context = serde_json::to_value(&summary).unwrap_or_default();
            journal.record_with_context(level, "stream", "Stream translated", context);
        }
    }
}
