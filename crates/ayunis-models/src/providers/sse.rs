use std::collections::VecDeque;

use futures_util::stream;
use reqwest::Response;
use serde_json::json;
use tracing::debug;

use super::common::map_transport_error;
use crate::error::ModelError;
use crate::handler::InferenceStream;
use crate::types::{ModelProvider, StreamInferenceChunk};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` decoder. Bytes are buffered until a full
/// line is available, so multi-byte characters split across network chunks
/// decode correctly.
#[derive(Debug, Default)]
pub(super) struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub(super) fn push(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>, ModelError> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line = self.buffer.drain(..=newline).collect::<Vec<_>>();
            let line = std::str::from_utf8(&line).map_err(|error| {
                ModelError::inference_failed(format!("stream contained invalid UTF-8: {error}"))
            })?;
            let line = line.trim_end_matches(&['\r', '\n'][..]);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Flushes a trailing event that was not followed by a blank line.
    pub(super) fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).to_string();
            if let Some(event) = self.process_line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.emit()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.emit();
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(data) = line.strip_prefix("data:") {
            self.data_lines.push(data.trim_start().to_string());
        } else if let Some(event) = line.strip_prefix("event:") {
            self.event = Some(event.trim().to_string());
        }
        None
    }

    fn emit(&mut self) -> Option<SseEvent> {
        if self.data_lines.is_empty() {
            self.event = None;
            return None;
        }
        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(SseEvent {
            event: self.event.take(),
            data,
        })
    }
}

/// Turns decoded vendor events into stream chunks. The parser emits the
/// terminal [`StreamInferenceChunk::Finished`] itself.
pub(super) trait SseEventParser: Send + 'static {
    fn on_event(&mut self, event: &SseEvent) -> Result<Vec<StreamInferenceChunk>, ModelError>;

    fn is_finished(&self) -> bool;
}

struct SseStreamState<P> {
    provider: ModelProvider,
    response: Option<Response>,
    decoder: SseDecoder,
    parser: P,
    pending: VecDeque<Result<StreamInferenceChunk, ModelError>>,
}

impl<P: SseEventParser> SseStreamState<P> {
    fn apply_events(&mut self, events: Vec<SseEvent>) {
        for event in events {
            match self.parser.on_event(&event) {
                Ok(chunks) => self.pending.extend(chunks.into_iter().map(Ok)),
                Err(error) => {
                    self.fail(error);
                    return;
                }
            }
            if self.parser.is_finished() {
                self.response = None;
                return;
            }
        }
    }

    fn fail(&mut self, error: ModelError) {
        self.pending.push_back(Err(error));
        self.response = None;
    }
}

/// Lazily reads `response` as server-sent events. The body is only read
/// while the consumer polls, and dropping the stream drops the response.
pub(super) fn sse_chunk_stream<P: SseEventParser>(
    provider: ModelProvider,
    response: Response,
    parser: P,
) -> InferenceStream {
    let state = SseStreamState {
        provider,
        response: Some(response),
        decoder: SseDecoder::default(),
        parser,
        pending: VecDeque::new(),
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            let next = match state.response.as_mut() {
                Some(response) => response.chunk().await,
                None => return None,
            };
            match next {
                Ok(Some(bytes)) => match state.decoder.push(&bytes) {
                    Ok(events) => state.apply_events(events),
                    Err(error) => state.fail(error),
                },
                Ok(None) => {
                    let trailing = state.decoder.finish().into_iter().collect::<Vec<_>>();
                    state.apply_events(trailing);
                    if !state.parser.is_finished() && state.response.is_some() {
                        debug!(provider = %state.provider, "stream closed before completion");
                        state.fail(
                            ModelError::inference_failed("stream ended before completion")
                                .with_metadata(json!({ "source": state.provider.as_str() })),
                        );
                    }
                    state.response = None;
                }
                Err(error) => {
                    let error = map_transport_error(state.provider, error);
                    state.fail(error);
                }
            }
        }
    }))
}
