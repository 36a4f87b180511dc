//! Server-Sent Events (SSE) processing for streamed completions.
//!
//! The service sends one `data: <json>` line per event, events separated by a blank line, and
//! finishes with `data: [DONE]`.  This module turns the raw byte stream of an HTTP response into
//! a stream of [`ChatCompletionChunk`]s.

use std::error;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_EVENTS};
use crate::types::ChatCompletionChunk;
use crate::{Error, Result};

/// Marker payload that ends the stream.
const DONE_MARKER: &str = "[DONE]";

/// A decoded SSE event.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Chunk(ChatCompletionChunk),
    Done,
    /// Comments, keep-alives and events without a data field.
    Skip,
}

struct SseState<S> {
    stream: S,
    buffer: Vec<u8>,
    finished: bool,
}

/// Process a stream of bytes into a stream of completion chunks.
///
/// The returned stream ends at the `[DONE]` marker or when the byte stream closes.  The first
/// transport or decoding error is yielded and ends the stream.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<ChatCompletionChunk>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: error::Error + Send + Sync + 'static,
{
    let state = SseState {
        stream: byte_stream,
        buffer: Vec::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            // First check if we have a complete event in the buffer
            if let Some(event_bytes) = take_event(&mut state.buffer) {
                match decode_event(&event_bytes) {
                    Ok(SseEvent::Chunk(chunk)) => {
                        STREAM_EVENTS.click();
                        return Some((Ok(chunk), state));
                    }
                    Ok(SseEvent::Done) => return None,
                    Ok(SseEvent::Skip) => continue,
                    Err(err) => {
                        STREAM_ERRORS.click();
                        state.finished = true;
                        return Some((Err(err), state));
                    }
                }
            }

            // Read more data
            match state.stream.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    state
                        .buffer
                        .extend(bytes.iter().copied().filter(|b| *b != b'\r'));
                }
                Some(Err(e)) => {
                    STREAM_ERRORS.click();
                    state.finished = true;
                    return Some((
                        Err(Error::streaming(
                            format!("Error in HTTP stream: {e}"),
                            Some(Box::new(e)),
                        )),
                        state,
                    ));
                }
                None => {
                    // End of stream; a final event may lack its blank line.
                    state.finished = true;
                    let rest = std::mem::take(&mut state.buffer);
                    return match decode_event(&rest) {
                        Ok(SseEvent::Chunk(chunk)) => {
                            STREAM_EVENTS.click();
                            Some((Ok(chunk), state))
                        }
                        Ok(SseEvent::Done) | Ok(SseEvent::Skip) => None,
                        Err(err) => {
                            STREAM_ERRORS.click();
                            Some((Err(err), state))
                        }
                    };
                }
            }
        }
    })
}

/// Removes the first complete event (terminated by a blank line) from the buffer.
fn take_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let mut event: Vec<u8> = buffer.drain(..end + 2).collect();
    event.truncate(end);
    Some(event)
}

/// Decodes the text of a single event.
fn decode_event(event_bytes: &[u8]) -> Result<SseEvent> {
    let event_text = std::str::from_utf8(event_bytes)?;

    // Multiple data lines are joined with newlines per the SSE format.
    let mut data: Option<String> = None;
    for line in event_text.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            }
        }
    }

    match data.as_deref().map(str::trim) {
        None | Some("") => Ok(SseEvent::Skip),
        Some(DONE_MARKER) => Ok(SseEvent::Done),
        Some(json) => serde_json::from_str::<ChatCompletionChunk>(json)
            .map(SseEvent::Chunk)
            .map_err(|e| {
                Error::serialization(
                    format!("Failed to parse event JSON: {e}"),
                    Some(Box::new(e)),
                )
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn byte_stream(
        parts: Vec<&'static str>,
    ) -> impl Stream<Item = std::result::Result<Bytes, io::Error>> + Unpin {
        stream::iter(
            parts
                .into_iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect_texts(parts: Vec<&'static str>) -> Vec<Result<String>> {
        let stream = process_sse(byte_stream(parts));
        futures::pin_mut!(stream);
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item.map(|chunk| chunk.content().unwrap_or_default().to_string()));
        }
        out
    }

    #[test]
    fn decode_done_marker() {
        assert_eq!(decode_event(b"data: [DONE]").unwrap(), SseEvent::Done);
    }

    #[test]
    fn decode_comment_is_skipped() {
        assert_eq!(decode_event(b": keep-alive").unwrap(), SseEvent::Skip);
        assert_eq!(decode_event(b"").unwrap(), SseEvent::Skip);
    }

    #[test]
    fn decode_malformed_json_is_error() {
        let err = decode_event(b"data: {not json").unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    #[test]
    fn take_event_leaves_remainder() {
        let mut buffer = b"data: a\n\ndata: b".to_vec();
        assert_eq!(take_event(&mut buffer).unwrap(), b"data: a".to_vec());
        assert_eq!(buffer, b"data: b".to_vec());
        assert!(take_event(&mut buffer).is_none());
    }

    #[tokio::test]
    async fn events_split_across_reads() {
        let texts = collect_texts(vec![
            "data: {\"choices\":[{\"delta\":{\"con",
            "tent\":\"Hel\"}}]}\n",
            "\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;
        let texts: Vec<String> = texts.into_iter().map(|t| t.unwrap()).collect();
        assert_eq!(texts, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[tokio::test]
    async fn nothing_after_done_is_yielded() {
        let texts = collect_texts(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\ndata: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
        ])
        .await;
        assert_eq!(texts.len(), 1);
    }

    #[tokio::test]
    async fn crlf_delimiters_are_accepted() {
        let texts = collect_texts(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\r\n\r\ndata: [DONE]\r\n\r\n",
        ])
        .await;
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].as_deref().unwrap(), "x");
    }

    #[tokio::test]
    async fn trailing_event_without_blank_line() {
        let texts =
            collect_texts(vec!["data: {\"choices\":[{\"delta\":{\"content\":\"end\"}}]}"]).await;
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].as_deref().unwrap(), "end");
    }

    #[tokio::test]
    async fn multibyte_character_split_across_reads() {
        let parts: Vec<std::result::Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"caf\xc3",
            )),
            Ok(Bytes::from_static(b"\xa9\"}}]}\n\n")),
        ];
        let stream = process_sse(stream::iter(parts));
        futures::pin_mut!(stream);
        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk.content(), Some("café"));
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let parts: Vec<std::result::Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            )),
            Err(io::Error::other("reset by peer")),
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
            )),
        ];
        let stream = process_sse(stream::iter(parts));
        futures::pin_mut!(stream);
        assert!(stream.next().await.unwrap().is_ok());
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Streaming { .. }));
        assert!(stream.next().await.is_none());
    }
}
