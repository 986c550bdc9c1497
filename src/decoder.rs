//! Newline-delimited JSON decoding for the chat stream.
//!
//! Bytes arrive with arbitrary boundaries. Complete lines are parsed as they
//! appear; the trailing fragment waits for the next read and is dropped if the
//! stream ends before its newline arrives.

use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use serde_json::Value;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one network read and returns every object completed by it.
    ///
    /// Lines are split on raw bytes before UTF-8 decoding, so a multi-byte
    /// character cut in half by a read boundary still decodes correctly.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Value> {
        self.buffer.extend_from_slice(bytes);

        let Some(last_newline) = self.buffer.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete
            .split(|b| *b == b'\n')
            .filter_map(parse_line)
            .collect()
    }

    /// Bytes still waiting for a newline.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

fn parse_line(raw: &[u8]) -> Option<Value> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(line) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(error = %err, line, "skipping malformed stream line");
            None
        }
    }
}

/// Turns a body byte stream into a stream of decoded objects.
///
/// Transport errors are forwarded and end the stream; malformed lines are not.
pub fn decode_stream<S, E>(input: S) -> impl Stream<Item = Result<Value, E>>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    stream::unfold(
        (Box::pin(input), LineDecoder::new(), VecDeque::new(), false),
        |(mut input, mut decoder, mut ready, failed)| async move {
            if failed {
                return None;
            }
            loop {
                if let Some(value) = ready.pop_front() {
                    return Some((Ok(value), (input, decoder, ready, false)));
                }

                match input.next().await {
                    Some(Ok(bytes)) => ready.extend(decoder.push(&bytes)),
                    Some(Err(err)) => return Some((Err(err), (input, decoder, ready, true))),
                    None => {
                        if !decoder.pending().iter().all(u8::is_ascii_whitespace) {
                            tracing::debug!(
                                bytes = decoder.pending().len(),
                                "discarding unterminated trailing line"
                            );
                        }
                        return None;
                    }
                }
            }
        },
    )
}
