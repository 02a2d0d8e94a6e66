//! Incremental decoder for the relayed chat event stream.
//!
//! DESIGN
//! ======
//! A single network read may deliver half a line, several lines, or half a
//! UTF-8 character. The decoder keeps a text buffer across reads, extracts
//! complete `\n`-terminated lines, and turns `data: {json}` lines into text
//! fragments.
//!
//! When a `data:` payload fails to parse, the line is put back in front of
//! the buffer and extraction stops until the next chunk arrives. Lines that
//! still do not parse when the transport ends are dropped by [`StreamDecoder::finish`]
//! and counted in the returned [`DecodeSummary`].

use crate::parse_delta_content;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Classification of one complete stream line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamLine<'a> {
    /// Empty line or `:` comment (heartbeat).
    Ignored,
    /// Any line without the `data: ` prefix.
    Other,
    /// The terminator sentinel.
    Done,
    /// A data frame; payload has the prefix stripped and is trimmed.
    Data(&'a str),
}

impl<'a> StreamLine<'a> {
    /// Classify a line that has already had its `\n` and trailing `\r` removed.
    #[must_use]
    pub fn classify(line: &'a str) -> Self {
        if line.starts_with(':') || line.trim().is_empty() {
            return Self::Ignored;
        }
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return Self::Other;
        };
        let payload = payload.trim();
        if payload == DONE_SENTINEL { Self::Done } else { Self::Data(payload) }
    }
}

/// What was left over when the transport closed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    /// `true` when the terminator sentinel was seen.
    pub terminated: bool,
    /// Data lines that never became valid JSON and were discarded.
    pub dropped_lines: usize,
}

/// Stateful byte-stream to text-fragment decoder.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Decoded text not yet consumed as complete lines.
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    done: bool,
}

impl StreamDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once the terminator sentinel has been seen.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one transport chunk. Returns the non-empty text fragments it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.decode_utf8(chunk);
        self.drain_lines()
    }

    /// Process what is left after the transport ended.
    ///
    /// Makes one last pass over the buffered text, including a final line
    /// without a trailing newline. Lines that still fail to parse are skipped
    /// rather than put back.
    pub fn finish(&mut self) -> (Vec<String>, DecodeSummary) {
        let mut fragments = Vec::new();
        let mut dropped_lines = 0;

        if !self.done {
            if !self.pending.is_empty() {
                self.pending.clear();
                self.buffer.push(char::REPLACEMENT_CHARACTER);
            }
            let rest = std::mem::take(&mut self.buffer);
            for raw in rest.split('\n') {
                let line = raw.strip_suffix('\r').unwrap_or(raw);
                match StreamLine::classify(line) {
                    StreamLine::Ignored | StreamLine::Other => {}
                    StreamLine::Done => {
                        self.done = true;
                        break;
                    }
                    StreamLine::Data(payload) => match parse_delta_content(payload) {
                        Ok(Some(text)) if !text.is_empty() => fragments.push(text),
                        Ok(_) => {}
                        Err(_) => dropped_lines += 1,
                    },
                }
            }
        }

        self.buffer.clear();
        (fragments, DecodeSummary { terminated: self.done, dropped_lines })
    }

    fn drain_lines(&mut self) -> Vec<String> {
        let mut fragments = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }

            match StreamLine::classify(&line) {
                StreamLine::Ignored | StreamLine::Other => {}
                StreamLine::Done => {
                    self.done = true;
                    break;
                }
                StreamLine::Data(payload) => match parse_delta_content(payload) {
                    Ok(Some(text)) if !text.is_empty() => fragments.push(text),
                    Ok(_) => {}
                    Err(_) => {
                        // Incomplete frame: restore it and wait for more bytes.
                        line.push('\n');
                        self.buffer.insert_str(0, &line);
                        break;
                    }
                },
            }
        }

        fragments
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        let bytes = std::mem::take(&mut self.pending);
        let mut rest = bytes.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    // `valid` is guaranteed UTF-8 by `valid_up_to`.
                    self.buffer.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        None => {
                            self.pending = tail.to_vec();
                            return;
                        }
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod tests;
