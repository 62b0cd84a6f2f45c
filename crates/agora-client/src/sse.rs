//! Turn stream framing and record decoding.
//!
//! `POST /game/turn` answers with a chunked body of blank-line-delimited
//! records (`event: <name>` / `data: <json>`). Chunk boundaries never align
//! with record boundaries, so [`FrameParser`] reassembles whole blocks from
//! arbitrary byte slices, and [`EventDecoder`] turns each block into a
//! [`TurnEvent`], dropping anything malformed without aborting the stream.

use log::{debug, warn};

use agora_protocol::TurnEvent;

/// Record separator: one blank line between records.
const BLOCK_DELIMITER: &str = "\n\n";

/// Incremental reassembler for blank-line-delimited event blocks.
///
/// Owns a raw byte tail (a UTF-8 sequence may be split across chunks, so
/// decoding is stateful) and a growing text buffer. Emitted blocks depend
/// only on the underlying byte sequence, never on how it was chunked.
#[derive(Debug, Default)]
pub struct FrameParser {
    /// Bytes not yet decoded; at most one incomplete UTF-8 sequence.
    tail: Vec<u8>,
    /// Decoded text that has not yet formed a complete block.
    buffer: String,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and collect every block it completes, in order.
    ///
    /// The trailing piece after the last delimiter is retained: it may be an
    /// incomplete record that the next chunk finishes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.tail.extend_from_slice(chunk);
        self.decode_tail();
        self.drain_blocks()
    }

    /// Signal end of stream.
    ///
    /// A response may end without a trailing blank line; a non-blank retained
    /// buffer is then one final block.
    pub fn finish(&mut self) -> Option<String> {
        if !self.tail.is_empty() {
            // Whatever is left can no longer be completed; decode it lossily.
            self.buffer.push_str(&String::from_utf8_lossy(&self.tail));
            self.tail.clear();
        }
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    /// Move every complete UTF-8 prefix of `tail` into the text buffer,
    /// keeping only a trailing incomplete sequence as undecoded bytes.
    fn decode_tail(&mut self) {
        let mut rest = self.tail.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    self.buffer.push_str(s);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    if let Ok(s) = std::str::from_utf8(valid) {
                        self.buffer.push_str(s);
                    }
                    match e.error_len() {
                        // Invalid bytes in the middle: substitute and move on.
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }
        self.tail = rest.to_vec();
    }

    fn drain_blocks(&mut self) -> Vec<String> {
        let mut blocks = Vec::new();
        while let Some(pos) = self.buffer.find(BLOCK_DELIMITER) {
            let block = self.buffer[..pos].to_string();
            self.buffer.drain(..pos + BLOCK_DELIMITER.len());
            blocks.push(block);
        }
        blocks
    }
}

/// Split one block into its `event:` name and `data:` payload lines.
///
/// Returns `None` when either line is missing or empty after trimming —
/// such blocks are protocol comments or keep-alives, not errors.
pub fn parse_record(block: &str) -> Option<(String, String)> {
    let mut event = String::new();
    let mut data = String::new();
    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            data = rest.trim().to_string();
        }
    }
    if event.is_empty() || data.is_empty() {
        return None;
    }
    Some((event, data))
}

/// Decoder from raw blocks to [`TurnEvent`]s, counting what it drops.
///
/// A payload that is not valid JSON, or does not match the shape its event
/// name promises, drops that block only; the count is exposed so callers can
/// log it after the stream ends.
#[derive(Debug, Default)]
pub struct EventDecoder {
    dropped: u64,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks dropped so far because their payload was malformed.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Decode one block, or `None` for keep-alives, unknown event names, and
    /// malformed payloads.
    pub fn decode_block(&mut self, block: &str) -> Option<TurnEvent> {
        let (name, data) = parse_record(block)?;

        let payload: serde_json::Value = match serde_json::from_str(&data) {
            Ok(v) => v,
            Err(e) => {
                self.dropped += 1;
                warn!("dropping stream record '{name}' with unparseable payload: {e}");
                return None;
            }
        };

        match TurnEvent::decode(&name, payload) {
            Ok(Some(event)) => Some(event),
            Ok(None) => {
                debug!("ignoring stream record '{name}'");
                None
            }
            Err(e) => {
                self.dropped += 1;
                warn!("dropping stream record '{name}' with mismatched payload: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(parser: &mut FrameParser, chunks: &[&[u8]]) -> Vec<String> {
        let mut blocks = Vec::new();
        for chunk in chunks {
            blocks.extend(parser.push(chunk));
        }
        blocks.extend(parser.finish());
        blocks
    }

    #[test]
    fn test_blocks_do_not_depend_on_chunk_boundaries() {
        let body = "event: message_delta\ndata: {\"delta\": \"Ho\"}\n\n\
                    event: message_delta\ndata: {\"delta\": \"la\"}\n\n\
                    event: message\ndata: {\"message\": {\"author\": \"X\", \"content\": \"Hola\"}}\n\n";
        let bytes = body.as_bytes();

        let mut whole = FrameParser::new();
        let expected = collect(&mut whole, &[bytes]);
        assert_eq!(expected.len(), 3);

        // Re-feed the same bytes under several chunkings, including one byte
        // at a time; the emitted blocks must be identical.
        for size in [1, 2, 3, 7, 16, 64] {
            let chunks: Vec<&[u8]> = bytes.chunks(size).collect();
            let mut parser = FrameParser::new();
            assert_eq!(collect(&mut parser, &chunks), expected, "chunk size {size}");
        }
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        // "ñ" is two bytes; split in the middle of it.
        let body = "event: message_delta\ndata: {\"delta\": \"señal\"}\n\n".as_bytes();
        let split = body.iter().position(|&b| b == 0xc3).unwrap() + 1;

        let mut parser = FrameParser::new();
        let mut blocks = parser.push(&body[..split]);
        blocks.extend(parser.push(&body[split..]));

        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains("señal"));
    }

    #[test]
    fn test_trailing_block_without_final_delimiter() {
        let mut parser = FrameParser::new();
        let blocks = parser.push(b"event: a\ndata: {}\n\nevent: b\ndata: {}");
        assert_eq!(blocks.len(), 1);

        let last = parser.finish().expect("trailing block");
        assert!(last.contains("event: b"));
    }

    #[test]
    fn test_blank_remainder_is_not_emitted() {
        let mut parser = FrameParser::new();
        let blocks = parser.push(b"event: a\ndata: {}\n\n\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(parser.finish(), None);
    }

    #[test]
    fn test_no_partial_block_is_ever_emitted() {
        let mut parser = FrameParser::new();
        assert!(parser.push(b"event: message_delta\n").is_empty());
        assert!(parser.push(b"data: {\"delta\": \"x\"}").is_empty());
        let blocks = parser.push(b"\n\n");
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn test_parse_record_trims_labels() {
        let (name, data) = parse_record("event:  message \ndata:  {\"x\": 1} ").unwrap();
        assert_eq!(name, "message");
        assert_eq!(data, "{\"x\": 1}");
    }

    #[test]
    fn test_parse_record_requires_both_lines() {
        assert_eq!(parse_record("event: message"), None);
        assert_eq!(parse_record("data: {}"), None);
        assert_eq!(parse_record(": comment line"), None);
        assert_eq!(parse_record(""), None);
    }

    #[test]
    fn test_decoder_counts_malformed_payloads_and_continues() {
        let mut decoder = EventDecoder::new();

        assert!(
            decoder
                .decode_block("event: message_delta\ndata: {not json")
                .is_none()
        );
        assert_eq!(decoder.dropped(), 1);

        // The next record still decodes.
        let ev = decoder.decode_block("event: message_delta\ndata: {\"delta\": \"ok\"}");
        assert_eq!(ev, Some(TurnEvent::Delta("ok".to_string())));
        assert_eq!(decoder.dropped(), 1);
    }

    #[test]
    fn test_decoder_ignores_unknown_events_without_counting() {
        let mut decoder = EventDecoder::new();
        assert!(decoder.decode_block("event: ping\ndata: {}").is_none());
        assert_eq!(decoder.dropped(), 0);
    }
}
