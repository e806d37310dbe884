//! Record parser: splits a raw chunk into newline-delimited JSON records.
//!
//! A chunk that ends mid-record is not consumed past its last complete line;
//! the trailing bytes are re-read on the next poll once the producer has
//! finished the write. A complete line that fails to parse or validate is
//! yielded as a rejection so the caller can advance the offset past it:
//! one bad record must not stall the pipeline.

use crate::message::{Message, OffsetRange};

#[derive(Debug)]
pub(crate) enum ParsedItem {
    Record(Message),
    Rejected { span: OffsetRange, reason: String },
}

#[derive(Debug)]
pub(crate) struct ParsedBatch {
    /// records and rejections, in arrival order
    pub(crate) items: Vec<ParsedItem>,
    /// bytes of the chunk covered by complete lines; anything beyond this is
    /// a partial trailing record held back for the next poll
    pub(crate) consumed: u64,
}

pub(crate) fn parse_chunk(chunk: &[u8], base_offset: u64) -> ParsedBatch {
    let mut items = Vec::new();
    let mut pos = 0usize;

    while let Some(newline) = chunk[pos..].iter().position(|&b| b == b'\n') {
        let line_end = pos + newline;
        let line = &chunk[pos..line_end];
        let span = OffsetRange {
            start: base_offset + pos as u64,
            end: base_offset + line_end as u64 + 1,
        };

        if !line.trim_ascii().is_empty() {
            let item = match Message::from_line(line, span) {
                Ok(message) => ParsedItem::Record(message),
                Err(reason) => ParsedItem::Rejected { span, reason },
            };
            items.push(item);
        }

        pos = line_end + 1;
    }

    ParsedBatch {
        items,
        consumed: pos as u64,
    }
}
