//! The message read from the live data file and passed through the pipeline
//! until it has been committed to both sinks. A [Message] is created by the
//! parser, enriched with a [Sentiment] by the scorer, and destroyed once the
//! offset store has acknowledged its end offset.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::Deserialize;

/// Byte span of a record in the source file. Spans are monotonically
/// non-decreasing across records and never overlap a committed span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetRange {
    pub start: u64,
    /// End of the record, including its trailing newline. This is the value
    /// the offset store advances to when the record commits.
    pub end: u64,
}

impl fmt::Display for OffsetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A parsed and validated record from the source file.
#[derive(Debug, Clone)]
pub struct Message {
    /// required text field of the producer's JSON object
    pub text: String,
    /// optional producer fields, carried through to both sinks
    pub author: Option<String>,
    pub category: Option<String>,
    pub keyword_mentioned: Option<String>,
    /// producer timestamp when present and parseable, parse time otherwise
    pub event_time: DateTime<Utc>,
    /// originating byte span in the source file
    pub offset: OffsetRange,
    /// raw line as read from the source
    pub value: Bytes,
}

/// Wire shape of one producer record. Only `message` is required; everything
/// else is best-effort enrichment metadata.
#[derive(Debug, Deserialize)]
struct RawRecord {
    message: Option<String>,
    author: Option<String>,
    timestamp: Option<String>,
    category: Option<String>,
    keyword_mentioned: Option<String>,
}

impl Message {
    /// Convert one complete line into a [Message]. The error string is the
    /// rejection reason; rejected records are skipped with their offset still
    /// advanced, they never block the stream.
    pub(crate) fn from_line(
        line: &[u8],
        offset: OffsetRange,
    ) -> std::result::Result<Self, String> {
        let raw: RawRecord = serde_json::from_slice(line)
            .map_err(|e| format!("malformed record: {e}"))?;

        let Some(text) = raw.message else {
            return Err("record is missing the required \"message\" text field".to_string());
        };

        let event_time = raw
            .timestamp
            .as_deref()
            .and_then(parse_event_time)
            .unwrap_or_else(Utc::now);

        Ok(Message {
            text,
            author: raw.author,
            category: raw.category,
            keyword_mentioned: raw.keyword_mentioned,
            event_time,
            offset,
            value: Bytes::copy_from_slice(line),
        })
    }
}

fn parse_event_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // the producer writes "2025-01-29 14:35:20" style timestamps
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Sentiment classification of a message's text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sentiment {
    pub label: SentimentLabel,
    /// bounded score in [-1.0, 1.0]
    pub score: f64,
}

impl Sentiment {
    /// The defined default returned when scoring cannot be computed.
    /// Scoring never aborts the pipeline.
    pub fn neutral() -> Self {
        Sentiment {
            label: SentimentLabel::Neutral,
            score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "positive"),
            SentimentLabel::Neutral => write!(f, "neutral"),
            SentimentLabel::Negative => write!(f, "negative"),
        }
    }
}

/// A [Message] plus its computed sentiment. Immutable once created and
/// dropped after a successful commit.
#[derive(Debug, Clone)]
pub struct EnrichedMessage {
    pub message: Message,
    pub sentiment: Sentiment,
}

impl EnrichedMessage {
    pub fn new(message: Message, sentiment: Sentiment) -> Self {
        EnrichedMessage { message, sentiment }
    }
}

/// The durable representation of an [EnrichedMessage], identical in the
/// relational table and the flat append log.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkRow {
    /// unique key: the record's end offset in the source file
    pub offset: u64,
    pub message: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub keyword_mentioned: Option<String>,
    pub sentiment_label: String,
    pub sentiment_score: f64,
    pub timestamp: String,
}

impl From<&EnrichedMessage> for SinkRow {
    fn from(enriched: &EnrichedMessage) -> Self {
        SinkRow {
            offset: enriched.message.offset.end,
            message: enriched.message.text.clone(),
            author: enriched.message.author.clone(),
            category: enriched.message.category.clone(),
            keyword_mentioned: enriched.message.keyword_mentioned.clone(),
            sentiment_label: enriched.sentiment.label.to_string(),
            sentiment_score: enriched.sentiment.score,
            timestamp: enriched
                .message
                .event_time
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_line_parses_full_record() {
        let line = br#"{"message":"I just shared a meme!","author":"Charlie","timestamp":"2025-01-29 14:35:20","category":"humor","keyword_mentioned":"meme"}"#;
        let offset = OffsetRange { start: 0, end: line.len() as u64 + 1 };
        let message = Message::from_line(line, offset).unwrap();
        assert_eq!(message.text, "I just shared a meme!");
        assert_eq!(message.author.as_deref(), Some("Charlie"));
        assert_eq!(message.category.as_deref(), Some("humor"));
        assert_eq!(message.keyword_mentioned.as_deref(), Some("meme"));
        assert_eq!(
            message.event_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            "2025-01-29T14:35:20Z"
        );
        assert_eq!(message.offset, offset);
    }

    #[test]
    fn from_line_rejects_missing_message_field() {
        let line = br#"{"author":"Charlie"}"#;
        let offset = OffsetRange { start: 0, end: 21 };
        let reason = Message::from_line(line, offset).unwrap_err();
        assert!(reason.contains("message"));
    }

    #[test]
    fn from_line_rejects_malformed_json() {
        let line = br#"{"message": "trunc"#;
        let offset = OffsetRange { start: 0, end: 19 };
        assert!(Message::from_line(line, offset).is_err());
    }

    #[test]
    fn unparseable_timestamp_falls_back_to_parse_time() {
        let line = br#"{"message":"hi","timestamp":"yesterday-ish"}"#;
        let before = Utc::now();
        let message =
            Message::from_line(line, OffsetRange { start: 0, end: 45 }).unwrap();
        assert!(message.event_time >= before);
    }

    #[test]
    fn sink_row_mirrors_enriched_message() {
        let line = br#"{"message":"great stuff","timestamp":"2025-01-29 14:35:20"}"#;
        let message =
            Message::from_line(line, OffsetRange { start: 10, end: 70 }).unwrap();
        let enriched = EnrichedMessage::new(
            message,
            Sentiment {
                label: SentimentLabel::Positive,
                score: 0.25,
            },
        );
        let row = SinkRow::from(&enriched);
        assert_eq!(row.offset, 70);
        assert_eq!(row.message, "great stuff");
        assert_eq!(row.sentiment_label, "positive");
        assert_eq!(row.sentiment_score, 0.25);
        assert_eq!(row.timestamp, "2025-01-29T14:35:20Z");
    }
}
