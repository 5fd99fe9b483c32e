//! JSONL event source
//!
//! One `InboundEvent` per line:
//!
//! ```text
//! {"occurred_at":"2024-01-01T00:00:00Z","actor_id":7,"group_id":42,"channel_id":9,"actor_is_bot":false,"actor_roles":[100,200]}
//! ```
//!
//! Malformed lines are logged and skipped; they never stop the stream.

use super::error::SourceError;
use super::types::InboundEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

/// Parse one line, `Ok(None)` for blank lines
pub fn parse_event_line(line: &str, line_no: usize) -> Result<Option<InboundEvent>, SourceError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| SourceError::Malformed { line: line_no, source })
}

/// Forward every event in `reader` to `tx` until EOF or until the receiver
/// closes
///
/// Returns the number of events sent.
pub async fn read_events_jsonl<R>(reader: R, tx: mpsc::Sender<InboundEvent>) -> Result<usize, SourceError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let mut sent = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;

        match parse_event_line(&line, line_no) {
            Ok(Some(event)) => {
                if tx.send(event).await.is_err() {
                    log::warn!("⚠️  Ingest channel closed, stopping event source");
                    break;
                }
                sent += 1;
            }
            Ok(None) => {}
            Err(e) => log::warn!("⚠️  Skipping event: {}", e),
        }
    }

    log::info!("📖 Event source finished: {} events from {} lines", sent, line_no);
    Ok(sent)
}
