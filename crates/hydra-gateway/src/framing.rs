//! Line-delimited JSON-RPC framing for MCP child stdio.
//!
//! One JSON object per `\n`-terminated line. CRLF is tolerated on input (the
//! trailing `\r` is trimmed along with the `\n`); output is always plain LF.
//! Blank lines are skipped. A line that fails to parse as JSON is logged with
//! the child's identity and discarded — it must never take the reader down.

use std::io;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Reads newline-delimited JSON-RPC messages from a child's stdout pipe.
pub struct LineFramer<R> {
    reader: BufReader<R>,
    buf: String,
    child_name: String,
}

impl<R: AsyncRead + Unpin> LineFramer<R> {
    pub fn new(reader: R, child_name: impl Into<String>) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: String::new(),
            child_name: child_name.into(),
        }
    }

    /// Read the next well-formed JSON-RPC message, returning `None` on EOF.
    ///
    /// Malformed frames are logged and skipped transparently; the caller only
    /// ever sees parseable JSON values or EOF.
    pub async fn next_message(&mut self) -> io::Result<Option<Value>> {
        loop {
            self.buf.clear();
            let n = self.reader.read_line(&mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }

            let trimmed = self.buf.trim_end_matches(['\r', '\n']).trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(trimmed) {
                Ok(v) => return Ok(Some(v)),
                Err(err) => {
                    tracing::warn!(
                        child = %self.child_name,
                        error = %err,
                        frame = %trimmed,
                        "discarding malformed frame from child"
                    );
                    continue;
                }
            }
        }
    }
}

/// Write a JSON-RPC envelope as a single LF-terminated line.
///
/// Writes are flushed immediately; callers must serialize concurrent calls
/// against the same writer themselves (one write per envelope, no interleave).
pub async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, envelope: &Value) -> io::Result<()> {
    let json = serde_json::to_string(envelope)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn parses_single_line() {
        let input = b"{\"jsonrpc\":\"2.0\",\"id\":1}\n";
        let mut framer = LineFramer::new(&input[..], "child");
        let msg = framer.next_message().await.unwrap().unwrap();
        assert_eq!(msg["id"], 1);
    }

    #[tokio::test]
    async fn tolerates_crlf() {
        let input = b"{\"id\":1}\r\n{\"id\":2}\r\n";
        let mut framer = LineFramer::new(&input[..], "child");
        assert_eq!(framer.next_message().await.unwrap().unwrap()["id"], 1);
        assert_eq!(framer.next_message().await.unwrap().unwrap()["id"], 2);
    }

    #[tokio::test]
    async fn skips_blank_lines() {
        let input = b"\n\n{\"id\":1}\n\n";
        let mut framer = LineFramer::new(&input[..], "child");
        let msg = framer.next_message().await.unwrap().unwrap();
        assert_eq!(msg["id"], 1);
    }

    #[tokio::test]
    async fn discards_malformed_frame_and_continues() {
        let input = b"not json\n{\"id\":1}\n";
        let mut framer = LineFramer::new(&input[..], "child");
        let msg = framer.next_message().await.unwrap().unwrap();
        assert_eq!(msg["id"], 1);
    }

    #[tokio::test]
    async fn eof_returns_none() {
        let mut framer = LineFramer::new(&b""[..], "child");
        assert!(framer.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn multiple_messages_in_sequence() {
        let input = b"{\"id\":1}\n{\"id\":2}\n{\"id\":3}\n";
        let mut framer = LineFramer::new(&input[..], "child");
        assert_eq!(framer.next_message().await.unwrap().unwrap()["id"], 1);
        assert_eq!(framer.next_message().await.unwrap().unwrap()["id"], 2);
        assert_eq!(framer.next_message().await.unwrap().unwrap()["id"], 3);
        assert!(framer.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_line_appends_lf_only() {
        let mut buf = Vec::new();
        write_line(&mut buf, &json!({"id": 1})).await.unwrap();
        assert_eq!(buf, b"{\"id\":1}\n");
    }
}
