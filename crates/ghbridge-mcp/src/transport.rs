//! Transport layer for MCP JSON-RPC communication.
//!
//! MCP uses newline-delimited JSON over the worker's stdin/stdout.

use std::time::Duration;

use ghbridge_core::{Error, Result};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};

pub type BoxedReader = Box<dyn AsyncBufRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Line-oriented transport over a worker's standard streams.
pub struct LineTransport {
    reader: BoxedReader,
    writer: Option<BoxedWriter>,
}

impl LineTransport {
    /// Create a transport with custom reader/writer.
    pub fn new(reader: BoxedReader, writer: BoxedWriter) -> Self {
        Self {
            reader,
            writer: Some(writer),
        }
    }

    /// Create a transport over a child process's stdin/stdout.
    pub fn from_child(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        Self::new(Box::new(BufReader::new(stdout)), Box::new(stdin))
    }

    /// Serialize a message as one line and flush it.
    pub async fn write_message<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let json = serde_json::to_string(message)?;

        tracing::debug!("Sending: {}", json);

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::Transport("MCP server stdin is closed".to_string()))?;

        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read one line, waiting at most `deadline`.
    ///
    /// Returns `None` on end of stream or a blank line.
    pub async fn read_line(&mut self, deadline: Duration) -> Result<Option<String>> {
        let mut line = String::new();

        let read = tokio::time::timeout(deadline, self.reader.read_line(&mut line))
            .await
            .map_err(|_| Error::Timeout(deadline))??;

        if read == 0 {
            tracing::debug!("MCP server closed stdout");
            return Ok(None);
        }

        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        tracing::debug!("Received: {}", line);
        Ok(Some(line.to_string()))
    }

    /// Close the write side. The worker sees end of input.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JsonRpcRequest;
    use crate::test_support::{BrokenWriter, Pending, SharedWriter};
    use std::io::Cursor;

    fn transport(input: &str, writer: SharedWriter) -> LineTransport {
        LineTransport::new(
            Box::new(Cursor::new(input.as_bytes().to_vec())),
            Box::new(writer),
        )
    }

    const DEADLINE: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_write_message_is_one_line() {
        let output = SharedWriter::default();
        let mut transport = transport("", output.clone());

        let request = JsonRpcRequest::new(1, "tools/list", None);
        transport.write_message(&request).await.unwrap();

        let written = output.text();
        assert!(written.ends_with('\n'));
        assert_eq!(written.matches('\n').count(), 1);
        assert!(written.contains("\"method\":\"tools/list\""));
    }

    #[tokio::test]
    async fn test_read_line_trims() {
        let mut transport = transport("  {\"a\":1}  \n", SharedWriter::default());
        let line = transport.read_line(DEADLINE).await.unwrap();
        assert_eq!(line.as_deref(), Some("{\"a\":1}"));
    }

    #[tokio::test]
    async fn test_read_line_eof() {
        let mut transport = transport("", SharedWriter::default());
        assert!(transport.read_line(DEADLINE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_line_blank() {
        let mut transport = transport("\n{\"a\":1}\n", SharedWriter::default());
        assert!(transport.read_line(DEADLINE).await.unwrap().is_none());
        // The next line is still available.
        assert!(transport.read_line(DEADLINE).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_read_line_timeout() {
        let mut transport = LineTransport::new(
            Box::new(BufReader::new(Pending)),
            Box::new(SharedWriter::default()),
        );

        let err = transport
            .read_line(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.poisons_stream());
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let mut transport = transport("", SharedWriter::default());
        transport.close().await.unwrap();
        // Closing twice is fine.
        transport.close().await.unwrap();

        let err = transport
            .write_message(&JsonRpcRequest::new(1, "tools/list", None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_broken_pipe_is_transport_error() {
        let mut transport = LineTransport::new(
            Box::new(Cursor::new(Vec::new())),
            Box::new(BrokenWriter),
        );

        let err = transport
            .write_message(&JsonRpcRequest::new(1, "tools/list", None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
