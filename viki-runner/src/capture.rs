//! Output capture
//!
//! Reads a child stream on a background task into a shared buffer. The
//! buffer outlives the task, so whatever was read before a timeout kill is
//! still available even if the stream never reaches EOF (a grandchild can
//! keep the pipe open after the job process itself is gone).
//!
//! Bytes past the capture limit are counted, not kept, so the run record can
//! say its output is incomplete.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::debug;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Background reader for one child output stream
pub struct OutputCapture {
    buffer: Arc<Mutex<CaptureBuffer>>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct CaptureBuffer {
    bytes: Vec<u8>,
    dropped: usize,
}

/// Text read from one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub text: String,

    /// Bytes discarded past the capture limit
    pub dropped_bytes: usize,
}

impl CapturedOutput {
    pub fn is_truncated(&self) -> bool {
        self.dropped_bytes > 0
    }
}

impl OutputCapture {
    /// Starts reading `handle` until EOF, keeping at most `limit` bytes
    ///
    /// Bytes past the limit are still read so the child never blocks on a
    /// full pipe.
    pub fn spawn<R>(handle: Option<R>, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(CaptureBuffer::default()));
        let sink = buffer.clone();

        let task = tokio::spawn(async move {
            let Some(mut reader) = handle else {
                return;
            };

            let mut chunk = vec![0u8; READ_CHUNK_BYTES];

            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let mut buf = sink.lock().unwrap_or_else(|e| e.into_inner());
                        let room = limit.saturating_sub(buf.bytes.len());
                        let keep = n.min(room);
                        buf.bytes.extend_from_slice(&chunk[..keep]);
                        buf.dropped += n - keep;
                    }
                    Err(e) => {
                        debug!("Stopped reading child stream: {}", e);
                        break;
                    }
                }
            }
        });

        Self { buffer, task }
    }

    /// Waits up to `grace` for the reader to hit EOF, then returns the text
    /// and the number of bytes dropped past the limit
    ///
    /// If the stream is still open after the grace period the reader is
    /// aborted and the bytes read so far are returned.
    pub async fn finish(mut self, grace: Duration) -> CapturedOutput {
        if tokio::time::timeout(grace, &mut self.task).await.is_err() {
            debug!("Child stream still open after {:?}, aborting reader", grace);
            self.task.abort();
        }

        let buf = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        CapturedOutput {
            text: String::from_utf8_lossy(&buf.bytes).into_owned(),
            dropped_bytes: buf.dropped,
        }
    }
}
