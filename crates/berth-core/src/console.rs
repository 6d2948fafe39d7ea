//! Console-log follower.
//!
//! Streams the primary service's console log (`<install>/mgr/<name>`) to the
//! entrypoint's stdout so `docker logs` shows what the service reports. The
//! follower runs detached for the lifetime of the process and never gates
//! startup; its errors are logged and end the stream.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

const READ_CHUNK: usize = 8 * 1024;

/// Follows a log file from its end, `tail -F` style.
#[derive(Debug, Clone)]
pub struct ConsoleLogFollower {
    path: PathBuf,
    poll_interval: Duration,
}

impl ConsoleLogFollower {
    /// Creates a follower for `path`, checking for new data every `poll_interval`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
        }
    }

    /// Returns the followed file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Spawns the follower as a detached task writing to stdout.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(path = %self.path.display(), "following console log");
            if let Err(e) = self.follow(tokio::io::stdout()).await {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "console log follower stopped"
                );
            }
        })
    }

    /// Copies new log data to `out` until an I/O error occurs.
    ///
    /// # Errors
    /// Returns the first read or write error.
    pub async fn follow<W>(&self, mut out: W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut tail = self.attach().await?;
        loop {
            tail.copy_new(&mut out).await?;
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Opens the file, waiting for it to appear.
    ///
    /// A file that already exists is read from its end. A file created while
    /// waiting is read from the beginning, since all of it is new.
    ///
    /// # Errors
    /// Returns any open error other than "not found".
    pub async fn attach(&self) -> std::io::Result<LogTail> {
        let mut waited = false;
        let mut file = loop {
            match File::open(&self.path).await {
                Ok(file) => break file,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    if !waited {
                        tracing::debug!(path = %self.path.display(), "console log not there yet");
                        waited = true;
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => return Err(e),
            }
        };

        let pos = if waited {
            0
        } else {
            file.seek(SeekFrom::End(0)).await?
        };
        Ok(LogTail { file, pos })
    }
}

/// An open log file and the offset already copied.
#[derive(Debug)]
pub struct LogTail {
    file: File,
    pos: u64,
}

impl LogTail {
    /// Offset up to which data has been copied.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.pos
    }

    /// Copies everything appended since the last call to `out`.
    ///
    /// If the file shrank it was truncated; copying restarts from the beginning.
    ///
    /// # Errors
    /// Returns the first read or write error.
    pub async fn copy_new<W>(&mut self, out: &mut W) -> std::io::Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let len = self.file.metadata().await?.len();
        if len < self.pos {
            tracing::debug!(old = self.pos, new = len, "console log truncated");
            self.pos = self.file.seek(SeekFrom::Start(0)).await?;
        }

        let mut copied = 0u64;
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = self.file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).await?;
            copied += n as u64;
        }
        if copied > 0 {
            out.flush().await?;
            self.pos += copied;
        }
        Ok(copied)
    }
}
