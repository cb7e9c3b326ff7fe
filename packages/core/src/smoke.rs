//! File write/read smoke test.

use std::io::{self, Read, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::volume::{OpenMode, Volume};
use crate::{Error, VolumePath};

/// What to do when a write reports fewer bytes than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortWritePolicy {
    /// Fail the smoke test with `Error::ShortWrite`.
    #[default]
    Error,
    /// Log a warning and carry on.
    Warn,
}

/// Remove `path`, then write `content` plus a newline to a fresh file.
///
/// Returns the number of bytes the file accepted. Fewer than requested means
/// the file stopped taking data, which `policy` decides how to handle.
pub fn write_test<V: Volume + ?Sized>(
    volume: &V,
    path: &VolumePath,
    content: &str,
    policy: ShortWritePolicy,
) -> Result<usize, Error> {
    // absent and removed are both fine starting points
    if let Err(e) = volume.unlink(path) {
        debug!(path = %path, error = %e, "no previous test file removed");
    }

    let mut file = volume
        .open(path, OpenMode::CreateWrite)
        .map_err(|source| {
            warn!(path = %path, error = %source, "failed to create file");
            Error::FileCreate {
                path: path.to_string(),
                source,
            }
        })?;
    info!(path = %path, "successfully created file");

    let mut line = String::with_capacity(content.len() + 1);
    line.push_str(content);
    line.push('\n');

    let write_error = |source: io::Error| Error::Write {
        path: path.to_string(),
        source,
    };
    let written = write_until_stalled(&mut *file, line.as_bytes()).map_err(write_error)?;
    file.flush().map_err(write_error)?;
    drop(file);

    if written < line.len() {
        match policy {
            ShortWritePolicy::Error => {
                return Err(Error::ShortWrite {
                    path: path.to_string(),
                    expected: line.len(),
                    written,
                })
            }
            ShortWritePolicy::Warn => {
                warn!(path = %path, written, expected = line.len(), "short write");
            }
        }
    }
    Ok(written)
}

/// Write `data`, resuming after partial writes.
///
/// Stops early only when a write accepts nothing, returning the total so
/// far. Other errors are returned as is.
fn write_until_stalled<W: Write + ?Sized>(out: &mut W, data: &[u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < data.len() {
        match out.write(&data[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::WriteZero => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// Read `path` back line by line through a `capacity` byte buffer.
///
/// Returns every newline-terminated line, newline stripped. A trailing
/// partial line is dropped.
pub fn read_test<V: Volume + ?Sized>(
    volume: &V,
    path: &VolumePath,
    capacity: usize,
    byte_delay: Option<Duration>,
) -> Result<Vec<String>, Error> {
    let file = volume.open(path, OpenMode::Read).map_err(|source| {
        warn!(path = %path, error = %source, "failed to open file for read");
        Error::FileOpen {
            path: path.to_string(),
            source,
        }
    })?;

    let mut reader = LineReader::new(file, capacity);
    if let Some(delay) = byte_delay {
        reader = reader.with_byte_delay(delay);
    }

    let mut lines = Vec::new();
    while let Some(line) = reader.next_line().map_err(|e| Error::LineTooLong {
        path: path.to_string(),
        capacity: e.capacity,
    })? {
        info!("line = {}", line);
        lines.push(line);
    }
    Ok(lines)
}

/// A line did not fit the read buffer.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("line exceeds {capacity} byte buffer")]
pub struct LineTooLong {
    pub capacity: usize,
}

/// Byte-at-a-time line reader over a fixed-capacity buffer.
///
/// The buffer holds a line plus its newline, so lines may carry at most
/// `capacity - 1` bytes of content. A longer line is an error; nothing is
/// truncated or overwritten. A zero-length read and a read error both end
/// the stream.
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    capacity: usize,
    byte_delay: Option<Duration>,
    done: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(capacity),
            capacity,
            byte_delay: None,
            done: false,
        }
    }

    pub fn with_byte_delay(mut self, delay: Duration) -> Self {
        self.byte_delay = Some(delay);
        self
    }

    /// Next complete line, or `None` at end of stream.
    pub fn next_line(&mut self) -> Result<Option<String>, LineTooLong> {
        let mut byte = [0u8; 1];
        while !self.done {
            match self.inner.read(&mut byte) {
                Ok(0) => self.finish("end of file"),
                Ok(_) => {
                    if let Some(delay) = self.byte_delay {
                        std::thread::sleep(delay);
                    }
                    if byte[0] == b'\n' {
                        let line = String::from_utf8_lossy(&self.buf).into_owned();
                        self.buf.clear();
                        return Ok(Some(line));
                    }
                    if self.buf.len() + 1 >= self.capacity {
                        self.done = true;
                        return Err(LineTooLong {
                            capacity: self.capacity,
                        });
                    }
                    self.buf.push(byte[0]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(error = %e, "read failed");
                    self.finish("read error");
                }
            }
        }
        Ok(None)
    }

    fn finish(&mut self, reason: &str) {
        if !self.buf.is_empty() {
            debug!(bytes = self.buf.len(), "dropping unterminated trailing line");
        }
        debug!("read loop ended: {}", reason);
        self.buf.clear();
        self.done = true;
    }
}
