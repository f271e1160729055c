//! Line-delimited JSON file backend.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::record::{FRAME_FORMAT_VERSION, Frame, FrameEnvelope, LogRecord};

use super::{BackendError, BackendResult, LogBackend};

/// Writes every record as one [`FrameEnvelope`] line.
///
/// Registration frames are not written; the file only holds log records.
pub struct FileBackend {
    path: PathBuf,
    out: Option<BufWriter<File>>,
}

impl FileBackend {
    /// Creates or truncates the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> BackendResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        tracing::debug!(path = %path.display(), "file output opened");
        Ok(Self {
            path,
            out: Some(BufWriter::new(file)),
        })
    }

    /// Path being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> BackendResult<&mut BufWriter<File>> {
        self.out
            .as_mut()
            .ok_or_else(|| BackendError::Message("file output already released".to_string()))
    }
}

impl LogBackend for FileBackend {
    fn write(&mut self, record: &LogRecord) -> BackendResult<()> {
        let env = FrameEnvelope::new(Frame::Log {
            record: record.clone(),
        });
        let out = self.writer()?;
        serde_json::to_writer(&mut *out, &env)?;
        out.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> BackendResult<()> {
        self.writer()?.flush()?;
        Ok(())
    }

    fn release(&mut self) -> BackendResult<()> {
        if let Some(mut out) = self.out.take() {
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        Ok(())
    }
}

/// Reads back every log record written to `path`, in file order.
pub fn read_records(path: impl AsRef<Path>) -> BackendResult<Vec<LogRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let env: FrameEnvelope = serde_json::from_str(&line)?;
        if env.format_version != FRAME_FORMAT_VERSION {
            return Err(BackendError::Message(format!(
                "unsupported frame format version: {}",
                env.format_version
            )));
        }
        if let Frame::Log { record } = env.frame {
            out.push(record);
        }
    }
    Ok(out)
}
