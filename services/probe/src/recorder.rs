//! Optional sink for audio received from the model.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};

/// Appends raw PCM (24 kHz, 16-bit LE mono) to a file, or discards it.
#[derive(Debug, Default)]
pub struct AudioRecorder {
    file: Option<(PathBuf, File)>,
    written: usize,
}

impl AudioRecorder {
    pub async fn create(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Ok(Self {
            file: Some((path.to_path_buf(), file)),
            written: 0,
        })
    }

    pub async fn write(&mut self, pcm: &[u8]) -> anyhow::Result<()> {
        if let Some((path, file)) = &mut self.file {
            file.write_all(pcm)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            self.written += pcm.len();
        }
        Ok(())
    }

    pub async fn finish(&mut self) -> anyhow::Result<()> {
        if let Some((path, file)) = &mut self.file {
            file.flush()
                .await
                .with_context(|| format!("Failed to flush {}", path.display()))?;
        }
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|(path, _)| path.as_path())
    }

    pub fn bytes_written(&self) -> usize {
        self.written
    }
}
