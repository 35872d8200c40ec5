//! Transient on-disk copies of uploaded images.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use uuid::Uuid;

/// Directory that holds per-turn scratch images.
#[derive(Debug, Clone)]
pub struct ScratchStore {
    dir: PathBuf,
}

impl ScratchStore {
    /// Use `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` to a fresh `turn-<uuid>-<random>.img` file.
    pub fn write(&self, turn_id: Uuid, bytes: &[u8]) -> io::Result<ScratchFile> {
        let prefix = format!("turn-{turn_id}-");
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".img")
            .tempfile_in(&self.dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(ScratchFile { file })
    }
}

/// A scratch image. The file is removed when this value is dropped.
#[derive(Debug)]
pub struct ScratchFile {
    file: NamedTempFile,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
