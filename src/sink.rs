use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::Context as _;

/// Destination for encoded packet bytes, appended in call order.
pub trait PacketSink {
    fn append(&mut self, data: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Raw elementary-stream file: packet payloads concatenated, no container.
pub struct FileSink {
    file: File,
    path: PathBuf,
}

impl FileSink {
    /// Creates or truncates `path`.
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("create output file {}", path.display()))?;
        log::info!("writing encoded stream to {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PacketSink for FileSink {
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_data()
    }
}
