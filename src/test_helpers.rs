//! Test utilities for driving a tailed file through its lifecycle.

#[cfg(test)]
use std::fs::{File, OpenOptions};
#[cfg(test)]
use std::io::Write;
#[cfg(test)]
use std::path::{Path, PathBuf};

/// A file in its own temporary directory, with a long-lived writer handle
/// that keeps its cursor across truncation, like a producer process would.
#[cfg(test)]
pub struct TempTailFile {
    path: PathBuf,
    writer: Option<File>,
    _temp_dir: tempfile::TempDir,
}

#[cfg(test)]
impl TempTailFile {
    /// Create a new empty file
    pub fn new() -> std::io::Result<Self> {
        let mut temp_file = Self::missing()?;
        temp_file.recreate()?;
        Ok(temp_file)
    }

    /// A path in a fresh directory that does not exist yet
    pub fn missing() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("test.bin");

        Ok(Self {
            path,
            writer: None,
            _temp_dir: temp_dir,
        })
    }

    /// Write at the writer's cursor
    pub fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no writer"))?;
        writer.write_all(bytes)?;
        writer.flush()
    }

    /// Append through a separate handle, regardless of the writer's cursor
    pub fn append(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(bytes)?;
        file.flush()
    }

    /// Truncate to zero bytes; the writer's cursor does not move
    pub fn truncate(&self) -> std::io::Result<()> {
        OpenOptions::new().write(true).open(&self.path)?.set_len(0)
    }

    pub fn remove(&mut self) -> std::io::Result<()> {
        self.writer = None;
        std::fs::remove_file(&self.path)
    }

    /// Create (or empty) the file and point the writer at it
    pub fn recreate(&mut self) -> std::io::Result<()> {
        self.writer = Some(File::create(&self.path)?);
        Ok(())
    }

    /// Move the file aside and create a new one in its place
    pub fn rotate(&mut self) -> std::io::Result<PathBuf> {
        let rotated = self.path.with_extension("bin.1");
        std::fs::rename(&self.path, &rotated)?;
        self.recreate()?;
        Ok(rotated)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self._temp_dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_tail_file_creation() {
        let temp_file = TempTailFile::new().unwrap();
        assert!(temp_file.path().exists());
        assert_eq!(temp_file.path().parent(), Some(temp_file.dir()));
    }

    #[test]
    fn test_missing_file_is_not_created() {
        let temp_file = TempTailFile::missing().unwrap();
        assert!(!temp_file.path().exists());
        assert!(temp_file.dir().exists());
    }

    #[test]
    fn test_write_after_truncate_keeps_cursor() {
        let mut temp_file = TempTailFile::new().unwrap();
        temp_file.write(b"abcd").unwrap();
        temp_file.truncate().unwrap();
        temp_file.write(b"ef").unwrap();

        let content = std::fs::read(temp_file.path()).unwrap();
        assert_eq!(content, b"\0\0\0\0ef");
    }

    #[test]
    fn test_append_after_truncate_starts_at_zero() {
        let mut temp_file = TempTailFile::new().unwrap();
        temp_file.write(b"abcd").unwrap();
        temp_file.truncate().unwrap();
        temp_file.append(b"ef").unwrap();

        let content = std::fs::read(temp_file.path()).unwrap();
        assert_eq!(content, b"ef");
    }

    #[test]
    fn test_rotate_moves_old_content_aside() {
        let mut temp_file = TempTailFile::new().unwrap();
        temp_file.write(b"old").unwrap();
        let rotated = temp_file.rotate().unwrap();
        temp_file.write(b"new").unwrap();

        assert_eq!(std::fs::read(rotated).unwrap(), b"old");
        assert_eq!(std::fs::read(temp_file.path()).unwrap(), b"new");
    }

    #[test]
    fn test_remove() {
        let mut temp_file = TempTailFile::new().unwrap();
        temp_file.remove().unwrap();
        assert!(!temp_file.path().exists());
        assert!(temp_file.write(b"x").is_err());
    }
}
