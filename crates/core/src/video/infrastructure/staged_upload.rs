use std::io::{Read, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Video bytes that arrived without a path, staged to a named temp file so
/// ffmpeg can open them. The file is deleted when the stage is dropped.
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    /// Copies `reader` to a temp file, keeping `extension` so demuxers
    /// that sniff the name still work.
    pub fn from_reader(
        mut reader: impl Read,
        extension: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut file = tempfile::Builder::new()
            .prefix("lookout-upload-")
            .suffix(&format!(".{extension}"))
            .tempfile()?;
        let bytes = std::io::copy(&mut reader, &mut file)?;
        file.flush()?;
        log::debug!("Staged {bytes} bytes at {}", file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_writes_bytes_with_extension() {
        let staged = StagedUpload::from_reader(&b"not really a video"[..], "mp4").unwrap();
        assert_eq!(staged.path().extension().unwrap(), "mp4");
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"not really a video");
    }

    #[test]
    fn test_drop_removes_file() {
        let staged = StagedUpload::from_reader(&b"abc"[..], "avi").unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }
}
