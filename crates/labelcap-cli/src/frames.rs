//! Directory-backed frame source
//!
//! Stands in for a camera: every image file of a directory is loaded once,
//! then handed out in name order, wrapping around at the end.

use anyhow::{bail, Context};
use labelcap_core::FrameSource;
use labelcap_keys::{ContentType, InlinePayload};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

pub(crate) struct DirectoryFrames {
    frames: Vec<InlinePayload>,
    next: AtomicUsize,
}

impl DirectoryFrames {
    /// Load every image file directly inside `dir`
    pub(crate) fn load(dir: &Path) -> anyhow::Result<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("reading frame directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && image_extension(&path).is_some() {
                paths.push(path);
            }
        }
        paths.sort();

        let frames = paths
            .iter()
            .map(|path| read_image(path))
            .collect::<anyhow::Result<Vec<_>>>()?;
        if frames.is_empty() {
            bail!("no image files in {}", dir.display());
        }

        tracing::debug!(dir = %dir.display(), frames = frames.len(), "frames loaded");
        Ok(Self {
            frames,
            next: AtomicUsize::new(0),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for DirectoryFrames {
    fn snapshot(&self) -> Option<InlinePayload> {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        self.frames.get(i).cloned()
    }
}

fn image_extension(path: &Path) -> Option<&str> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Read an image file into a payload typed by its extension
pub(crate) fn read_image(path: &Path) -> anyhow::Result<InlinePayload> {
    let Some(ext) = image_extension(path) else {
        bail!("{} is not a recognized image file", path.display());
    };
    let content_type = ContentType::from_extension(&ext.to_ascii_lowercase())?;
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(InlinePayload::with_content_type(content_type, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn frames_cycle_in_name_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.png"), [2]).unwrap();
        std::fs::write(dir.path().join("a.JPG"), [1]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();

        let frames = DirectoryFrames::load(dir.path()).unwrap();
        assert_eq!(frames.len(), 2);

        let first = frames.snapshot().unwrap();
        assert_eq!(first.content_type().subtype(), "jpeg");
        assert_eq!(first.bytes(), &[1]);
        assert_eq!(frames.snapshot().unwrap().bytes(), &[2]);
        assert_eq!(frames.snapshot().unwrap().bytes(), &[1]);
    }

    #[test]
    fn empty_directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(DirectoryFrames::load(dir.path()).is_err());
    }

    #[test]
    fn non_image_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"text").unwrap();
        assert!(read_image(&path).is_err());
    }
}
