use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Frame, FrameError, FrameSource};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp"];

/// Replays image files from a directory as if they were live camera frames.
///
/// Files are served in name order and the sequence loops forever, so a short
/// recording can drive both training and detection.
pub struct ImageDirSource {
    dir: PathBuf,
    frames: Vec<PathBuf>,
    cursor: usize,
    sequence: u64,
}

impl ImageDirSource {
    /// Index the images in `dir`. An empty directory is reported as not ready.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, FrameError> {
        let dir = dir.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&dir).map_err(|err| FrameError::Device {
            reason: format!("cannot read frame directory {}: {err}", dir.display()),
        })?;
        let mut frames = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect::<Vec<_>>();
        frames.sort();
        if frames.is_empty() {
            return Err(FrameError::NotReady {
                reason: format!("no image files in {}", dir.display()),
            });
        }
        debug!("Indexed {} frames in {}", frames.len(), dir.display());
        Ok(Self {
            dir,
            frames,
            cursor: 0,
            sequence: 0,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ImageDirSource {
    fn current_frame(&mut self) -> Result<Frame, FrameError> {
        let path = &self.frames[self.cursor % self.frames.len()];
        self.cursor = (self.cursor + 1) % self.frames.len();
        let image = image::open(path)
            .map_err(|source| FrameError::Decode {
                path: path.clone(),
                source,
            })?
            .to_rgb8();
        let frame = Frame::new(image, self.sequence);
        self.sequence += 1;
        Ok(frame)
    }

    fn describe(&self) -> String {
        format!("{} ({} frames)", self.dir.display(), self.frames.len())
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.as_str()))
}
