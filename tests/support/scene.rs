use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use touchalert::alert::{AlertCompletion, AlertSink};
use touchalert::frame::{Frame, FrameError, FrameSource, ImageDirSource};

const SIDE: u32 = 32;

/// Write `count` PNG frames of a desk scene, with a hand over it when `touching`.
pub fn write_scene_frames(dir: &Path, touching: bool, count: u32) {
    std::fs::create_dir_all(dir).expect("create frame dir");
    for index in 0..count {
        let shift = (index * 3) as u8;
        let mut image = RgbImage::from_fn(SIDE, SIDE, |x, y| {
            Rgb([20 + shift, (x * 4) as u8, 120 + (y * 3) as u8])
        });
        if touching {
            for y in 6..26 {
                for x in 8..24 {
                    image.put_pixel(x, y, Rgb([230, 180 - shift, 150]));
                }
            }
        }
        image
            .save(dir.join(format!("frame_{index:03}.png")))
            .expect("write frame");
    }
}

/// Camera stand-in that switches between two recordings.
pub struct SceneCamera {
    idle: ImageDirSource,
    touching: ImageDirSource,
    hand_present: Arc<AtomicBool>,
}

impl SceneCamera {
    pub fn open(idle_dir: &Path, touching_dir: &Path) -> (Self, Arc<AtomicBool>) {
        let hand_present = Arc::new(AtomicBool::new(false));
        let camera = Self {
            idle: ImageDirSource::open(idle_dir).expect("open idle frames"),
            touching: ImageDirSource::open(touching_dir).expect("open touching frames"),
            hand_present: Arc::clone(&hand_present),
        };
        (camera, hand_present)
    }
}

impl FrameSource for SceneCamera {
    fn current_frame(&mut self) -> Result<Frame, FrameError> {
        if self.hand_present.load(Ordering::SeqCst) {
            self.touching.current_frame()
        } else {
            self.idle.current_frame()
        }
    }
}

/// Counts alerts and completes each one immediately.
#[derive(Clone, Default)]
pub struct CountingSink {
    plays: Arc<AtomicUsize>,
}

impl CountingSink {
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl AlertSink for CountingSink {
    fn play(&self, completion: AlertCompletion) {
        self.plays.fetch_add(1, Ordering::SeqCst);
        completion.finish();
    }
}
