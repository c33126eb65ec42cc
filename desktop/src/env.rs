//! Headless implementation of `real8_core::env`'s host traits.
//!
//! Real device I/O (windowing, audio output, input devices) is an
//! explicit non-goal for the core (spec.md §1); this host only needs to
//! drive the core and inspect its output buffers, so every trait here is
//! either a no-op or backed by a plain file on disk.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use real8_core::env::{Audio, Clock, Display, Input, Peripherals, Storage};

/// Captures the most recent frame handed to [`Display::flip`] so the CLI
/// can dump it after the run.
pub struct FrameCapture {
    pub framebuffer: Vec<u8>,
    pub screen_palette: [u8; 16],
    pub flips: u64,
}

impl Default for FrameCapture {
    fn default() -> Self {
        FrameCapture {
            framebuffer: vec![0; real8_core::SCREEN_WIDTH * real8_core::SCREEN_HEIGHT],
            screen_palette: [0; 16],
            flips: 0,
        }
    }
}

impl Display for FrameCapture {
    fn flip(&mut self, framebuffer: &[u8], screen_palette: &[u8; 16]) {
        self.framebuffer.copy_from_slice(framebuffer);
        self.screen_palette = *screen_palette;
        self.flips += 1;
    }
}

/// Discards samples, but counts them so `--frames` runs can be sanity
/// checked against the expected sample-rate math (spec.md §4.5).
#[derive(Default)]
pub struct NullAudio {
    pub samples_pushed: u64,
}

impl Audio for NullAudio {
    fn push_samples(&mut self, samples: &[i16]) {
        self.samples_pushed += samples.len() as u64;
    }
}

/// No input devices attached: every button reads unheld, the mouse sits
/// at the origin. Real input-device handling is a non-goal (spec.md §1).
#[derive(Default)]
pub struct NoInput;

impl Input for NoInput {
    fn held_buttons(&mut self, _player: u8) -> u8 {
        0
    }

    fn mouse_state(&mut self) -> (i32, i32, u8) {
        (0, 0, 0)
    }
}

/// Plain-file persistence rooted at a save directory (spec.md §6
/// "Persistence paths"): cartdata blobs, save-state files, `cstore`
/// sidecar ROMs are all just files under `root`.
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&root)?;
        Ok(FileStorage { root })
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Storage for FileStorage {
    fn load_file(&mut self, path: &str) -> Option<Vec<u8>> {
        fs::read(self.resolve(path)).ok()
    }

    fn save_file(&mut self, path: &str, data: &[u8]) -> bool {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            if fs::create_dir_all(parent).is_err() {
                return false;
            }
        }
        fs::write(full, data).is_ok()
    }

    fn delete_file(&mut self, path: &str) -> bool {
        fs::remove_file(self.resolve(path)).is_ok()
    }

    fn has_file(&mut self, path: &str) -> bool {
        self.resolve(path).exists()
    }
}

/// Monotonic wall clock backed by `std::time::Instant`, used for
/// `time()`/`stat(1)`/PXA-decode yield checks (spec.md §4.9, §9).
pub struct WallClock(Instant);

impl Default for WallClock {
    fn default() -> Self {
        WallClock(Instant::now())
    }
}

impl Clock for WallClock {
    fn millis(&mut self) -> u64 {
        self.0.elapsed().as_millis() as u64
    }
}

/// Bundles the headless capabilities above into one [`Peripherals`]
/// instance the frame driver can drive.
pub struct HeadlessHost {
    pub display: FrameCapture,
    pub audio: NullAudio,
    pub input: NoInput,
    pub storage: FileStorage,
    pub clock: WallClock,
    platform: &'static str,
}

impl HeadlessHost {
    pub fn new(save_dir: PathBuf) -> std::io::Result<Self> {
        Ok(HeadlessHost {
            display: FrameCapture::default(),
            audio: NullAudio::default(),
            input: NoInput,
            storage: FileStorage::new(save_dir)?,
            clock: WallClock::default(),
            platform: "",
        })
    }
}

impl Peripherals for HeadlessHost {
    type Display = FrameCapture;
    type Audio = NullAudio;
    type Input = NoInput;
    type Storage = FileStorage;
    type Clock = WallClock;

    fn display(&mut self) -> &mut FrameCapture {
        &mut self.display
    }

    fn audio(&mut self) -> &mut NullAudio {
        &mut self.audio
    }

    fn input(&mut self) -> &mut NoInput {
        &mut self.input
    }

    fn storage(&mut self) -> &mut FileStorage {
        &mut self.storage
    }

    fn clock(&mut self) -> &mut WallClock {
        &mut self.clock
    }

    fn platform(&self) -> &str {
        self.platform
    }

    fn log(&mut self, message: &str) {
        log::info!("[cart] {message}");
    }
}
