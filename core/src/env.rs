//! Host abstraction: the capabilities the core requires from whatever
//! embeds it (spec.md §6 "Host abstraction"). Generalized from the
//! teacher's `Peripherals` trait (one associated type per I/O surface) to
//! the fuller host contract this console needs: display, audio, input,
//! storage and a clock, gathered behind one `Peripherals` bundle.

/// Bundles every host capability the frame driver needs for one frame.
pub trait Peripherals {
    type Display: Display;
    type Audio: Audio;
    type Input: Input;
    type Storage: Storage;
    type Clock: Clock;

    fn display(&mut self) -> &mut Self::Display;
    fn audio(&mut self) -> &mut Self::Audio;
    fn input(&mut self) -> &mut Self::Input;
    fn storage(&mut self) -> &mut Self::Storage;
    fn clock(&mut self) -> &mut Self::Clock;

    /// A string tag identifying the host platform (spec.md §6
    /// `getPlatform()`). `"Libretro"` enables an optimized presentation
    /// path; unrecognized/empty strings get the default path.
    fn platform(&self) -> &str {
        ""
    }

    fn log(&mut self, message: &str);
}

/// Presentation surface: a 128x128 color-indexed framebuffer plus a
/// 16-entry palette remap (spec.md §6 `flip`).
pub trait Display {
    /// `framebuffer` is row-major, one color index (0-15, or 0-31 via the
    /// extended hardware-palette convention) per pixel. `screen_palette`
    /// is the 16-entry remap applied at presentation time.
    fn flip(&mut self, framebuffer: &[u8], screen_palette: &[u8; 16]);
}

/// Mono 16-bit sample sink at [`crate::SAMPLE_RATE`] Hz.
pub trait Audio {
    /// An empty slice means "flush/stop" (spec.md §6 `pushAudio`).
    fn push_samples(&mut self, samples: &[i16]);
}

/// Per-frame input snapshot, queried once per logic frame (spec.md §4.7,
/// §4.8 step 2: sampled at logic-frame boundaries only, never inside
/// `_draw`).
pub trait Input {
    /// 7-bit held-button mask for player `p` (0..=7). Bits 0-5 = L/R/U/D/O/X,
    /// bit 6 = Menu.
    fn held_buttons(&mut self, player: u8) -> u8;

    /// `(x, y, buttons)`, `x`/`y` already clamped to `0..128`.
    fn mouse_state(&mut self) -> (i32, i32, u8);

    fn clipboard_text(&mut self) -> String {
        String::new()
    }
}

/// Byte-array persistence: cartdata slots, save states, `cstore` sidecar
/// ROMs (spec.md §4.9, §6 "Persistence paths").
pub trait Storage {
    fn load_file(&mut self, path: &str) -> Option<Vec<u8>>;
    fn save_file(&mut self, path: &str, data: &[u8]) -> bool;
    fn delete_file(&mut self, path: &str) -> bool;
    fn has_file(&mut self, path: &str) -> bool;
}

/// Monotonic wall clock, used for `time()`/`stat(1)` and PXA-decode yield
/// checks.
pub trait Clock {
    fn millis(&mut self) -> u64;
}
