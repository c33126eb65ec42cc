//! real8-core: the console proper.
//!
//! This crate implements the memory model, rasterizer, audio engine, script
//! binding layer and frame driver of a PICO-8-compatible fantasy console. It
//! has no opinion about windowing, audio devices or file I/O: those are
//! supplied by a host through the traits in [`env`].

#![forbid(unsafe_code)]

use crate::{
    cartridge::CartImage,
    env::Peripherals,
    machine::Machine,
    script::ScriptHost,
    log::*,
};

pub mod log;
pub mod fixed;
pub mod env;
pub mod cartridge;
pub mod machine;
pub mod script;
pub mod frame;

/// Width of the console's framebuffer, in pixels.
pub const SCREEN_WIDTH: usize = 128;

/// Height of the console's framebuffer, in pixels.
pub const SCREEN_HEIGHT: usize = 128;

/// Size of the addressable RAM, in bytes.
pub const RAM_SIZE: usize = 0x8000;

/// Audio sample rate, in Hz. Fixed per spec.md §4.5.
pub const SAMPLE_RATE: u32 = 22050;

/// Top-level console. Owns the machine (RAM, GPU, audio, input, script
/// bridge) and the frame driver that orchestrates it.
pub struct Console {
    machine: Machine,
}

impl Console {
    /// Creates a console with no cart loaded. `load_cart` must be called
    /// before frames are driven.
    pub fn new() -> Self {
        info!("Creating console");
        Self { machine: Machine::new() }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    /// Loads a cart image into RAM and resets the script VM. Per spec.md
    /// §3 "Lifecycles": RAM regions are rewritten from `CartImage` and no
    /// state from a previous cart survives.
    pub fn load_cart(&mut self, cart: CartImage) {
        info!("Loading cart");
        self.machine.load_cart(cart);
    }

    /// Drives one host render frame. `host` is the embedded script
    /// interpreter's [`ScriptHost`] binding; the core never constructs one
    /// itself (spec's explicit non-goal on the scripting-language
    /// implementation). See [`frame::FrameDriver`].
    pub fn run_frame(
        &mut self,
        peripherals: &mut impl Peripherals,
        host: &mut dyn ScriptHost,
    ) -> Result<(), Disruption> {
        frame::FrameDriver::run_frame(&mut self.machine, peripherals, host)
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

/// Describes the special situation when the console stops unexpectedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disruption {
    /// The script requested a full reset (`run()`/`reset()`). The host
    /// should treat the next `run_frame` as a fresh boot of the same cart.
    ResetRequested,

    /// The script requested shutdown (`extcmd("shutdown")` or similar).
    ExitRequested,

    /// An uncaught script error terminated the frame; the VM now shows an
    /// error screen (spec.md §7) and stops running the cart until reloaded.
    Terminated,
}
