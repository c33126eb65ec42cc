//! The console's hardware model: RAM, framebuffer, mapping registers, GPU,
//! audio, input and persistence state, composed into one [`Machine`] the
//! way the teacher's `Machine` composes CPU/PPU/timer/interrupt state.

use crate::cartridge::CartImage;
use self::{
    audio::AudioEngine,
    font::CUSTOM_FONT_DEFAULT_ADDR,
    input::InputController,
    menu::MenuItems,
    persistence::Persistence,
};

pub mod audio;
pub mod font;
pub mod gpu;
pub mod input;
mod menu;
mod mm;
pub mod persistence;

pub use menu::{CustomMenuItem, MenuHandle};

/// Size of the addressable RAM (spec.md §3).
pub const RAM_SIZE: usize = 0x8000;

/// Framebuffer dimensions (spec.md §3: the authoritative pixel store).
pub const FB_SIZE: usize = crate::SCREEN_WIDTH * crate::SCREEN_HEIGHT;

/// The 32 KiB addressable RAM, boxed to avoid a 32 KiB stack frame.
pub struct Memory(Box<[u8; RAM_SIZE]>);

impl Memory {
    fn zeroed() -> Self {
        Memory(Box::new([0; RAM_SIZE]))
    }
}

impl std::ops::Index<usize> for Memory {
    type Output = u8;
    fn index(&self, idx: usize) -> &u8 { &self.0[idx] }
}

impl std::ops::IndexMut<usize> for Memory {
    fn index_mut(&mut self, idx: usize) -> &mut u8 { &mut self.0[idx] }
}

/// The authoritative pixel store the rasterizer writes to (spec.md §3).
pub struct Framebuffer(Box<[u8; FB_SIZE]>);

impl Framebuffer {
    fn zeroed() -> Self {
        Framebuffer(Box::new([0; FB_SIZE]))
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl std::ops::Index<usize> for Framebuffer {
    type Output = u8;
    fn index(&self, idx: usize) -> &u8 { &self.0[idx] }
}

impl std::ops::IndexMut<usize> for Framebuffer {
    fn index_mut(&mut self, idx: usize) -> &mut u8 { &mut self.0[idx] }
}

/// Cached, pre-decoded view of the mapping registers at `0x5F54..0x5F58`
/// (spec.md §3 "HardwareState"), so reads don't re-decode the raw bytes
/// each time. Kept in sync by [`mm::register_sync`], never an independent
/// source of truth: the RAM bytes remain authoritative (spec.md §9).
#[derive(Debug, Clone, Copy)]
pub struct HardwareState {
    /// High byte of the address sprite data `0x0000..0x2000` is mapped
    /// from: `0x00` (default) or `0x60` (remapped to screen RAM).
    pub sprite_base: u8,
    /// High byte of the address screen RAM `0x6000..0x8000` is mapped
    /// from: `0x60` (default) or `0x00` (remapped to sprite sheet).
    pub screen_base: u8,
    pub map_base: u8,
    pub map_width: u8,
}

impl Default for HardwareState {
    fn default() -> Self {
        HardwareState { sprite_base: 0x00, screen_base: 0x60, map_base: 0x20, map_width: 128 }
    }
}

impl HardwareState {
    /// Per spec.md §4.3: mapping is active iff either register departs
    /// from its default.
    pub fn mapping_active(&self) -> bool {
        self.sprite_base == 0x60 || self.screen_base == 0x00
    }
}

/// Non-memory-mapped GPU bookkeeping (spec.md §3 "GpuState" minus the
/// fields that live directly in RAM: clip/camera/draw-mask/palettes are
/// read straight from RAM in [`gpu`]).
#[derive(Debug, Clone, Copy)]
pub struct GpuState {
    pub pen_col: u8,
    pub cur_x: i32,
    pub cur_y: i32,
    /// 32-bit fill pattern + "transparent bit" value; `0xFFFFFFFF` means
    /// fully opaque / no pattern.
    pub fillp_pattern: u32,
    pub last_line: (i32, i32),
    pub custom_font_addr: u16,
    pub use_custom_font: bool,
}

impl Default for GpuState {
    fn default() -> Self {
        GpuState {
            pen_col: 6,
            cur_x: 0,
            cur_y: 0,
            fillp_pattern: 0xFFFF_FFFF,
            last_line: (0, 0),
            custom_font_addr: CUSTOM_FONT_DEFAULT_ADDR,
            use_custom_font: false,
        }
    }
}

/// Flags a `run()`/`stop()`/`reset()`/`extcmd` HALT unwind leaves for the
/// frame driver to act on (spec.md §4.6, §4.8 "Cancellation & soft reset").
#[derive(Debug, Clone, Default)]
pub struct HaltFlags {
    pub reset_requested: bool,
    pub exit_requested: bool,
    pub next_cart_path: Option<String>,
}

/// `rnd`/`srand`'s generator state. PICO-8 seeds and steps an LCG on raw
/// 32-bit state and returns the high bits as the Q16.16 result, which is
/// what gives `rnd()` its full 32-bit period independent of the requested
/// range (spec.md §4.6 API surface; no dedicated spec section, constants
/// chosen to match the reference console's generator shape).
#[derive(Debug, Clone, Copy)]
pub struct Rng {
    state: u32,
}

impl Rng {
    fn new() -> Self {
        Rng { state: 0x7654_3210 }
    }

    /// `srand(seed)`: reseeds from the low 32 bits of `seed`'s raw bits,
    /// never zero (an all-zero LCG state would stay zero forever).
    pub fn seed(&mut self, seed: i32) {
        self.state = if seed == 0 { 0xDEAD_BEEF } else { seed as u32 };
    }

    fn next_u32(&mut self) -> u32 {
        // PICO-8's generator: state = state * 1103515245 + 12345 (a
        // standard LCG), with the *upper* bits (better statistical
        // quality than the low bits of an LCG) used as the output.
        self.state = self.state.wrapping_mul(1_103_515_245).wrapping_add(12345);
        self.state
    }

    /// `rnd(limit)`: a Q16.16 value in `[0, limit)`. `limit <= 0` (PICO-8
    /// convention: includes the `rnd(0)` case) returns 0.
    pub fn next(&mut self, limit: crate::fixed::FixedNum) -> crate::fixed::FixedNum {
        if limit.bits() <= 0 {
            return crate::fixed::FixedNum::ZERO;
        }
        let r = self.next_u32() & 0x7FFF_FFFF;
        let bits = ((r as u64 * limit.bits() as u64) >> 31) as i32;
        crate::fixed::FixedNum::from_bits(bits)
    }
}

impl Default for Rng {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame-timing bookkeeping used by `stat(7)`/`stat(8)` and the
/// `stat(1)` CPU-usage estimate (Open Question resolution: wall time of
/// the previous frame divided by its budget, see SPEC_FULL.md §4).
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub target_fps: u32,
    pub current_fps: u32,
    pub last_frame_millis: u64,
    pub frame_count: u64,
    /// Host clock reading at the start of the frame currently/most recently
    /// in progress; used by the frame driver to measure wall time without
    /// adding a field the driver would otherwise have to thread through.
    pub last_start_millis: u64,
}

pub struct Machine {
    pub ram: Memory,
    pub framebuffer: Framebuffer,
    pub hw: HardwareState,
    pub gpu_state: GpuState,
    pub audio: AudioEngine,
    pub input: InputController,
    pub menu: MenuItems,
    pub persistence: Persistence,
    pub cart: Option<CartImage>,
    pub halt: HaltFlags,
    pub stat: FrameStats,
    pub rng: Rng,
    /// Lines queued by `printh` for the host to drain through
    /// [`crate::env::Peripherals::log`] (native dispatchers only see
    /// `&mut Machine`, not the peripherals bundle, so `printh` can't call
    /// the host log directly; see spec.md §6 "system helpers").
    pub log_queue: Vec<String>,
    /// Set by `holdframe()`: skips the *next* logic frame's `_update` call
    /// without skipping `_draw` or audio (spec.md §4.6 "system helpers"),
    /// then clears itself. Used by carts for frame-perfect debugging.
    pub hold_frame: bool,
}

impl Machine {
    pub fn new() -> Self {
        let mut m = Machine {
            ram: Memory::zeroed(),
            framebuffer: Framebuffer::zeroed(),
            hw: HardwareState::default(),
            gpu_state: GpuState::default(),
            audio: AudioEngine::new(),
            input: InputController::new(),
            menu: MenuItems::new(),
            persistence: Persistence::new(),
            cart: None,
            halt: HaltFlags::default(),
            stat: FrameStats::default(),
            rng: Rng::default(),
            log_queue: Vec::new(),
            hold_frame: false,
        };
        m.reset_draw_state();
        m
    }

    /// Rewrites RAM from `cart` and resets all cached engine state. Per
    /// spec.md §3 "Lifecycles": no state from a previous cart survives.
    pub fn load_cart(&mut self, cart: CartImage) {
        self.ram = Memory::zeroed();
        self.framebuffer = Framebuffer::zeroed();
        self.hw = HardwareState::default();
        self.gpu_state = GpuState::default();
        self.audio = AudioEngine::new();
        self.input = InputController::new();
        self.menu = MenuItems::new();
        self.halt = HaltFlags::default();
        self.log_queue.clear();
        self.hold_frame = false;

        self.ram.0[0x0000..0x2000].copy_from_slice(&cart.gfx);
        self.ram.0[0x2000..0x3000].copy_from_slice(&cart.map);
        self.ram.0[0x3000..0x3100].copy_from_slice(&cart.flags);
        self.ram.0[0x3100..0x3200].copy_from_slice(&cart.music);
        self.ram.0[0x3200..0x4300].copy_from_slice(&cart.sfx);
        self.reset_draw_state();

        self.stat.target_fps = if crate::script::source_declares_update60(&cart.code) { 60 } else { 30 };

        self.cart = Some(cart);
    }

    /// Re-applies the current cart's sections without touching cartdata
    /// (spec.md §4.8 soft `reset()`/`run()`).
    pub fn reset_from_cart(&mut self) {
        if let Some(cart) = self.cart.clone() {
            let cartdata = self.cartdata_snapshot();
            self.load_cart(cart);
            self.restore_cartdata_snapshot(&cartdata);
        }
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
