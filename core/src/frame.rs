//! Per-frame orchestration (spec.md §4.8): input sync, protected
//! `_update`/`_update60` and `_draw` calls, audio fill, and presentation.
//!
//! Grounded on the teacher's `Emulator::execute_frame` (the single place
//! that sequences PPU/timer/interrupt stepping per host frame): this
//! module plays the same role, generalized from a fixed-cycle hardware
//! loop to a script-driven one where the "CPU" is an opaque interpreter
//! reached only through [`ScriptHost`].

use crate::env::Peripherals;
use crate::log::*;
use crate::machine::Machine;
use crate::script::{HaltSignal, ScriptHost, ScriptRuntimeError};
use crate::{Disruption, SAMPLE_RATE};

/// Screen-mode byte (spec.md §3 memory map `0x5F2C`); bit 5 set requests
/// horizontal mirroring at presentation time.
const SCREEN_MODE_ADDR: usize = 0x5F2C;
const MIRROR_BIT: u8 = 0x20;

/// Devkit/pointer-lock flags byte (`0x5F2D`); bit 0 here is used as the
/// "show fps stats" toggle for the fallback overlay (spec.md §4.8 step 6
/// leaves the toggle mechanism to the host/devkit, this core exposes it
/// as a single RAM bit rather than inventing a separate API).
const DEVKIT_FLAGS_ADDR: usize = 0x5F2D;
const FPS_OVERLAY_BIT: u8 = 0x01;

pub struct FrameDriver;

impl FrameDriver {
    /// Drives exactly one host render frame (spec.md §4.8). `host` is the
    /// live script interpreter binding; `peripherals` is the concrete host
    /// I/O bundle.
    pub fn run_frame(
        machine: &mut Machine,
        peripherals: &mut impl Peripherals,
        host: &mut dyn ScriptHost,
    ) -> Result<(), Disruption> {
        let frame_start = peripherals.clock().millis();

        // Step 1: frame pacing. A cart targeting 30 fps runs script logic
        // on every other physical (render) frame; 60 fps carts run it
        // every frame. Either way the host is expected to call this once
        // per its own 60 Hz render tick.
        let is_logic_frame = machine.stat.target_fps >= 60 || machine.stat.frame_count % 2 == 0;

        if is_logic_frame {
            // Step 2: input sync.
            machine.sync_input(peripherals.input());
            machine.advance_music();

            // Step 3: protected `_update`/`_update60`, unless `holdframe()`
            // asked to skip this one (spec.md §4.6 "system helpers"); audio
            // and `_draw` still run either way.
            if machine.hold_frame {
                machine.hold_frame = false;
            } else if let Some(disruption) = Self::protected_call_update(machine, host) {
                return Err(disruption);
            }

            // Step 4: patch hook, only if a mod loader installed one.
            if host.global_is_callable("__real8_patch_apply") {
                if let Err(err) = host.call_global("__real8_patch_apply", 0, 0) {
                    warn!("patch hook failed: {err}");
                }
            }

            // Step 5: protected `_draw`.
            if let Some(disruption) = Self::protected_call_draw(machine, host) {
                return Err(disruption);
            }

            // Step 6: FPS overlay.
            Self::draw_overlay(machine, host);
        }

        // Drain anything `printh` queued this frame (native dispatchers
        // only see `&mut Machine`, never the peripherals bundle, so
        // `printh` can't call `Peripherals::log` directly; spec.md §4.6).
        for line in machine.log_queue.drain(..) {
            peripherals.log(&line);
        }

        // Step 7: audio fill. Exactly one 60-fps-worth of samples per
        // physical frame, whether or not this was a logic frame, so audio
        // never stalls on a skipped frame (spec.md §4.8 step 1/7).
        let samples_per_frame = (SAMPLE_RATE as usize + 59) / 60;
        let samples = machine.generate_audio(samples_per_frame);
        peripherals.audio().push_samples(&samples);

        // Step 8: presentation. No explicit "framebuffer dirty" flag is
        // tracked; presenting every physical frame is equivalent since a
        // skipped logic frame leaves the framebuffer exactly as the last
        // `_draw` left it.
        Self::present(machine, peripherals);

        machine.flush_cartdata(peripherals.storage());

        let elapsed = frame_start.saturating_sub(machine.stat.last_start_millis).max(1);
        machine.stat.last_frame_millis = elapsed;
        machine.stat.last_start_millis = frame_start;
        machine.stat.frame_count = machine.stat.frame_count.wrapping_add(1);
        if elapsed > 0 {
            machine.stat.current_fps = (1000 / elapsed) as u32;
        }

        Self::apply_pending_reset(machine);

        Ok(())
    }

    fn protected_call_update(machine: &mut Machine, host: &mut dyn ScriptHost) -> Option<Disruption> {
        let name = if machine.stat.target_fps >= 60 && host.global_is_callable("_update60") {
            "_update60"
        } else if host.global_is_callable("_update") {
            "_update"
        } else {
            return None;
        };
        Self::protected_call(machine, host, name)
    }

    fn protected_call_draw(machine: &mut Machine, host: &mut dyn ScriptHost) -> Option<Disruption> {
        if !host.global_is_callable("_draw") {
            return None;
        }
        Self::protected_call(machine, host, "_draw")
    }

    /// Calls a zero-arg, zero-result global under a traceback handler
    /// (spec.md §4.8 step 3/5, "Cancellation & soft reset"). Returns
    /// `Some(disruption)` when the frame must stop being driven.
    fn protected_call(machine: &mut Machine, host: &mut dyn ScriptHost, name: &str) -> Option<Disruption> {
        match host.call_global(name, 0, 0) {
            Ok(()) => None,
            Err(err) => Self::handle_script_error(machine, err),
        }
    }

    /// HALT from `run()`/`stop()`/`reset()`/`extcmd()` sets flags on
    /// `machine.halt` before the error unwinds the interpreter; any other
    /// uncaught error terminates the cart (spec.md §4.8 "Cancellation &
    /// soft reset", §7).
    fn handle_script_error(machine: &mut Machine, err: ScriptRuntimeError) -> Option<Disruption> {
        if let Some(signal) = err.as_halt() {
            if machine.halt.exit_requested {
                return Some(Disruption::ExitRequested);
            }
            if machine.halt.reset_requested {
                return Some(Disruption::ResetRequested);
            }
            // A structured HALT with neither flag set (shouldn't normally
            // happen — every HaltSignal variant sets one) still counts as
            // a reset for `HaltSignal::Run`/`Reset`, a shutdown otherwise.
            return Some(match signal {
                HaltSignal::Run | HaltSignal::Reset => Disruption::ResetRequested,
                HaltSignal::Stop | HaltSignal::ExtCmdShutdown => Disruption::ExitRequested,
            });
        }
        error!("uncaught script error: {err}");
        Some(Disruption::Terminated)
    }

    /// Re-initializes RAM from the current cart (or `next_cart_path`, once
    /// a host wires cart-switching through `load()`) after a HALT-driven
    /// reset. Idempotent when no reset was requested.
    fn apply_pending_reset(machine: &mut Machine) {
        if machine.halt.reset_requested {
            machine.reset_from_cart();
        }
    }

    fn draw_overlay(machine: &mut Machine, host: &mut dyn ScriptHost) {
        if host.global_is_callable("__p8_sys_overlay") {
            host.push_number(crate::fixed::FixedNum::from_int(machine.stat.current_fps as i32));
            if let Err(err) = host.call_global("__p8_sys_overlay", 1, 0) {
                warn!("fps overlay hook failed: {err}");
            }
            return;
        }
        if machine.ram[DEVKIT_FLAGS_ADDR] & FPS_OVERLAY_BIT != 0 {
            let text = format!("{}", machine.stat.current_fps);
            machine.print(&text, Some(0), Some(0), Some(7));
        }
    }

    /// Remaps through the screen palette and applies the screen-mode
    /// mirror transform (spec.md §4.8 step 8) before handing the frame to
    /// the host.
    fn present(machine: &mut Machine, peripherals: &mut impl Peripherals) {
        let palette = machine.screen_palette();
        if machine.ram[SCREEN_MODE_ADDR] & MIRROR_BIT != 0 {
            let w = crate::SCREEN_WIDTH;
            let h = crate::SCREEN_HEIGHT;
            let mut mirrored = vec![0u8; w * h];
            for y in 0..h {
                for x in 0..w {
                    mirrored[y * w + x] = machine.framebuffer[y * w + (w - 1 - x)];
                }
            }
            peripherals.display().flip(&mirrored, &palette);
        } else {
            peripherals.display().flip(machine.framebuffer.as_slice(), &palette);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cartridge::{CartImage, FLAGS_SIZE, GFX_SIZE, MAP_SIZE, MUSIC_SIZE, SFX_SIZE};
    use crate::env::{Audio, Clock, Display, Input, Storage};
    use crate::fixed::FixedNum;

    struct NullDisplay;
    impl Display for NullDisplay {
        fn flip(&mut self, _framebuffer: &[u8], _screen_palette: &[u8; 16]) {}
    }

    struct NullAudio;
    impl Audio for NullAudio {
        fn push_samples(&mut self, _samples: &[i16]) {}
    }

    struct NullInput;
    impl Input for NullInput {
        fn held_buttons(&mut self, _player: u8) -> u8 { 0 }
        fn mouse_state(&mut self) -> (i32, i32, u8) { (0, 0, 0) }
    }

    struct NullStorage;
    impl Storage for NullStorage {
        fn load_file(&mut self, _path: &str) -> Option<Vec<u8>> { None }
        fn save_file(&mut self, _path: &str, _data: &[u8]) -> bool { true }
        fn delete_file(&mut self, _path: &str) -> bool { true }
        fn has_file(&mut self, _path: &str) -> bool { false }
    }

    struct FakeClock(u64);
    impl Clock for FakeClock {
        fn millis(&mut self) -> u64 {
            self.0 += 16;
            self.0
        }
    }

    struct TestPeripherals {
        display: NullDisplay,
        audio: NullAudio,
        input: NullInput,
        storage: NullStorage,
        clock: FakeClock,
    }

    impl Peripherals for TestPeripherals {
        type Display = NullDisplay;
        type Audio = NullAudio;
        type Input = NullInput;
        type Storage = NullStorage;
        type Clock = FakeClock;

        fn display(&mut self) -> &mut NullDisplay { &mut self.display }
        fn audio(&mut self) -> &mut NullAudio { &mut self.audio }
        fn input(&mut self) -> &mut NullInput { &mut self.input }
        fn storage(&mut self) -> &mut NullStorage { &mut self.storage }
        fn clock(&mut self) -> &mut FakeClock { &mut self.clock }
        fn log(&mut self, _message: &str) {}
    }

    fn peripherals() -> TestPeripherals {
        TestPeripherals {
            display: NullDisplay,
            audio: NullAudio,
            input: NullInput,
            storage: NullStorage,
            clock: FakeClock(0),
        }
    }

    /// A [`ScriptHost`] test double with no real interpreter behind it:
    /// globals are never callable, so the driver takes the "nothing
    /// defined" path every step. Exercises pacing/audio/presentation
    /// without needing a script VM.
    struct NoopHost;
    impl ScriptHost for NoopHost {
        fn push_number(&mut self, _value: FixedNum) {}
        fn push_boolean(&mut self, _value: bool) {}
        fn push_lstring(&mut self, _value: &str) {}
        fn push_nil(&mut self) {}
        fn get_arg_count(&self) -> usize { 0 }
        fn arg_number(&self, _index: usize) -> Option<FixedNum> { None }
        fn arg_string(&self, _index: usize) -> Option<String> { None }
        fn arg_boolean(&self, _index: usize) -> Option<bool> { None }
        fn call_global(&mut self, _name: &str, _nargs: usize, _nresults: usize) -> Result<(), ScriptRuntimeError> {
            Ok(())
        }
        fn register_native(&mut self, _name: &'static str, _f: crate::script::NativeFn) {}
        fn set_line_hook(&mut self, _hook: Option<crate::script::LineHookFn>) {}
        fn global_is_callable(&self, _name: &str) -> bool { false }
    }

    fn cart_with_target(update60: bool) -> CartImage {
        let code = if update60 { "function _update60() end" } else { "function _update() end" };
        CartImage {
            gfx: vec![0; GFX_SIZE],
            map: vec![0; MAP_SIZE],
            flags: vec![0; FLAGS_SIZE],
            music: vec![0; MUSIC_SIZE],
            sfx: vec![0; SFX_SIZE],
            code: code.to_string(),
        }
    }

    #[test]
    fn thirty_fps_cart_skips_logic_on_odd_frames() {
        let mut machine = Machine::new();
        machine.load_cart(cart_with_target(false));
        assert_eq!(machine.stat.target_fps, 30);

        let mut peripherals = peripherals();
        let mut host = NoopHost;
        for _ in 0..4 {
            FrameDriver::run_frame(&mut machine, &mut peripherals, &mut host).unwrap();
        }
        assert_eq!(machine.stat.frame_count, 4);
    }

    #[test]
    fn sixty_fps_cart_runs_logic_every_frame() {
        let mut machine = Machine::new();
        machine.load_cart(cart_with_target(true));
        assert_eq!(machine.stat.target_fps, 60);

        let mut peripherals = peripherals();
        let mut host = NoopHost;
        FrameDriver::run_frame(&mut machine, &mut peripherals, &mut host).unwrap();
        assert_eq!(machine.stat.frame_count, 1);
    }

    #[test]
    fn halt_with_reset_flag_surfaces_reset_disruption() {
        struct ResetHost;
        impl ScriptHost for ResetHost {
            fn push_number(&mut self, _value: FixedNum) {}
            fn push_boolean(&mut self, _value: bool) {}
            fn push_lstring(&mut self, _value: &str) {}
            fn push_nil(&mut self) {}
            fn get_arg_count(&self) -> usize { 0 }
            fn arg_number(&self, _index: usize) -> Option<FixedNum> { None }
            fn arg_string(&self, _index: usize) -> Option<String> { None }
            fn arg_boolean(&self, _index: usize) -> Option<bool> { None }
            fn call_global(&mut self, name: &str, _nargs: usize, _nresults: usize) -> Result<(), ScriptRuntimeError> {
                if name == "_update" {
                    Err(ScriptRuntimeError::Halt(HaltSignal::Reset))
                } else {
                    Ok(())
                }
            }
            fn register_native(&mut self, _name: &'static str, _f: crate::script::NativeFn) {}
            fn set_line_hook(&mut self, _hook: Option<crate::script::LineHookFn>) {}
            fn global_is_callable(&self, name: &str) -> bool { name == "_update" }
        }

        let mut machine = Machine::new();
        machine.load_cart(cart_with_target(false));
        machine.halt.reset_requested = true;

        let mut peripherals = peripherals();
        let mut host = ResetHost;
        let result = FrameDriver::run_frame(&mut machine, &mut peripherals, &mut host);
        assert_eq!(result, Err(Disruption::ResetRequested));
    }

    #[test]
    fn uncaught_error_without_halt_terminates() {
        struct ErrorHost;
        impl ScriptHost for ErrorHost {
            fn push_number(&mut self, _value: FixedNum) {}
            fn push_boolean(&mut self, _value: bool) {}
            fn push_lstring(&mut self, _value: &str) {}
            fn push_nil(&mut self) {}
            fn get_arg_count(&self) -> usize { 0 }
            fn arg_number(&self, _index: usize) -> Option<FixedNum> { None }
            fn arg_string(&self, _index: usize) -> Option<String> { None }
            fn arg_boolean(&self, _index: usize) -> Option<bool> { None }
            fn call_global(&mut self, name: &str, _nargs: usize, _nresults: usize) -> Result<(), ScriptRuntimeError> {
                if name == "_update" {
                    Err(ScriptRuntimeError::Uncaught("bad index".into()))
                } else {
                    Ok(())
                }
            }
            fn register_native(&mut self, _name: &'static str, _f: crate::script::NativeFn) {}
            fn set_line_hook(&mut self, _hook: Option<crate::script::LineHookFn>) {}
            fn global_is_callable(&self, name: &str) -> bool { name == "_update" }
        }

        let mut machine = Machine::new();
        machine.load_cart(cart_with_target(false));

        let mut peripherals = peripherals();
        let mut host = ErrorHost;
        let result = FrameDriver::run_frame(&mut machine, &mut peripherals, &mut host);
        assert_eq!(result, Err(Disruption::Terminated));
    }

    #[test]
    fn audio_is_filled_every_physical_frame_even_when_logic_is_skipped() {
        struct Wrapper { pushes: usize }
        impl Audio for Wrapper {
            fn push_samples(&mut self, samples: &[i16]) {
                if !samples.is_empty() {
                    self.pushes += 1;
                }
            }
        }
        struct CountingPeripherals {
            display: NullDisplay,
            audio: Wrapper,
            input: NullInput,
            storage: NullStorage,
            clock: FakeClock,
        }
        impl Peripherals for CountingPeripherals {
            type Display = NullDisplay;
            type Audio = Wrapper;
            type Input = NullInput;
            type Storage = NullStorage;
            type Clock = FakeClock;
            fn display(&mut self) -> &mut NullDisplay { &mut self.display }
            fn audio(&mut self) -> &mut Wrapper { &mut self.audio }
            fn input(&mut self) -> &mut NullInput { &mut self.input }
            fn storage(&mut self) -> &mut NullStorage { &mut self.storage }
            fn clock(&mut self) -> &mut FakeClock { &mut self.clock }
            fn log(&mut self, _message: &str) {}
        }

        let mut machine = Machine::new();
        machine.load_cart(cart_with_target(false));
        let mut peripherals = CountingPeripherals {
            display: NullDisplay,
            audio: Wrapper { pushes: 0 },
            input: NullInput,
            storage: NullStorage,
            clock: FakeClock(0),
        };
        let mut host = NoopHost;
        for _ in 0..3 {
            FrameDriver::run_frame(&mut machine, &mut peripherals, &mut host).unwrap();
        }
        assert_eq!(peripherals.audio.pushes, 3);
    }
}
