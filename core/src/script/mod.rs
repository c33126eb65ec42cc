//! The boundary between the console and its embedded scripting
//! interpreter (spec.md §4.6, §9 "Dynamic script globals + C callbacks").
//!
//! The core never assumes a concrete interpreter. It exposes a
//! [`ScriptHost`] capability set — stack push/pop plus native-function
//! registration — the way the teacher's `env::Peripherals` exposes host
//! I/O capabilities without naming a windowing library. Whatever calls
//! [`register_api`] supplies the actual interpreter (reference Lua
//! dialect or a reimplementation); this module only describes the
//! contract and the native dispatch table behind it.

pub mod api;
pub mod preprocessor;

use thiserror::Error;

use crate::fixed::FixedNum;
use crate::machine::Machine;

pub use preprocessor::Preprocessor;

/// One push/pop-style stack the interpreter exposes to native functions
/// (spec.md §9). `register_native` installs a Rust function under a name
/// the interpreter can call; the other methods move values across the
/// interpreter/native boundary.
pub trait ScriptHost {
    fn push_number(&mut self, value: FixedNum);
    fn push_boolean(&mut self, value: bool);
    fn push_lstring(&mut self, value: &str);
    fn push_nil(&mut self);

    /// Number of arguments passed to the native call currently executing.
    fn get_arg_count(&self) -> usize;
    fn arg_number(&self, index: usize) -> Option<FixedNum>;
    fn arg_string(&self, index: usize) -> Option<String>;
    fn arg_boolean(&self, index: usize) -> Option<bool>;

    fn call_global(&mut self, name: &str, nargs: usize, nresults: usize) -> Result<(), ScriptRuntimeError>;
    fn register_native(&mut self, name: &'static str, f: NativeFn);
    fn set_line_hook(&mut self, hook: Option<LineHookFn>);

    /// True iff `name` is defined and callable at global scope (used for
    /// `_update60` FPS autodetection, spec.md §4.8 "FPS detection").
    fn global_is_callable(&self, name: &str) -> bool;
}

/// A native function registered into the interpreter: receives the
/// machine and the host stack, returns the number of results pushed.
pub type NativeFn = fn(&mut Machine, &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError>;

/// Polled on each executed script line when enabled (spec.md §4.6 step 4).
pub type LineHookFn = fn(line: u32);

#[derive(Debug, Error)]
pub enum ScriptParseError {
    #[error("cart:{line}: {message}")]
    Compile { line: u32, message: String },
}

#[derive(Debug, Error)]
pub enum ScriptRuntimeError {
    #[error("{0}")]
    Uncaught(String),

    /// Structured flow-control unwind (spec.md §9 "HALT as error
    /// propagation"). Also matched by string on `"HALT"` for carts that
    /// call `error("HALT")` directly.
    #[error("HALT")]
    Halt(HaltSignal),
}

impl ScriptRuntimeError {
    /// Per spec.md §9: accept a structured [`HaltSignal`] OR a plain
    /// error message containing the literal substring `"HALT"`.
    pub fn as_halt(&self) -> Option<HaltSignal> {
        match self {
            ScriptRuntimeError::Halt(signal) => Some(*signal),
            ScriptRuntimeError::Uncaught(message) if message.contains("HALT") => {
                Some(HaltSignal::Reset)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltSignal {
    Run,
    Stop,
    Reset,
    ExtCmdShutdown,
}

/// `stat(id)` dispatch table (spec.md §4.6). Unknown ids return 0.
impl Machine {
    /// Per SPEC_FULL.md's Open Question resolution: `stat(1)` is the wall
    /// time of the *previous* frame divided by its budget (`1000 /
    /// target_fps` ms), not a rolling average.
    pub fn stat(&self, id: i32) -> FixedNum {
        if id == 1 {
            let budget_ms = if self.stat.target_fps == 0 { 1 } else { 1000 / self.stat.target_fps as u64 };
            return FixedNum::from_f64(self.stat.last_frame_millis as f64 / budget_ms.max(1) as f64);
        }
        let v = match id {
            0 => 0, // mem usage (kB); not tracked by this core
            4 => 0, // clipboard length placeholder
            5 => 0, // version
            6 => 0, // cmdline arg count
            7 => self.stat.current_fps as i32,
            8 => self.stat.target_fps as i32,
            16..=23 => {
                let ch = (id - 16) as usize % 4;
                if ch < self.audio.channels.len() { self.audio.channels[ch].sfx_id } else { -1 }
            }
            24..=26 => self.audio.music.pattern,
            28 => 0, // raw scancode
            29 => 1, // controller count
            30..=39 => 0,
            80..=85 => 0,  // UTC date/time fields
            90..=95 => 0,  // local date/time fields
            100 => 0,      // cart id
            124 => 0,      // current cart path
            _ => 0,
        };
        FixedNum::from_int(v)
    }

    /// `run()`: reset-and-continue, per spec.md §4.8.
    pub fn do_run(&mut self) -> ScriptRuntimeError {
        self.halt.reset_requested = true;
        ScriptRuntimeError::Halt(HaltSignal::Run)
    }

    /// `stop()`.
    pub fn do_stop(&mut self) -> ScriptRuntimeError {
        self.halt.exit_requested = true;
        ScriptRuntimeError::Halt(HaltSignal::Stop)
    }

    /// `reset()`: like `run()` but never reloads `next_cart_path`.
    pub fn do_reset(&mut self) -> ScriptRuntimeError {
        self.halt.reset_requested = true;
        self.halt.next_cart_path = None;
        ScriptRuntimeError::Halt(HaltSignal::Reset)
    }

    /// `extcmd(cmd)`: only `"shutdown"`/`"reset"` affect VM flags here;
    /// other commands (`"pause"`, `"set_title"`, …) are host hints that
    /// pass through without raising HALT.
    pub fn do_extcmd(&mut self, cmd: &str) -> Option<ScriptRuntimeError> {
        match cmd {
            "shutdown" => {
                self.halt.exit_requested = true;
                Some(ScriptRuntimeError::Halt(HaltSignal::ExtCmdShutdown))
            }
            "reset" => {
                self.halt.reset_requested = true;
                Some(ScriptRuntimeError::Halt(HaltSignal::Reset))
            }
            _ => None,
        }
    }

    /// `printh(text)`: queues a line for the host to drain through
    /// [`crate::env::Peripherals::log`] once per frame. A native dispatcher
    /// only sees `&mut Machine`, never the peripherals bundle, so it can't
    /// call the host log directly (spec.md §4.6 "system helpers").
    pub fn printh(&mut self, text: &str) {
        self.log_queue.push(text.to_string());
    }

    /// `time()`/`t()`: seconds elapsed since cart load, derived from the
    /// logic-frame counter and the cart's detected target fps.
    pub fn time(&self) -> FixedNum {
        if self.stat.target_fps == 0 {
            return FixedNum::ZERO;
        }
        FixedNum::from_f64(self.stat.frame_count as f64 / self.stat.target_fps as f64)
    }

    /// `holdframe()`: skips the *next* logic frame's `_update` call
    /// (spec.md §4.6 "system helpers"), consumed by [`crate::frame`].
    pub fn holdframe(&mut self) {
        self.hold_frame = true;
    }
}

/// Full console API surface registered into the interpreter at cart load
/// (spec.md §4.6 step 2, ≈120 names across graphics/memory/math/audio/
/// input/system). Listed here as the contract; [`register_api`] binds
/// each to a native dispatcher.
pub const API_FUNCTIONS: &[&str] = &[
    // Graphics (§4.4)
    "cls", "pset", "pget", "line", "rect", "rectfill", "rrect", "rrectfill",
    "circ", "circfill", "oval", "ovalfill", "spr", "sspr", "map", "mget",
    "mset", "tline", "print", "cursor", "color", "fillp", "pal", "palt",
    "clip", "camera", "fget", "fset", "sget", "sset",
    // Memory (§4.3)
    "peek", "peek2", "peek4", "poke", "poke2", "poke4", "memcpy", "memset",
    "reload", "cstore",
    // Math (§4.1)
    "abs", "sgn", "min", "max", "mid", "flr", "ceil", "sqrt", "sin", "cos",
    "atan2", "band", "bor", "bxor", "bnot", "shl", "shr", "lshr", "rotl",
    "rotr", "tonum", "tostr", "srand", "rnd",
    // Audio (§4.5)
    "sfx", "music",
    // Input (§4.7)
    "btn", "btnp",
    // System / bindings glue (§4.6, §9)
    "time", "t", "stat", "flip", "yield", "printh", "menuitem", "run",
    "stop", "reset", "extcmd", "serial", "assert", "holdframe", "cartdata",
    "dget", "dset",
];

/// Registers the console API into `host` (spec.md §4.6 step 2). Each name
/// is bound to a small native dispatcher in [`api`]; the dispatchers
/// themselves just convert arguments/results and call straight into the
/// subsystem methods ([`crate::machine::gpu`], [`crate::machine::mm`],
/// [`crate::fixed`], [`crate::machine::audio`], this module).
pub fn register_api(host: &mut impl ScriptHost) {
    host.register_native("cls", api::cls);
    host.register_native("pset", api::pset);
    host.register_native("pget", api::pget);
    host.register_native("line", api::line);
    host.register_native("rect", api::rect);
    host.register_native("rectfill", api::rectfill);
    host.register_native("rrect", api::rrect);
    host.register_native("rrectfill", api::rrectfill);
    host.register_native("circ", api::circ);
    host.register_native("circfill", api::circfill);
    host.register_native("oval", api::oval);
    host.register_native("ovalfill", api::ovalfill);
    host.register_native("spr", api::spr);
    host.register_native("sspr", api::sspr);
    host.register_native("map", api::map);
    host.register_native("mget", api::mget);
    host.register_native("mset", api::mset);
    host.register_native("tline", api::tline);
    host.register_native("print", api::print);
    host.register_native("cursor", api::cursor);
    host.register_native("color", api::color);
    host.register_native("fillp", api::fillp);
    host.register_native("pal", api::pal);
    host.register_native("palt", api::palt);
    host.register_native("clip", api::clip);
    host.register_native("camera", api::camera);
    host.register_native("fget", api::fget);
    host.register_native("fset", api::fset);
    host.register_native("sget", api::sget);
    host.register_native("sset", api::sset);

    host.register_native("peek", api::peek);
    host.register_native("peek2", api::peek2);
    host.register_native("peek4", api::peek4);
    host.register_native("poke", api::poke);
    host.register_native("poke2", api::poke2);
    host.register_native("poke4", api::poke4);
    host.register_native("memcpy", api::memcpy);
    host.register_native("memset", api::memset);
    host.register_native("reload", api::reload);
    host.register_native("cstore", api::cstore);

    host.register_native("abs", api::abs);
    host.register_native("sgn", api::sgn);
    host.register_native("min", api::min);
    host.register_native("max", api::max);
    host.register_native("mid", api::mid);
    host.register_native("flr", api::flr);
    host.register_native("ceil", api::ceil);
    host.register_native("sqrt", api::sqrt);
    host.register_native("sin", api::sin);
    host.register_native("cos", api::cos);
    host.register_native("atan2", api::atan2);
    host.register_native("band", api::band);
    host.register_native("bor", api::bor);
    host.register_native("bxor", api::bxor);
    host.register_native("bnot", api::bnot);
    host.register_native("shl", api::shl);
    host.register_native("shr", api::shr);
    host.register_native("lshr", api::lshr);
    host.register_native("rotl", api::rotl);
    host.register_native("rotr", api::rotr);
    host.register_native("tonum", api::tonum);
    host.register_native("tostr", api::tostr);
    host.register_native("srand", api::srand);
    host.register_native("rnd", api::rnd);

    host.register_native("sfx", api::sfx);
    host.register_native("music", api::music);

    host.register_native("btn", api::btn);
    host.register_native("btnp", api::btnp);

    host.register_native("time", api::time);
    host.register_native("t", api::t);
    host.register_native("stat", api::stat);
    host.register_native("flip", api::flip);
    host.register_native("yield", api::yield_fn);
    host.register_native("printh", api::printh);
    host.register_native("menuitem", api::menuitem);
    host.register_native("run", api::run);
    host.register_native("stop", api::stop);
    host.register_native("reset", api::reset);
    host.register_native("extcmd", api::extcmd);
    host.register_native("serial", api::serial);
    host.register_native("assert", api::assert);
    host.register_native("holdframe", api::holdframe);
    host.register_native("cartdata", api::cartdata);
    host.register_native("dget", api::dget);
    host.register_native("dset", api::dset);
}

/// `detectCartFPS` (spec.md §4.8 "FPS detection"): a cart targets 60 fps
/// iff it defines a callable `_update60`. Since the core treats the
/// interpreter as a black box until one is loaded, this performs a
/// light-weight source scan for the declaration rather than querying a
/// live global table.
pub fn source_declares_update60(code: &str) -> bool {
    let mut chars = code.char_indices().peekable();
    let mut in_string: Option<char> = None;
    let mut in_comment = false;
    let mut in_block_comment = false;

    while let Some((i, c)) = chars.next() {
        if in_block_comment {
            if code[i..].starts_with("]]") {
                in_block_comment = false;
            }
            continue;
        }
        if in_comment {
            if c == '\n' {
                in_comment = false;
            }
            continue;
        }
        if let Some(q) = in_string {
            if c == '\\' {
                chars.next();
            } else if c == q {
                in_string = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => in_string = Some(c),
            '-' if code[i..].starts_with("--[[") => in_block_comment = true,
            '-' if code[i..].starts_with("--") => in_comment = true,
            _ => {
                if code[i..].starts_with("_update60") {
                    let before_ok = i == 0 || !is_ident_char(code.as_bytes()[i - 1] as char);
                    let after = i + "_update60".len();
                    let after_ok = after >= code.len() || !is_ident_char(code.as_bytes()[after] as char);
                    if before_ok && after_ok {
                        return true;
                    }
                }
            }
        }
    }
    false
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn detects_update60_declaration() {
        assert!(source_declares_update60("function _update60() cls() end"));
    }

    #[test]
    fn ignores_update60_in_comment() {
        assert!(!source_declares_update60("-- function _update60() end\nfunction _update() end"));
    }

    #[test]
    fn ignores_update60_in_string() {
        assert!(!source_declares_update60(r#"print("_update60")"#));
    }

    #[test]
    fn no_match_for_plain_update() {
        assert!(!source_declares_update60("function _update() end"));
    }

    #[test]
    fn halt_matches_plain_error_message() {
        let err = ScriptRuntimeError::Uncaught("custom HALT request".into());
        assert!(err.as_halt().is_some());
    }
}
