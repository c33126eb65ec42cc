//! Native dispatchers bound to the ~120 names in [`super::API_FUNCTIONS`]
//! by [`super::register_api`]. Each function here only converts arguments
//! off the host stack and calls straight into the subsystem that actually
//! implements the behavior (`machine::gpu`, `machine::mm`, `fixed`,
//! `machine::audio`, `machine::input`, `machine::persistence`, this
//! module's own `Machine` impl) — grounded the same way the teacher's own
//! `cpu::ops` table is a thin dispatch layer over `Machine` methods rather
//! than a place where behavior lives.

use super::{Machine, ScriptHost, ScriptRuntimeError};
use crate::fixed::FixedNum;

// --- Argument helpers -------------------------------------------------------

fn num(h: &dyn ScriptHost, i: usize) -> FixedNum {
    h.arg_number(i).unwrap_or(FixedNum::ZERO)
}

fn num_or(h: &dyn ScriptHost, i: usize, default: FixedNum) -> FixedNum {
    h.arg_number(i).unwrap_or(default)
}

fn int(h: &dyn ScriptHost, i: usize) -> i32 {
    num(h, i).to_int_floor()
}

fn int_or(h: &dyn ScriptHost, i: usize, default: i32) -> i32 {
    h.arg_number(i).map(|n| n.to_int_floor()).unwrap_or(default)
}

fn byte(h: &dyn ScriptHost, i: usize) -> u8 {
    int(h, i) as u8
}

fn byte_or(h: &dyn ScriptHost, i: usize, default: u8) -> u8 {
    int_or(h, i, default as i32) as u8
}

fn opt_int(h: &dyn ScriptHost, i: usize) -> Option<i32> {
    h.arg_number(i).map(|n| n.to_int_floor())
}

fn opt_byte(h: &dyn ScriptHost, i: usize) -> Option<u8> {
    opt_int(h, i).map(|v| v as u8)
}

fn flag(h: &dyn ScriptHost, i: usize, default: bool) -> bool {
    h.arg_boolean(i).unwrap_or(default)
}

fn text(h: &dyn ScriptHost, i: usize) -> String {
    h.arg_string(i).unwrap_or_default()
}

fn nargs(h: &dyn ScriptHost) -> usize {
    h.get_arg_count()
}

// --- Graphics (spec.md §4.4) -------------------------------------------------

pub fn cls(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.cls(byte_or(h, 0, 0));
    Ok(0)
}

pub fn pset(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let color = byte_or(h, 2, m.pen_color());
    m.pset(int(h, 0), int(h, 1), color);
    Ok(0)
}

pub fn pget(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let v = m.pget(int(h, 0), int(h, 1));
    h.push_number(FixedNum::from_int(v as i32));
    Ok(1)
}

/// `line(x1,y1,[c])` continues from the last endpoint; `line(x0,y0,x1,y1,[c])`
/// is the full form (PICO-8's overload on argument count).
pub fn line(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    if nargs(h) <= 3 {
        let (x0, y0) = m.gpu_state.last_line;
        let color = byte_or(h, 2, m.pen_color());
        m.line(x0, y0, int(h, 0), int(h, 1), color);
    } else {
        let color = byte_or(h, 4, m.pen_color());
        m.line(int(h, 0), int(h, 1), int(h, 2), int(h, 3), color);
    }
    Ok(0)
}

pub fn rect(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let color = byte_or(h, 4, m.pen_color());
    m.rect(int(h, 0), int(h, 1), int(h, 2), int(h, 3), color);
    Ok(0)
}

pub fn rectfill(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let color = byte_or(h, 4, m.pen_color());
    m.rectfill(int(h, 0), int(h, 1), int(h, 2), int(h, 3), color);
    Ok(0)
}

pub fn rrect(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let color = byte_or(h, 4, m.pen_color());
    m.rrect(int(h, 0), int(h, 1), int(h, 2), int(h, 3), color);
    Ok(0)
}

pub fn rrectfill(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let color = byte_or(h, 4, m.pen_color());
    m.rrectfill(int(h, 0), int(h, 1), int(h, 2), int(h, 3), color);
    Ok(0)
}

pub fn circ(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let color = byte_or(h, 3, m.pen_color());
    m.circ(int(h, 0), int(h, 1), int(h, 2), color);
    Ok(0)
}

pub fn circfill(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let color = byte_or(h, 3, m.pen_color());
    m.circfill(int(h, 0), int(h, 1), int(h, 2), color);
    Ok(0)
}

pub fn oval(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let color = byte_or(h, 4, m.pen_color());
    m.oval(int(h, 0), int(h, 1), int(h, 2), int(h, 3), color);
    Ok(0)
}

pub fn ovalfill(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let color = byte_or(h, 4, m.pen_color());
    m.ovalfill(int(h, 0), int(h, 1), int(h, 2), int(h, 3), color);
    Ok(0)
}

pub fn spr(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let w = num_or(h, 3, FixedNum::ONE);
    let height = num_or(h, 4, FixedNum::ONE);
    let fx = flag(h, 5, false);
    let fy = flag(h, 6, false);
    m.spr(int(h, 0), int(h, 1), int(h, 2), w, height, fx, fy);
    Ok(0)
}

pub fn sspr(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let sw = int(h, 2);
    let sh = int(h, 3);
    let dw = int_or(h, 6, sw);
    let dh = int_or(h, 7, sh);
    let fx = flag(h, 8, false);
    let fy = flag(h, 9, false);
    m.sspr(int(h, 0), int(h, 1), sw, sh, int(h, 4), int(h, 5), dw, dh, fx, fy);
    Ok(0)
}

pub fn map(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let layer = int_or(h, 6, -1);
    m.map(int(h, 0), int(h, 1), int(h, 2), int(h, 3), int(h, 4), int(h, 5), layer);
    Ok(0)
}

pub fn mget(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let v = m.mget(int(h, 0), int(h, 1));
    h.push_number(FixedNum::from_int(v as i32));
    Ok(1)
}

pub fn mset(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.mset(int(h, 0), int(h, 1), byte(h, 2));
    Ok(0)
}

pub fn tline(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let mdx = num_or(h, 6, FixedNum::from_f64(0.125));
    let mdy = num_or(h, 7, FixedNum::ZERO);
    m.tline(int(h, 0), int(h, 1), int(h, 2), int(h, 3), num(h, 4), num(h, 5), mdx, mdy);
    Ok(0)
}

pub fn print(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let t = text(h, 0);
    let x = opt_int(h, 1);
    let y = opt_int(h, 2);
    let col = opt_byte(h, 3);
    let end_x = m.print(&t, x, y, col);
    h.push_number(FixedNum::from_int(end_x));
    Ok(1)
}

pub fn cursor(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    if nargs(h) == 0 {
        m.set_cursor(0, 0, None);
    } else {
        m.set_cursor(int(h, 0), int(h, 1), opt_byte(h, 2));
    }
    Ok(0)
}

pub fn color(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.set_pen_color(byte_or(h, 0, 6));
    Ok(0)
}

pub fn fillp(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let pattern = num_or(h, 0, FixedNum::from_bits(-1));
    m.set_fillp(pattern);
    Ok(0)
}

pub fn pal(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    if nargs(h) == 0 {
        m.pal_reset();
    } else {
        m.pal(byte(h, 0), byte(h, 1), byte_or(h, 2, 0));
    }
    Ok(0)
}

pub fn palt(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    if nargs(h) == 0 {
        m.palt_reset();
    } else {
        m.palt(byte(h, 0), flag(h, 1, true));
    }
    Ok(0)
}

pub fn clip(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    if nargs(h) == 0 {
        m.set_clip_rect(0, 0, 128, 128);
    } else {
        m.set_clip_rect(int(h, 0), int(h, 1), int(h, 2), int(h, 3));
    }
    Ok(0)
}

pub fn camera(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    if nargs(h) == 0 {
        m.set_camera(0, 0);
    } else {
        m.set_camera(int(h, 0), int_or(h, 1, 0));
    }
    Ok(0)
}

pub fn fget(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let f = opt_byte(h, 1);
    if f.is_some() {
        h.push_boolean(m.fget(int(h, 0), f) != FixedNum::ZERO);
    } else {
        h.push_number(m.fget(int(h, 0), None));
    }
    Ok(1)
}

pub fn fset(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    if nargs(h) >= 3 {
        m.fset_bit(int(h, 0), byte(h, 1), flag(h, 2, false));
    } else {
        m.fset_all(int(h, 0), byte(h, 1));
    }
    Ok(0)
}

pub fn sget(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let v = m.sget(int(h, 0), int(h, 1));
    h.push_number(FixedNum::from_int(v as i32));
    Ok(1)
}

pub fn sset(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let color = byte_or(h, 2, m.pen_color());
    m.sset(int(h, 0), int(h, 1), color);
    Ok(0)
}

// --- Memory (spec.md §4.3) ---------------------------------------------------

pub fn peek(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let v = m.peek(int(h, 0) as u32);
    h.push_number(FixedNum::from_int(v as i32));
    Ok(1)
}

pub fn peek2(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let v = m.peek2(int(h, 0) as u32);
    h.push_number(FixedNum::from_int(v as i32));
    Ok(1)
}

pub fn peek4(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let bits = m.peek4_bits(int(h, 0) as u32);
    h.push_number(FixedNum::from_bits(bits));
    Ok(1)
}

/// `poke(addr, v0, v1, ...)`: writes each trailing argument as a sequential
/// byte starting at `addr` (PICO-8's variadic form).
pub fn poke(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let addr = int(h, 0) as u32;
    for i in 1..nargs(h) {
        m.poke(addr.wrapping_add(i as u32 - 1), byte(h, i));
    }
    Ok(0)
}

pub fn poke2(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.poke2(int(h, 0) as u32, int(h, 1) as u16);
    Ok(0)
}

pub fn poke4(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.poke4_bits(int(h, 0) as u32, num(h, 1).bits());
    Ok(0)
}

pub fn memcpy(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.memcpy(int(h, 0) as u32, int(h, 1) as u32, int(h, 2) as u32);
    Ok(0)
}

pub fn memset(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.memset(int(h, 0) as u32, byte(h, 1), int(h, 2) as u32);
    Ok(0)
}

pub fn reload(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.reload(int(h, 0) as u32, int(h, 1) as u32, int(h, 2) as u32);
    Ok(0)
}

pub fn cstore(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.cstore(int(h, 0) as u32, int(h, 1) as u32, int(h, 2) as u32);
    Ok(0)
}

// --- Math (spec.md §4.1) -----------------------------------------------------

pub fn abs(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).abs());
    Ok(1)
}

pub fn sgn(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).sign());
    Ok(1)
}

pub fn min(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).min(num(h, 1)));
    Ok(1)
}

pub fn max(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).max(num(h, 1)));
    Ok(1)
}

pub fn mid(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let (a, b, c) = (num(h, 0), num(h, 1), num(h, 2));
    let lo = a.min(b);
    let hi = a.max(b);
    h.push_number(c.max(lo).min(hi));
    Ok(1)
}

pub fn flr(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).floor());
    Ok(1)
}

pub fn ceil(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).ceil());
    Ok(1)
}

pub fn sqrt(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).sqrt());
    Ok(1)
}

pub fn sin(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(crate::fixed::sin(num(h, 0)));
    Ok(1)
}

pub fn cos(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(crate::fixed::cos(num(h, 0)));
    Ok(1)
}

pub fn atan2(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(crate::fixed::atan2(num(h, 0), num(h, 1)));
    Ok(1)
}

pub fn band(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).band(num(h, 1)));
    Ok(1)
}

pub fn bor(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).bor(num(h, 1)));
    Ok(1)
}

pub fn bxor(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).bxor(num(h, 1)));
    Ok(1)
}

pub fn bnot(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).bnot());
    Ok(1)
}

pub fn shl(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).shl(num(h, 1)));
    Ok(1)
}

pub fn shr(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).shr(num(h, 1)));
    Ok(1)
}

pub fn lshr(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).lshr(num(h, 1)));
    Ok(1)
}

pub fn rotl(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).rotl(num(h, 1)));
    Ok(1)
}

pub fn rotr(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(num(h, 0).rotr(num(h, 1)));
    Ok(1)
}

pub fn tonum(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    match h.arg_string(0).and_then(|s| FixedNum::tonum(&s)) {
        Some(v) => h.push_number(v),
        None => h.push_nil(),
    }
    Ok(1)
}

pub fn tostr(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let s = num(h, 0).tostr(flag(h, 1, false));
    h.push_lstring(&s);
    Ok(1)
}

pub fn srand(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.rng.seed(int(h, 0));
    Ok(0)
}

pub fn rnd(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    let limit = num_or(h, 0, FixedNum::ONE);
    h.push_number(m.rng.next(limit));
    Ok(1)
}

// --- Audio (spec.md §4.5) ----------------------------------------------------

pub fn sfx(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.sfx(int(h, 0), int_or(h, 1, -1), int_or(h, 2, 0), int_or(h, 3, -1));
    Ok(0)
}

pub fn music(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.music(int(h, 0), int_or(h, 1, 0), int_or(h, 2, -1));
    Ok(0)
}

// --- Input (spec.md §4.7) ----------------------------------------------------

pub fn btn(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    if nargs(h) == 0 {
        h.push_number(FixedNum::from_int(m.input.held(0) as i32));
    } else {
        let p = int_or(h, 1, 0).max(0) as usize;
        h.push_boolean(m.input.btn(byte(h, 0), p));
    }
    Ok(1)
}

pub fn btnp(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    if nargs(h) == 0 {
        h.push_number(FixedNum::from_int(m.input.held(0) as i32));
    } else {
        let p = int_or(h, 1, 0).max(0) as usize;
        h.push_boolean(m.input.btnp(byte(h, 0), p));
    }
    Ok(1)
}

// --- System / bindings glue (spec.md §4.6, §9) -------------------------------

pub fn time(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(m.time());
    Ok(1)
}

pub fn t(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    time(m, h)
}

pub fn stat(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(m.stat(int(h, 0)));
    Ok(1)
}

/// `flip()`: presentation happens outside the native-dispatch boundary (the
/// frame driver presents once per `_draw`, per spec.md §4.8); no-op here.
pub fn flip(_m: &mut Machine, _h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    Ok(0)
}

/// `yield`: a coroutine-suspension point the concrete interpreter realizes
/// on its own call stack, not here (named `yield_fn` since `yield` is a
/// reserved word in Rust).
pub fn yield_fn(_m: &mut Machine, _h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    Ok(0)
}

pub fn printh(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.printh(&text(h, 0));
    Ok(0)
}

/// `menuitem(index, [label], [callback])`: a handle is minted from a
/// throwaway `SlotMap` since the dispatcher has no access to the script
/// bridge's own handle allocator — the key itself stays valid independent
/// of the `SlotMap` instance that minted it (same pattern as
/// `machine::menu`'s own tests).
pub fn menuitem(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    if nargs(h) < 2 {
        m.menu.remove(byte(h, 0));
    } else {
        let mut slots = slotmap::SlotMap::<crate::machine::MenuHandle, ()>::with_key();
        let handle = slots.insert(());
        m.menu.set(byte(h, 0), text(h, 1), handle);
    }
    Ok(0)
}

pub fn run(m: &mut Machine, _h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    Err(m.do_run())
}

pub fn stop(m: &mut Machine, _h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    Err(m.do_stop())
}

pub fn reset(m: &mut Machine, _h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    Err(m.do_reset())
}

pub fn extcmd(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    match m.do_extcmd(&text(h, 0)) {
        Some(err) => Err(err),
        None => Ok(0),
    }
}

/// `serial(channel, addr, len)`: host passthrough channel the core doesn't
/// implement at this layer (no reachable I/O from `&mut Machine` alone).
pub fn serial(_m: &mut Machine, _h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    Ok(0)
}

pub fn assert(_m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    if flag(h, 0, true) {
        Ok(0)
    } else {
        let message = h.arg_string(1).unwrap_or_else(|| "assertion failed!".to_string());
        Err(ScriptRuntimeError::Uncaught(message))
    }
}

pub fn holdframe(m: &mut Machine, _h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.holdframe();
    Ok(0)
}

pub fn cartdata(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.cartdata_bind_id(&text(h, 0));
    Ok(0)
}

pub fn dget(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    h.push_number(m.dget(int(h, 0)));
    Ok(1)
}

pub fn dset(m: &mut Machine, h: &mut dyn ScriptHost) -> Result<i32, ScriptRuntimeError> {
    m.dset(int(h, 0), num(h, 1));
    Ok(0)
}
