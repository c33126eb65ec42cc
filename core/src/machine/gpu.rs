//! The clipped rasterizer: every drawing primitive cart code can call
//! (spec.md §4.4), plus P8SCII text rendering. Generalized from the
//! teacher's `ppu.rs` register-and-scanline style into a rect/line/circle
//! rasterizer over the framebuffer rather than a tile-and-sprite PPU.

use super::{font, Machine};
use crate::fixed::FixedNum;

const W: i32 = crate::SCREEN_WIDTH as i32;
const H: i32 = crate::SCREEN_HEIGHT as i32;

impl Machine {
    /// Translates cart-space coordinates into screen space by subtracting
    /// the camera offset (spec.md §4.4: "All coordinates reaching the
    /// rasterizer are first translated by (-camera_x, -camera_y)").
    fn to_screen(&self, x: i32, y: i32) -> (i32, i32) {
        let (cx, cy) = self.camera();
        (x - cx, y - cy)
    }

    /// Tests whether the fill-pattern bit for screen-space `(sx, sy)` is
    /// set. `0xFFFFFFFF` means fully opaque (always set).
    fn fillp_bit_set(&self, sx: i32, sy: i32) -> bool {
        let pattern = self.gpu_state.fillp_pattern;
        if pattern == 0xFFFF_FFFF {
            return true;
        }
        let bit = 15 - (4 * (sy.rem_euclid(4)) + sx.rem_euclid(4));
        (pattern >> bit) & 1 != 0
    }

    /// Writes a single already-clipped, already-camera-translated pixel:
    /// draw-mask blend against the current pixel, then remap through the
    /// draw palette (spec.md §4.4).
    fn compose_pixel(&mut self, sx: i32, sy: i32, color: u8) {
        let (x0, y0, w, h) = self.clip_rect();
        if sx < x0 || sx >= x0 + w || sy < y0 || sy >= y0 + h {
            return;
        }
        if sx < 0 || sx >= W || sy < 0 || sy >= H {
            return;
        }
        if !self.fillp_bit_set(sx, sy) {
            return;
        }

        let mask = self.draw_mask() & 0x0F;
        let idx = (sy * W + sx) as usize;
        let old = self.framebuffer[idx];
        let masked = (old & !mask) | (color & mask);
        let palette = self.draw_palette();
        let final_color = palette[(masked & 0x0F) as usize] & 0x0F;

        self.framebuffer[idx] = final_color;
        self.sync_screen_byte_for_pixel(sx as usize, sy as usize);
    }

    /// Recomputes the packed screen-RAM byte covering pixel `(sx, sy)` from
    /// the framebuffer, independent of mapping-register aliasing (the GPU
    /// always targets logical screen space; aliasing only affects how
    /// `peek`/`poke` address it, per spec.md §4.3).
    fn sync_screen_byte_for_pixel(&mut self, sx: usize, sy: usize) {
        let even_x = sx & !1;
        let off = sy * (crate::SCREEN_WIDTH / 2) + even_x / 2;
        let lo = self.framebuffer[sy * crate::SCREEN_WIDTH + even_x] & 0x0F;
        let hi = self.framebuffer[sy * crate::SCREEN_WIDTH + even_x + 1] & 0x0F;
        self.ram[0x6000 + off] = lo | (hi << 4);
    }

    /// `cls(c)`: fills the framebuffer and screen RAM with `c`, resets the
    /// cursor.
    pub fn cls(&mut self, color: u8) {
        let color = color & 0x0F;
        for i in 0..super::FB_SIZE {
            self.framebuffer[i] = color;
        }
        let byte = color | (color << 4);
        for off in 0..(super::FB_SIZE / 2) {
            self.ram[0x6000 + off] = byte;
        }
        self.gpu_state.cur_x = 0;
        self.gpu_state.cur_y = 0;
    }

    /// `pset(x, y, c)`.
    pub fn pset(&mut self, x: i32, y: i32, color: u8) {
        let (sx, sy) = self.to_screen(x, y);
        self.compose_pixel(sx, sy, color);
    }

    /// `pget(x, y)`: raw framebuffer value, camera-adjusted, no palette
    /// remap (Open Question resolution, see SPEC_FULL.md §4).
    pub fn pget(&self, x: i32, y: i32) -> u8 {
        let (sx, sy) = self.to_screen(x, y);
        if sx < 0 || sx >= W || sy < 0 || sy >= H {
            return 0;
        }
        self.framebuffer[(sy * W + sx) as usize]
    }

    /// `line(x0,y0,x1,y1,c)`. Cohen-Sutherland clip against the clip rect,
    /// then Bresenham. Horizontal lines with no active fill pattern or
    /// draw mask are memset-accelerated.
    pub fn line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u8) {
        let (mut sx0, mut sy0) = self.to_screen(x0, y0);
        let (mut sx1, mut sy1) = self.to_screen(x1, y1);
        self.gpu_state.last_line = (x1, y1);

        let (cx0, cy0, cw, ch) = self.clip_rect();
        let (xmin, ymin, xmax, ymax) = (cx0 as i64, cy0 as i64, (cx0 + cw - 1) as i64, (cy0 + ch - 1) as i64);

        if !cohen_sutherland_clip(&mut sx0, &mut sy0, &mut sx1, &mut sy1, xmin, ymin, xmax, ymax) {
            return;
        }

        if sy0 == sy1 && self.gpu_state.fillp_pattern == 0xFFFF_FFFF && self.draw_mask() == 0 {
            let (lo, hi) = if sx0 <= sx1 { (sx0, sx1) } else { (sx1, sx0) };
            let palette = self.draw_palette();
            let final_color = palette[(color & 0x0F) as usize] & 0x0F;
            for sx in lo..=hi {
                if sx >= 0 && sx < W && sy0 >= 0 && sy0 < H {
                    let idx = (sy0 * W + sx) as usize;
                    self.framebuffer[idx] = final_color;
                    self.sync_screen_byte_for_pixel(sx as usize, sy0 as usize);
                }
            }
            return;
        }

        bresenham(sx0, sy0, sx1, sy1, |px, py| self.compose_pixel(px, py, color));
    }

    /// `rect(x0,y0,x1,y1,c)`: four edges.
    pub fn rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u8) {
        self.line(x0, y0, x1, y0, color);
        self.line(x0, y1, x1, y1, color);
        self.line(x0, y0, x0, y1, color);
        self.line(x1, y0, x1, y1, color);
    }

    /// `rectfill(x0,y0,x1,y1,c)`: scanline fill.
    pub fn rectfill(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u8) {
        let (lo_y, hi_y) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        for y in lo_y..=hi_y {
            self.line(x0, y, x1, y, color);
        }
    }

    /// `rrect(x0,y0,x1,y1,c)`: rounded rectangle, radius clamped to
    /// `min(w,h)/2 - 1`.
    pub fn rrect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u8) {
        let (lo_x, hi_x) = order(x0, x1);
        let (lo_y, hi_y) = order(y0, y1);
        let w = hi_x - lo_x + 1;
        let h = hi_y - lo_y + 1;
        let r = ((w.min(h)) / 2 - 1).max(0);

        self.line(lo_x + r, lo_y, hi_x - r, lo_y, color);
        self.line(lo_x + r, hi_y, hi_x - r, hi_y, color);
        self.line(lo_x, lo_y + r, lo_x, hi_y - r, color);
        self.line(hi_x, lo_y + r, hi_x, hi_y - r, color);

        self.quarter_circles(lo_x, lo_y, hi_x, hi_y, r, color, false);
    }

    /// `rrectfill(x0,y0,x1,y1,c)`.
    pub fn rrectfill(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u8) {
        let (lo_x, hi_x) = order(x0, x1);
        let (lo_y, hi_y) = order(y0, y1);
        let w = hi_x - lo_x + 1;
        let h = hi_y - lo_y + 1;
        let r = ((w.min(h)) / 2 - 1).max(0);

        for y in (lo_y + r + 1)..(hi_y - r) {
            self.line(lo_x, y, hi_x, y, color);
        }
        self.quarter_circles(lo_x, lo_y, hi_x, hi_y, r, color, true);
    }

    /// Draws (or fills) the four corner quarter-circles of a rounded rect
    /// via midpoint iteration.
    fn quarter_circles(&mut self, lo_x: i32, lo_y: i32, hi_x: i32, hi_y: i32, r: i32, color: u8, fill: bool) {
        if r <= 0 {
            return;
        }
        let corners = [
            (lo_x + r, lo_y + r, -1, -1),
            (hi_x - r, lo_y + r, 1, -1),
            (lo_x + r, hi_y - r, -1, 1),
            (hi_x - r, hi_y - r, 1, 1),
        ];
        let mut x = r;
        let mut y = 0;
        let mut err = 1 - r;
        let mut points = Vec::new();
        while x >= y {
            points.push((x, y));
            points.push((y, x));
            y += 1;
            if err < 0 {
                err += 2 * y + 1;
            } else {
                x -= 1;
                err += 2 * (y - x) + 1;
            }
        }
        for (cx, cy, dx, dy, ) in corners {
            for &(px, py) in &points {
                let (ox, oy) = (px * dx, py * dy);
                if fill {
                    self.line(cx, cy, cx + ox, cy + oy, color);
                } else {
                    self.pset(cx + ox, cy + oy, color);
                }
            }
        }
    }

    /// `circ(x,y,r,c)`: midpoint circle.
    pub fn circ(&mut self, cx: i32, cy: i32, r: i32, color: u8) {
        midpoint_circle(r, |dx, dy| {
            self.pset(cx + dx, cy + dy, color);
        });
    }

    /// `circfill(x,y,r,c)`: per-scanline horizontal runs.
    pub fn circfill(&mut self, cx: i32, cy: i32, r: i32, color: u8) {
        if r < 0 {
            return;
        }
        let mut x = r;
        let mut y = 0;
        let mut err = 1 - r;
        while x >= y {
            self.line(cx - x, cy + y, cx + x, cy + y, color);
            self.line(cx - x, cy - y, cx + x, cy - y, color);
            self.line(cx - y, cy + x, cx + y, cy + x, color);
            self.line(cx - y, cy - x, cx + y, cy - x, color);
            y += 1;
            if err < 0 {
                err += 2 * y + 1;
            } else {
                x -= 1;
                err += 2 * (y - x) + 1;
            }
        }
    }

    /// `oval(x0,y0,x1,y1,c)`: Bresenham ellipse, eight-way symmetry.
    pub fn oval(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u8) {
        let (lo_x, hi_x) = order(x0, x1);
        let (lo_y, hi_y) = order(y0, y1);
        let cx = (lo_x + hi_x) as f64 / 2.0;
        let cy = (lo_y + hi_y) as f64 / 2.0;
        let rx = (hi_x - lo_x) as f64 / 2.0;
        let ry = (hi_y - lo_y) as f64 / 2.0;
        bresenham_ellipse(rx, ry, |dx, dy| {
            self.pset((cx + dx as f64).round() as i32, (cy + dy as f64).round() as i32, color);
        });
    }

    /// `ovalfill(x0,y0,x1,y1,c)`.
    pub fn ovalfill(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u8) {
        let (lo_x, hi_x) = order(x0, x1);
        let (lo_y, hi_y) = order(y0, y1);
        let cx = (lo_x + hi_x) as f64 / 2.0;
        let cy = (lo_y + hi_y) as f64 / 2.0;
        let rx = (hi_x - lo_x) as f64 / 2.0;
        let ry = (hi_y - lo_y) as f64 / 2.0;
        let mut rows: std::collections::BTreeMap<i32, (i32, i32)> = std::collections::BTreeMap::new();
        bresenham_ellipse(rx, ry, |dx, dy| {
            let px = (cx + dx as f64).round() as i32;
            let py = (cy + dy as f64).round() as i32;
            rows.entry(py)
                .and_modify(|(lo, hi)| { *lo = (*lo).min(px); *hi = (*hi).max(px); })
                .or_insert((px, px));
        });
        for (py, (lo, hi)) in rows {
            self.line(lo, py, hi, py, color);
        }
    }

    /// `spr(n,x,y,w,h,fx,fy)`: `w`/`h` in tiles (1.0 = 8px); `n` indexes the
    /// sprite sheet at `((n%16)*8, (n/16)*8)`.
    #[allow(clippy::too_many_arguments)]
    pub fn spr(&mut self, n: i32, x: i32, y: i32, w: FixedNum, h: FixedNum, flip_x: bool, flip_y: bool) {
        let tiles_w = w.to_f64().max(0.0);
        let tiles_h = h.to_f64().max(0.0);
        let pw = (tiles_w * 8.0).round() as i32;
        let ph = (tiles_h * 8.0).round() as i32;
        let sheet_x = (n % 16) * 8;
        let sheet_y = (n / 16) * 8;
        self.blit_tiles(sheet_x, sheet_y, pw, ph, x, y, pw, ph, flip_x, flip_y);
    }

    /// `sspr(sx,sy,sw,sh,dx,dy,dw,dh,fx,fy)`: stretched blit via `u,v`
    /// accumulators.
    #[allow(clippy::too_many_arguments)]
    pub fn sspr(&mut self, sx: i32, sy: i32, sw: i32, sh: i32, dx: i32, dy: i32, dw: i32, dh: i32, flip_x: bool, flip_y: bool) {
        self.blit_tiles(sx, sy, sw, sh, dx, dy, dw, dh, flip_x, flip_y);
    }

    #[allow(clippy::too_many_arguments)]
    fn blit_tiles(&mut self, sx: i32, sy: i32, sw: i32, sh: i32, dx: i32, dy: i32, dw: i32, dh: i32, flip_x: bool, flip_y: bool) {
        if sw <= 0 || sh <= 0 || dw <= 0 || dh <= 0 {
            return;
        }
        let u_step = ((sw as i64) << 16) / dw as i64;
        let v_step = ((sh as i64) << 16) / dh as i64;
        let mut v = 0i64;
        for row in 0..dh {
            let src_row = (v >> 16) as i32;
            let sample_y = if flip_y { sh - 1 - src_row } else { src_row };
            let mut u = 0i64;
            for col in 0..dw {
                let src_col = (u >> 16) as i32;
                let sample_x = if flip_x { sw - 1 - src_col } else { src_col };
                let color = self.sprite_sheet_pixel(sx + sample_x, sy + sample_y);
                if !self.is_transparent(color) {
                    self.pset(dx + col, dy + row, color);
                }
                u += u_step;
            }
            v += v_step;
        }
    }

    /// Reads one nibble of the sprite sheet (`0x0000..0x2000`), honoring
    /// mapping-register aliasing the same way `peek` does.
    fn sprite_sheet_pixel(&mut self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 {
            return 0;
        }
        let byte_off = (y as u32) * 64 + (x as u32) / 2;
        let byte = self.peek(byte_off);
        if x % 2 == 0 { byte & 0x0F } else { (byte >> 4) & 0x0F }
    }

    /// `map(mx,my,sx,sy,w,h,layer)`: draws map tiles. Tile 0 is always
    /// skipped; when `layer != -1`, only tiles with `sprite_flags[t] &
    /// layer != 0` are drawn.
    #[allow(clippy::too_many_arguments)]
    pub fn map(&mut self, mx: i32, my: i32, sx: i32, sy: i32, w: i32, h: i32, layer: i32) {
        for j in 0..h {
            for i in 0..w {
                let t = self.mget(mx + i, my + j);
                if t == 0 {
                    continue;
                }
                if layer != -1 {
                    let flags = self.ram[0x3000 + t as usize] as i32;
                    if flags & layer == 0 {
                        continue;
                    }
                }
                let sheet_x = (t % 16) * 8;
                let sheet_y = (t / 16) * 8;
                self.blit_tiles(sheet_x, sheet_y, 8, 8, sx + i * 8, sy + j * 8, 8, 8, false, false);
            }
        }
    }

    /// Maps a map-cell `(x,y)` to its RAM byte address. Rows 0-31 live in
    /// the base map region `0x2000..0x3000`; rows 32-63 alias the shared
    /// sprite/map region `0x1000..0x2000` (spec.md §3's "Shared sprite/map
    /// overlap"), matching `real8_gfx.cpp`'s `idx = y*128+x; idx < 4096 →
    /// ram[0x2000+idx]; idx < 8192 → ram[0x1000+(idx-4096)]`.
    fn map_cell_addr(x: i32, y: i32) -> usize {
        let idx = y as usize * 128 + x as usize;
        if idx < 4096 {
            0x2000 + idx
        } else {
            0x1000 + (idx - 4096)
        }
    }

    /// `mget(x,y)`: map cell value; out-of-range returns 0.
    pub fn mget(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= 128 || y >= 64 {
            return 0;
        }
        self.ram[Self::map_cell_addr(x, y)]
    }

    /// `mset(x,y,v)`.
    pub fn mset(&mut self, x: i32, y: i32, v: u8) {
        if x < 0 || y < 0 || x >= 128 || y >= 64 {
            return;
        }
        self.ram[Self::map_cell_addr(x, y)] = v;
    }

    /// `tline(x0,y0,x1,y1,mx,my,mdx,mdy)`: samples the map along a line,
    /// stepping `(mx,my)` by `(mdx,mdy)` per pixel.
    #[allow(clippy::too_many_arguments)]
    pub fn tline(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, mx: FixedNum, my: FixedNum, mdx: FixedNum, mdy: FixedNum) {
        let (sx0, sy0) = self.to_screen(x0, y0);
        let (sx1, sy1) = self.to_screen(x1, y1);
        let mut mx = mx;
        let mut my = my;
        let points = bresenham_points(sx0, sy0, sx1, sy1);
        for (px, py) in points {
            let tile_x = mx.to_int_floor().rem_euclid(128);
            let tile_y = my.to_int_floor().rem_euclid(128);
            let t = self.mget(tile_x / 8, tile_y / 8);
            if t != 0 {
                let color = self.sprite_sheet_pixel((t % 16) * 8 + tile_x % 8, (t / 16) * 8 + tile_y % 8);
                if !self.is_transparent(color) {
                    self.compose_pixel(px, py, color);
                }
            }
            mx = mx + mdx;
            my = my + mdy;
        }
    }

    /// `print(text, x, y, col)`: draws P8SCII text at the given position
    /// and returns the x coordinate one past the last glyph (PICO-8's
    /// `print` return value).
    pub fn print(&mut self, text: &str, x: Option<i32>, y: Option<i32>, col: Option<u8>) -> i32 {
        let start_x = x.unwrap_or(self.gpu_state.cur_x);
        let start_y = y.unwrap_or(self.gpu_state.cur_y);
        if let Some(c) = col {
            self.gpu_state.pen_col = c & 0x0F;
        }

        let mut cur_x = start_x;
        let mut cur_y = start_y;
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            match b {
                b'\n' => {
                    cur_x = start_x;
                    cur_y += 6;
                    i += 1;
                }
                b'\r' => {
                    cur_x = start_x;
                    i += 1;
                }
                b'\t' => {
                    cur_x = ((cur_x - start_x + 16) / 16) * 16 + start_x;
                    i += 1;
                }
                0x08 => {
                    cur_x = (cur_x - 5).max(start_x);
                    i += 1;
                }
                0x0E => {
                    self.gpu_state.use_custom_font = true;
                    i += 1;
                }
                0x0F => {
                    self.gpu_state.use_custom_font = false;
                    i += 1;
                }
                0x00..=0x0D | 0x10..=0x1F => {
                    // Remaining control codes (foreground/background shift,
                    // cursor offset, repeat, inline glyph, ...) are not
                    // individually modeled; skip rather than draw garbage.
                    i += 1;
                }
                _ => {
                    self.draw_glyph(b, cur_x, cur_y, self.gpu_state.pen_col);
                    cur_x += 4;
                    i += 1;
                }
            }
        }

        if x.is_none() {
            self.gpu_state.cur_x = start_x;
            self.gpu_state.cur_y = cur_y + 6;
        }

        cur_x
    }

    fn draw_glyph(&mut self, code: u8, x: i32, y: i32, color: u8) {
        let glyph = if self.gpu_state.use_custom_font {
            let addr = self.gpu_state.custom_font_addr as usize;
            let bytes = self.ram_range(addr, 5 + 256 * 8 + 16);
            font::CustomFont::new(&bytes)
                .map(|f| f.glyph(code))
                .unwrap_or(*font::glyph_4x6(code))
        } else {
            *font::glyph_4x6(code)
        };

        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..4u8 {
                if bits & (1 << col) != 0 {
                    self.pset(x + col as i32, y + row as i32, color);
                }
            }
        }
    }

    fn ram_range(&self, start: usize, len: usize) -> Vec<u8> {
        (0..len).map(|i| {
            let addr = start + i;
            if addr < super::RAM_SIZE { self.ram[addr] } else { 0 }
        }).collect()
    }

    /// `color(c)`: sets the default pen color used by primitives that omit
    /// their color argument.
    pub fn set_pen_color(&mut self, c: u8) {
        self.gpu_state.pen_col = c & 0x0F;
    }

    pub fn pen_color(&self) -> u8 {
        self.gpu_state.pen_col
    }

    /// `cursor(x, y, [c])`.
    pub fn set_cursor(&mut self, x: i32, y: i32, c: Option<u8>) {
        self.gpu_state.cur_x = x;
        self.gpu_state.cur_y = y;
        if let Some(c) = c {
            self.set_pen_color(c);
        }
    }

    /// `fillp(pattern)`: sets the 4x4 fill-pattern bits (low 16 bits) and
    /// the "transparent bit" convention packed into the high word, per
    /// spec.md §3 "GpuState" (`0xFFFFFFFF` = fully opaque / no pattern).
    pub fn set_fillp(&mut self, pattern: crate::fixed::FixedNum) {
        self.gpu_state.fillp_pattern = pattern.bits() as u32;
    }

    /// `pal(c0, c1, [p])`: remaps `c0` to `c1` in the draw palette
    /// (`p == 0`, default) or the screen palette (`p == 1`). Writing
    /// through `poke` so the register-sync invariant (spec.md §4.3: "RAM
    /// bytes are authoritative") stays the single source of truth.
    pub fn pal(&mut self, c0: u8, c1: u8, p: u8) {
        let base = if p == 1 { 0x5F10 } else { 0x5F00 };
        self.poke((base + (c0 & 0x0F) as usize) as u32, c1 & 0x0F);
    }

    /// `pal()` with no arguments: resets both palettes to identity.
    pub fn pal_reset(&mut self) {
        for i in 0..16u8 {
            self.poke(0x5F00 + i as u32, i);
            self.poke(0x5F10 + i as u32, i);
        }
    }

    /// `palt(c, t)`: sets or clears color `c`'s transparency bit. `palt()`
    /// with no arguments resets to "only color 0 transparent".
    pub fn palt(&mut self, c: u8, transparent: bool) {
        let mut mask = self.transparency_mask();
        let bit = 1u16 << (c & 0x0F);
        if transparent { mask |= bit; } else { mask &= !bit; }
        self.poke(0x5F5C, (mask & 0xFF) as u8);
        self.poke(0x5F5D, (mask >> 8) as u8);
    }

    pub fn palt_reset(&mut self) {
        self.poke(0x5F5C, 1);
        self.poke(0x5F5D, 0);
    }

    /// `fget(n, [f])`: sprite `n`'s flag byte, or just bit `f` of it when
    /// `f` is given.
    pub fn fget(&self, n: i32, f: Option<u8>) -> crate::fixed::FixedNum {
        if !(0..256).contains(&n) {
            return crate::fixed::FixedNum::ZERO;
        }
        let byte = self.ram[0x3000 + n as usize];
        match f {
            Some(bit) => crate::fixed::FixedNum::from_bool(byte & (1 << (bit & 7)) != 0),
            None => crate::fixed::FixedNum::from_int(byte as i32),
        }
    }

    /// `fset(n, [f], v)`: sets sprite `n`'s whole flag byte (`v` numeric)
    /// or just bit `f` (`v` boolean).
    pub fn fset_all(&mut self, n: i32, value: u8) {
        if (0..256).contains(&n) {
            self.ram[0x3000 + n as usize] = value;
        }
    }

    pub fn fset_bit(&mut self, n: i32, bit: u8, value: bool) {
        if !(0..256).contains(&n) {
            return;
        }
        let mask = 1u8 << (bit & 7);
        let byte = self.ram[0x3000 + n as usize];
        self.ram[0x3000 + n as usize] = if value { byte | mask } else { byte & !mask };
    }

    /// `sget(x, y)`: reads one pixel of the sprite sheet directly (honors
    /// mapping aliasing the same way `peek` does).
    pub fn sget(&mut self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= 128 || y >= 128 {
            return 0;
        }
        self.sprite_sheet_pixel(x, y)
    }

    /// `sset(x, y, [c])`: writes one pixel of the sprite sheet (defaults
    /// to the current pen color), through the same nibble-packed `poke`
    /// path real cart code would use.
    pub fn sset(&mut self, x: i32, y: i32, color: u8) {
        if x < 0 || y < 0 || x >= 128 || y >= 128 {
            return;
        }
        let byte_off = (y as u32) * 64 + (x as u32) / 2;
        let old = self.peek(byte_off);
        let new = if x % 2 == 0 {
            (old & 0xF0) | (color & 0x0F)
        } else {
            (old & 0x0F) | ((color & 0x0F) << 4)
        };
        self.poke(byte_off, new);
    }
}

fn order(a: i32, b: i32) -> (i32, i32) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Cohen-Sutherland line clipping against `[xmin,xmax] x [ymin,ymax]`,
/// using 64-bit intermediates per spec.md §4.4. Returns `false` if the
/// segment is entirely outside.
fn cohen_sutherland_clip(x0: &mut i32, y0: &mut i32, x1: &mut i32, y1: &mut i32, xmin: i64, ymin: i64, xmax: i64, ymax: i64) -> bool {
    const INSIDE: u8 = 0;
    const LEFT: u8 = 1;
    const RIGHT: u8 = 2;
    const BOTTOM: u8 = 4;
    const TOP: u8 = 8;

    fn outcode(x: i64, y: i64, xmin: i64, ymin: i64, xmax: i64, ymax: i64) -> u8 {
        let mut code = INSIDE;
        if x < xmin { code |= LEFT; } else if x > xmax { code |= RIGHT; }
        if y < ymin { code |= BOTTOM; } else if y > ymax { code |= TOP; }
        code
    }

    let (mut px0, mut py0, mut px1, mut py1) = (*x0 as i64, *y0 as i64, *x1 as i64, *y1 as i64);
    let mut code0 = outcode(px0, py0, xmin, ymin, xmax, ymax);
    let mut code1 = outcode(px1, py1, xmin, ymin, xmax, ymax);

    loop {
        if code0 | code1 == 0 {
            *x0 = px0 as i32; *y0 = py0 as i32; *x1 = px1 as i32; *y1 = py1 as i32;
            return true;
        }
        if code0 & code1 != 0 {
            return false;
        }
        let code_out = if code0 != 0 { code0 } else { code1 };
        let (x, y);
        if code_out & TOP != 0 {
            x = px0 + (px1 - px0) * (ymax - py0) / (py1 - py0);
            y = ymax;
        } else if code_out & BOTTOM != 0 {
            x = px0 + (px1 - px0) * (ymin - py0) / (py1 - py0);
            y = ymin;
        } else if code_out & RIGHT != 0 {
            y = py0 + (py1 - py0) * (xmax - px0) / (px1 - px0);
            x = xmax;
        } else {
            y = py0 + (py1 - py0) * (xmin - px0) / (px1 - px0);
            x = xmin;
        }
        if code_out == code0 {
            px0 = x; py0 = y;
            code0 = outcode(px0, py0, xmin, ymin, xmax, ymax);
        } else {
            px1 = x; py1 = y;
            code1 = outcode(px1, py1, xmin, ymin, xmax, ymax);
        }
    }
}

fn bresenham(x0: i32, y0: i32, x1: i32, y1: i32, mut plot: impl FnMut(i32, i32)) {
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);
    loop {
        plot(x, y);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn bresenham_points(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<(i32, i32)> {
    let mut points = Vec::new();
    bresenham(x0, y0, x1, y1, |x, y| points.push((x, y)));
    points
}

fn midpoint_circle(r: i32, mut plot: impl FnMut(i32, i32)) {
    if r < 0 {
        return;
    }
    let mut x = r;
    let mut y = 0;
    let mut err = 1 - r;
    while x >= y {
        plot(x, y); plot(y, x); plot(-y, x); plot(-x, y);
        plot(-x, -y); plot(-y, -x); plot(y, -x); plot(x, -y);
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

/// Bresenham ellipse rasterization with eight-way symmetry, offsets from
/// the ellipse center.
fn bresenham_ellipse(rx: f64, ry: f64, mut plot: impl FnMut(f64, f64)) {
    if rx <= 0.0 || ry <= 0.0 {
        return;
    }
    let rx2 = rx * rx;
    let ry2 = ry * ry;
    let mut x = 0.0f64;
    let mut y = ry;

    let mut d1 = ry2 - rx2 * ry + 0.25 * rx2;
    let mut dx = 2.0 * ry2 * x;
    let mut dy = 2.0 * rx2 * y;

    while dx < dy {
        plot(x, y); plot(-x, y); plot(x, -y); plot(-x, -y);
        if d1 < 0.0 {
            x += 1.0;
            dx += 2.0 * ry2;
            d1 += dx + ry2;
        } else {
            x += 1.0;
            y -= 1.0;
            dx += 2.0 * ry2;
            dy -= 2.0 * rx2;
            d1 += dx - dy + ry2;
        }
    }

    let mut d2 = ry2 * (x + 0.5).powi(2) + rx2 * (y - 1.0).powi(2) - rx2 * ry2;
    while y >= 0.0 {
        plot(x, y); plot(-x, y); plot(x, -y); plot(-x, -y);
        if d2 > 0.0 {
            y -= 1.0;
            dy -= 2.0 * rx2;
            d2 += rx2 - dy;
        } else {
            y -= 1.0;
            x += 1.0;
            dx += 2.0 * ry2;
            dy -= 2.0 * rx2;
            d2 += dx - dy + rx2;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cls_fills_framebuffer_and_screen_ram() {
        let mut m = Machine::new();
        m.cls(5);
        assert_eq!(m.framebuffer[0], 5);
        assert_eq!(m.peek(0x6000), 0x55);
    }

    #[test]
    fn pset_respects_clip_rect() {
        let mut m = Machine::new();
        m.set_clip_rect(10, 10, 5, 5);
        m.pset(0, 0, 7);
        assert_eq!(m.framebuffer[0], 0);
        m.pset(12, 12, 7);
        assert_eq!(m.framebuffer[12 * crate::SCREEN_WIDTH + 12], 7);
    }

    #[test]
    fn pset_remaps_through_draw_palette() {
        let mut m = Machine::new();
        let mut palette = m.draw_palette();
        palette[7] = 8;
        for (i, c) in palette.iter().enumerate() {
            m.ram[0x5F00 + i] = *c;
        }
        m.pset(0, 0, 7);
        assert_eq!(m.pget(0, 0), 8);
    }

    #[test]
    fn line_horizontal_fast_path_matches_pixel_writes() {
        let mut m = Machine::new();
        m.line(0, 0, 10, 0, 6);
        for x in 0..=10 {
            assert_eq!(m.pget(x, 0), 6);
        }
    }

    #[test]
    fn rectfill_fills_interior() {
        let mut m = Machine::new();
        m.rectfill(2, 2, 5, 5, 9);
        for y in 2..=5 {
            for x in 2..=5 {
                assert_eq!(m.pget(x, y), 9);
            }
        }
        assert_eq!(m.pget(1, 1), 0);
    }

    #[test]
    fn print_advances_cursor_and_draws_nonblank_glyph() {
        let mut m = Machine::new();
        let end_x = m.print("A", Some(0), Some(0), Some(7));
        assert_eq!(end_x, 4);
    }

    #[test]
    fn mget_out_of_range_is_zero() {
        let m = Machine::new();
        assert_eq!(m.mget(-1, 0), 0);
        assert_eq!(m.mget(200, 0), 0);
    }

    #[test]
    fn mset_on_lower_map_half_aliases_shared_sprite_region() {
        let mut m = Machine::new();
        // (x=5, y=32) -> idx = 32*128+5 = 4101 -> ram[0x1000 + 5]
        m.mset(5, 32, 0x42);
        assert_eq!(m.ram[0x1000 + 5], 0x42);
        assert_eq!(m.mget(5, 32), 0x42);
        // must not have touched the sprite-flags/music/sfx region.
        assert_eq!(m.ram[0x3000 + 5], 0);
    }

    #[test]
    fn print_newline_resets_x_and_advances_y() {
        let mut m = Machine::new();
        let end_x = m.print("A\nB", Some(10), Some(10), Some(7));
        assert_eq!(end_x, 14);
        assert_eq!(m.gpu_state.cur_x, 10);
    }

    #[test]
    fn print_tab_aligns_to_sixteen_pixel_stops() {
        let mut m = Machine::new();
        let end_x = m.print("\t", Some(0), Some(0), Some(7));
        assert_eq!(end_x, 16);
    }

    #[test]
    fn print_backspace_retreats_but_not_past_start() {
        let mut m = Machine::new();
        let end_x = m.print("\x08", Some(0), Some(0), Some(7));
        assert_eq!(end_x, 0);
    }

    #[test]
    fn print_font_switch_codes_toggle_custom_font_flag() {
        let mut m = Machine::new();
        m.print("\x0E", None, None, None);
        assert!(m.gpu_state.use_custom_font);
        m.print("\x0F", None, None, None);
        assert!(!m.gpu_state.use_custom_font);
    }
}
