//! Cartdata persistence and save-state snapshot/restore (spec.md §4.9).
//!
//! Grounded on `original_source/real8_gfx.h`'s `GfxState` save/restore
//! struct pattern (the teacher has no equivalent — a Game Boy has no
//! save-state concept), generalized into a struct-of-structs snapshot
//! assembled from each subsystem's own serialized state.

use crate::env::Storage;
use crate::log::*;

/// Number of Q16.16 cartdata slots (spec.md §3).
pub const CARTDATA_SLOTS: usize = 64;
const CARTDATA_BASE: usize = 0x5E00;
const CARTDATA_BYTES: usize = CARTDATA_SLOTS * 4;

/// Tracks which cartdata id (if any) is currently bound, so writes can be
/// flushed back to host storage (spec.md §4.9).
pub struct Persistence {
    pub cartdata_id: Option<String>,
    pub cartdata_dirty: bool,
    /// `cstore`'s destination when no backing file exists to write
    /// through: an in-memory sidecar buffer the host may persist or
    /// discard on its own schedule (SPEC_FULL.md §4 Open Question:
    /// `cstore` never fails for lack of a file).
    pub cstore_buffer: Option<Vec<u8>>,
}

impl Persistence {
    pub fn new() -> Self {
        Persistence { cartdata_id: None, cartdata_dirty: false, cstore_buffer: None }
    }
}

impl Default for Persistence {
    fn default() -> Self {
        Self::new()
    }
}

fn cartdata_path(id: &str) -> String {
    format!("/saves/cdata_{id}.dat")
}

impl super::Machine {
    /// `cartdata(id)`: binds the 64-slot region to `id` and loads any
    /// existing 256-byte blob from host storage.
    pub fn cartdata_bind(&mut self, id: &str, storage: &mut impl Storage) {
        self.persistence.cartdata_id = Some(id.to_string());
        self.persistence.cartdata_dirty = false;
        if let Some(bytes) = storage.load_file(&cartdata_path(id)) {
            if bytes.len() == CARTDATA_BYTES {
                self.ram.0[CARTDATA_BASE..CARTDATA_BASE + CARTDATA_BYTES].copy_from_slice(&bytes);
                return;
            }
            warn!("cartdata blob for '{id}' has wrong size, ignoring");
        }
    }

    /// `cartdata(id)` as reachable from a native dispatcher: binds the id
    /// without touching host storage (a [`NativeFn`](crate::script::NativeFn)
    /// only sees `&mut Machine`, never the `Storage` peripheral). A host
    /// that wants the file actually loaded calls [`Self::cartdata_bind`]
    /// directly once it owns both the machine and its storage.
    pub fn cartdata_bind_id(&mut self, id: &str) {
        self.persistence.cartdata_id = Some(id.to_string());
        self.persistence.cartdata_dirty = false;
    }

    /// `reload(dest, source, len)` with no filename argument: copies from
    /// the currently loaded cart's own header sections (the `[filename]`
    /// form, which would read a *different* cart file, has no host I/O
    /// path reachable from here and isn't supported — see DESIGN.md).
    pub fn reload(&mut self, dest: u32, source: u32, len: u32) {
        let Some(cart) = self.cart.clone() else { return };
        let mut header = Vec::with_capacity(cart.gfx.len() + cart.map.len() + cart.flags.len() + cart.music.len() + cart.sfx.len());
        header.extend_from_slice(&cart.gfx);
        header.extend_from_slice(&cart.map);
        header.extend_from_slice(&cart.flags);
        header.extend_from_slice(&cart.music);
        header.extend_from_slice(&cart.sfx);
        for i in 0..len {
            if let Some(&byte) = header.get((source.wrapping_add(i)) as usize) {
                self.poke(dest.wrapping_add(i), byte);
            }
        }
    }

    /// `cstore(dest, source, len)` with no filename argument: copies RAM
    /// into the in-memory sidecar buffer (Open Question resolution above).
    pub fn cstore(&mut self, dest: u32, source: u32, len: u32) {
        let bytes: Vec<u8> = (0..len).map(|i| self.peek(source.wrapping_add(i))).collect();
        let needed = dest as usize + bytes.len();
        let buf = self.persistence.cstore_buffer.get_or_insert_with(Vec::new);
        if buf.len() < needed {
            buf.resize(needed, 0);
        }
        for (i, byte) in bytes.into_iter().enumerate() {
            buf[dest as usize + i] = byte;
        }
    }

    /// `dget(i)`: out-of-range reads return 0 (spec.md §7
    /// "OutOfRangeWarning").
    pub fn dget(&self, index: i32) -> crate::fixed::FixedNum {
        if !(0..CARTDATA_SLOTS as i32).contains(&index) {
            return crate::fixed::FixedNum::ZERO;
        }
        let off = CARTDATA_BASE + index as usize * 4;
        let bits = i32::from_le_bytes([
            self.ram[off], self.ram[off + 1], self.ram[off + 2], self.ram[off + 3],
        ]);
        crate::fixed::FixedNum::from_bits(bits)
    }

    /// `dset(i, v)`: out-of-range writes are ignored. Marks cartdata
    /// dirty so the host can flush it (on `dset` or VM exit, per
    /// spec.md §4.9).
    pub fn dset(&mut self, index: i32, value: crate::fixed::FixedNum) {
        if !(0..CARTDATA_SLOTS as i32).contains(&index) {
            return;
        }
        let off = CARTDATA_BASE + index as usize * 4;
        let bytes = value.bits().to_le_bytes();
        self.ram.0[off..off + 4].copy_from_slice(&bytes);
        self.persistence.cartdata_dirty = true;
    }

    /// Writes the bound cartdata region back to host storage, if dirty.
    pub fn flush_cartdata(&mut self, storage: &mut impl Storage) {
        if !self.persistence.cartdata_dirty {
            return;
        }
        if let Some(id) = self.persistence.cartdata_id.clone() {
            let blob = self.cartdata_snapshot();
            storage.save_file(&cartdata_path(&id), &blob);
            self.persistence.cartdata_dirty = false;
        }
    }

    pub fn cartdata_snapshot(&self) -> Vec<u8> {
        self.ram.0[CARTDATA_BASE..CARTDATA_BASE + CARTDATA_BYTES].to_vec()
    }

    pub fn restore_cartdata_snapshot(&mut self, snapshot: &[u8]) {
        if snapshot.len() == CARTDATA_BYTES {
            self.ram.0[CARTDATA_BASE..CARTDATA_BASE + CARTDATA_BYTES].copy_from_slice(snapshot);
        }
    }

    /// Builds a save-state snapshot: 32 KiB RAM, the audio engine's
    /// serialized state, and a length-prefixed script heap chunk handed
    /// in by the caller (the script bridge owns heap serialization; the
    /// core only frames it, per spec.md §4.9's byte layout).
    pub fn save_state(&self, heap_chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(super::RAM_SIZE + 64 + heap_chunk.len() + 4);
        out.extend_from_slice(&self.ram.0[..]);
        let audio = self.audio.snapshot();
        out.extend_from_slice(&(audio.len() as u32).to_le_bytes());
        out.extend_from_slice(&audio);
        out.extend_from_slice(&(heap_chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(heap_chunk);
        out
    }

    /// Restores RAM and audio state from a snapshot produced by
    /// [`Self::save_state`], syncing hardware caches from the restored
    /// RAM. Returns the heap chunk for the script bridge to evaluate, or
    /// `None` if the blob is malformed (spec.md §7 "StateError": state
    /// remains untouched on failure).
    pub fn load_state(&mut self, data: &[u8]) -> Option<Vec<u8>> {
        if data.len() < super::RAM_SIZE + 4 {
            return None;
        }
        let mut off = 0;
        let ram = &data[off..off + super::RAM_SIZE];
        off += super::RAM_SIZE;

        if data.len() < off + 4 {
            return None;
        }
        let audio_len = u32::from_le_bytes(data[off..off + 4].try_into().ok()?) as usize;
        off += 4;
        if data.len() < off + audio_len + 4 {
            return None;
        }
        let audio_bytes = &data[off..off + audio_len];
        off += audio_len;

        let heap_len = u32::from_le_bytes(data[off..off + 4].try_into().ok()?) as usize;
        off += 4;
        if data.len() < off + heap_len {
            return None;
        }
        let heap = data[off..off + heap_len].to_vec();

        self.ram.0.copy_from_slice(ram);
        self.hw.sprite_base = self.ram[0x5F54];
        self.hw.screen_base = self.ram[0x5F55];
        self.hw.map_base = self.ram[0x5F56];
        self.hw.map_width = self.ram[0x5F57];
        self.audio.restore(audio_bytes);

        // Screen RAM and framebuffer must stay coherent (spec.md §4.3):
        // reconstruct every pixel pair from the restored packed bytes.
        for off in 0..(super::FB_SIZE / 2) {
            let byte = self.ram[0x6000 + off];
            let sy = off / (crate::SCREEN_WIDTH / 2);
            let even_x = (off % (crate::SCREEN_WIDTH / 2)) * 2;
            self.framebuffer[sy * crate::SCREEN_WIDTH + even_x] = byte & 0x0F;
            self.framebuffer[sy * crate::SCREEN_WIDTH + even_x + 1] = (byte >> 4) & 0x0F;
        }

        Some(heap)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixed::FixedNum;

    #[test]
    fn dget_dset_roundtrip() {
        let mut m = super::super::Machine::new();
        m.dset(3, FixedNum::from_int(42));
        assert_eq!(m.dget(3), FixedNum::from_int(42));
    }

    #[test]
    fn out_of_range_dget_is_zero_and_dset_ignored() {
        let mut m = super::super::Machine::new();
        assert_eq!(m.dget(64), FixedNum::ZERO);
        assert_eq!(m.dget(-1), FixedNum::ZERO);
        m.dset(64, FixedNum::from_int(1));
        assert_eq!(m.dget(64), FixedNum::ZERO);
    }

    #[test]
    fn save_state_roundtrip_preserves_ram_and_heap() {
        let mut m = super::super::Machine::new();
        m.dset(0, FixedNum::from_int(7));
        let heap = b"--heap--".to_vec();
        let blob = m.save_state(&heap);

        let mut m2 = super::super::Machine::new();
        let restored_heap = m2.load_state(&blob).unwrap();
        assert_eq!(restored_heap, heap);
        assert_eq!(m2.dget(0), FixedNum::from_int(7));
    }

    #[test]
    fn load_state_rejects_truncated_blob() {
        let mut m = super::super::Machine::new();
        assert!(m.load_state(&[1, 2, 3]).is_none());
    }

    #[test]
    fn cstore_writes_into_sidecar_buffer_without_a_file() {
        let mut m = super::super::Machine::new();
        m.poke(0x1000, 0xAB);
        m.poke(0x1001, 0xCD);
        m.cstore(10, 0x1000, 2);
        let buf = m.persistence.cstore_buffer.as_ref().unwrap();
        assert_eq!(&buf[10..12], &[0xAB, 0xCD]);
    }

    #[test]
    fn reload_with_no_cart_is_a_noop() {
        let mut m = super::super::Machine::new();
        m.reload(0, 0, 16);
        assert_eq!(m.peek(0), 0);
    }
}
