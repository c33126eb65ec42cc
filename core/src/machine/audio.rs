//! 4-channel SFX engine and music pattern sequencer (spec.md §4.5).
//!
//! The teacher's own `sound.rs` square/wave/noise channel model (APU-style:
//! phase accumulators, LUT waveforms, an LFSR for noise) is the closest
//! grounding the pack offers even though it targets a different console;
//! this module keeps that channel shape and drives it from PICO-8's
//! sfx/music RAM layout instead of Game Boy sound registers.

use std::sync::OnceLock;

use super::Machine;
use crate::fixed::FixedNum;
use crate::SAMPLE_RATE;

const WAVE_LEN: usize = 2048;
const NUM_WAVEFORMS: usize = 6;

/// Waveform LUTs for instruments 0-5: triangle, tilted triangle, sawtooth,
/// square, pulse, organ.
fn waveforms() -> &'static [[i16; WAVE_LEN]; NUM_WAVEFORMS] {
    static TABLE: OnceLock<[[i16; WAVE_LEN]; NUM_WAVEFORMS]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut tables = [[0i16; WAVE_LEN]; NUM_WAVEFORMS];
        for i in 0..WAVE_LEN {
            let phase = i as f64 / WAVE_LEN as f64;

            // 0: triangle
            let tri = 1.0 - 4.0 * (phase - 0.5).abs();
            tables[0][i] = (tri * 10000.0) as i16;

            // 1: tilted triangle (asymmetric rise/fall)
            let tilted = if phase < 0.25 {
                phase * 4.0
            } else if phase < 0.75 {
                1.0 - (phase - 0.25) * 2.0
            } else {
                -1.0 + (phase - 0.75) * 4.0
            };
            tables[1][i] = (tilted * 10000.0) as i16;

            // 2: sawtooth
            let saw = phase * 2.0 - 1.0;
            tables[2][i] = (saw * 10000.0) as i16;

            // 3: square
            let sq = if phase < 0.5 { 1.0 } else { -1.0 };
            tables[3][i] = (sq * 10000.0) as i16;

            // 4: pulse (1/3 duty)
            let pulse = if phase < 1.0 / 3.0 { 1.0 } else { -1.0 };
            tables[4][i] = (pulse * 10000.0) as i16;

            // 5: organ (fundamental + second harmonic)
            let organ = (phase * std::f64::consts::TAU).sin() * 0.7
                + (phase * 2.0 * std::f64::consts::TAU).sin() * 0.3;
            tables[5][i] = (organ * 10000.0) as i16;
        }
        tables
    })
}

/// One of 4 SFX playback channels (spec.md §3 "SfxChannel").
#[derive(Debug, Clone, Copy, Default)]
pub struct SfxChannel {
    pub sfx_id: i32,
    pub offset: u8,
    pub length: u8,
    pub row: u8,
    pub tick_in_row: u32,
    pub phase: u32,
    pub volume: u8,
    pub target_volume: u8,
    pub prev_pitch: u8,
    pub lfsr: u16,
    pub playing: bool,
}

impl SfxChannel {
    fn idle() -> Self {
        SfxChannel { lfsr: 0x7FFF, ..Default::default() }
    }
}

/// Music sequencer state (spec.md §3 "MusicState").
#[derive(Debug, Clone, Copy)]
pub struct MusicState {
    pub pattern: i32,
    pub tick: u32,
    pub channel_mask: u8,
}

impl Default for MusicState {
    fn default() -> Self {
        MusicState { pattern: -1, tick: 0, channel_mask: 0x0F }
    }
}

pub struct AudioEngine {
    pub channels: [SfxChannel; 4],
    pub music: MusicState,
    pub volume_sfx: u8,
    pub volume_music: u8,
}

impl AudioEngine {
    pub fn new() -> Self {
        AudioEngine {
            channels: [SfxChannel::idle(); 4],
            music: MusicState::default(),
            volume_sfx: 10,
            volume_music: 10,
        }
    }

    pub fn snapshot(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 * 20 + 8);
        for ch in &self.channels {
            out.extend_from_slice(&ch.sfx_id.to_le_bytes());
            out.push(ch.offset);
            out.push(ch.length);
            out.push(ch.row);
            out.extend_from_slice(&ch.tick_in_row.to_le_bytes());
            out.extend_from_slice(&ch.phase.to_le_bytes());
            out.push(ch.volume);
            out.push(ch.target_volume);
            out.push(ch.prev_pitch);
            out.extend_from_slice(&ch.lfsr.to_le_bytes());
            out.push(ch.playing as u8);
        }
        out.extend_from_slice(&self.music.pattern.to_le_bytes());
        out.extend_from_slice(&self.music.tick.to_le_bytes());
        out.push(self.music.channel_mask);
        out.push(self.volume_sfx);
        out.push(self.volume_music);
        out
    }

    pub fn restore(&mut self, data: &[u8]) {
        let mut off = 0;
        macro_rules! take {
            ($n:expr) => {{
                let slice = &data[off..off + $n];
                off += $n;
                slice
            }};
        }
        if data.len() < 4 * 20 + 8 {
            return;
        }
        for ch in &mut self.channels {
            ch.sfx_id = i32::from_le_bytes(take!(4).try_into().unwrap());
            ch.offset = take!(1)[0];
            ch.length = take!(1)[0];
            ch.row = take!(1)[0];
            ch.tick_in_row = u32::from_le_bytes(take!(4).try_into().unwrap());
            ch.phase = u32::from_le_bytes(take!(4).try_into().unwrap());
            ch.volume = take!(1)[0];
            ch.target_volume = take!(1)[0];
            ch.prev_pitch = take!(1)[0];
            ch.lfsr = u16::from_le_bytes(take!(2).try_into().unwrap());
            ch.playing = take!(1)[0] != 0;
        }
        self.music.pattern = i32::from_le_bytes(take!(4).try_into().unwrap());
        self.music.tick = u32::from_le_bytes(take!(4).try_into().unwrap());
        self.music.channel_mask = take!(1)[0];
        self.volume_sfx = take!(1)[0];
        self.volume_music = take!(1)[0];
    }
}

impl Default for AudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

const SFX_ENTRY_SIZE: usize = 68;
const SFX_BASE: usize = 0x3200;
const MUSIC_BASE: usize = 0x3100;
const NOTES_PER_SFX: usize = 32;
const TICKS_PER_NOTE_DEFAULT: u32 = 8;

fn pitch_to_freq(pitch: u8) -> f64 {
    440.0 * 2f64.powf((pitch as f64 - 33.0) / 12.0)
}

impl Machine {
    /// `sfx(id, ch, offset, length)`. `id = -1` stops `ch`; `id = -2`
    /// releases it (spec.md §4.5).
    pub fn sfx(&mut self, id: i32, channel: i32, offset: i32, length: i32) {
        if id == -1 || id == -2 {
            if let Some(ch) = self.resolve_channel(channel) {
                self.audio.channels[ch] = SfxChannel::idle();
            }
            return;
        }
        let ch = match self.resolve_channel(channel) {
            Some(ch) => ch,
            None => self.audio.channels.iter().position(|c| !c.playing).unwrap_or(0),
        };
        self.audio.channels[ch] = SfxChannel {
            sfx_id: id,
            offset: offset.max(0) as u8,
            length: if length < 0 { NOTES_PER_SFX as u8 } else { length as u8 },
            row: offset.max(0) as u8,
            tick_in_row: 0,
            phase: 0,
            volume: 0,
            target_volume: 0,
            prev_pitch: 0,
            lfsr: 0x7FFF,
            playing: true,
        };
    }

    fn resolve_channel(&self, channel: i32) -> Option<usize> {
        if (0..4).contains(&channel) { Some(channel as usize) } else { None }
    }

    /// `music(pat, fade_ms, mask)`. `pat = -1` stops.
    pub fn music(&mut self, pattern: i32, _fade_ms: i32, mask: i32) {
        if pattern < 0 {
            self.audio.music = MusicState::default();
            return;
        }
        self.audio.music.pattern = pattern;
        self.audio.music.tick = 0;
        if mask >= 0 {
            self.audio.music.channel_mask = mask as u8;
        }
    }

    fn sfx_header(&self, id: u8) -> (u8, u8, u8) {
        let base = SFX_BASE + id as usize * SFX_ENTRY_SIZE + NOTES_PER_SFX * 2;
        (self.ram[base], self.ram[base + 1], self.ram[base + 2])
    }

    fn sfx_note(&self, id: u8, row: u8) -> (u8, u8, u8, u8) {
        let base = SFX_BASE + id as usize * SFX_ENTRY_SIZE + row as usize * 2;
        let pitch = self.ram[base] & 0x3F;
        let combined = self.ram[base + 1];
        let instrument = (combined >> 5) & 0x07;
        let volume = (combined >> 2) & 0x07;
        let effect = combined & 0x03;
        (pitch, instrument, volume, effect)
    }

    /// Advances the music sequencer by one tick if active, dispatching
    /// `sfx` calls on the appropriate channels per the pattern table.
    /// Called once per logic frame by the frame driver.
    pub(crate) fn advance_music(&mut self) {
        if self.audio.music.pattern < 0 {
            return;
        }
        let pattern = self.audio.music.pattern as usize;
        let base = MUSIC_BASE + pattern * 4;
        for ch in 0..4u8 {
            if self.audio.music.channel_mask & (1 << ch) == 0 {
                continue;
            }
            let byte = self.ram[base + ch as usize];
            let sfx_id = byte & 0x3F;
            if sfx_id == 0x40 || sfx_id >= 64 {
                continue;
            }
            if !self.audio.channels[ch as usize].playing {
                self.sfx(sfx_id as i32, ch as i32, 0, -1);
            }
        }
    }

    /// Generates `count` signed-16-bit mono samples and pushes them to the
    /// host (spec.md §4.5 "Scheduling model").
    pub fn generate_audio(&mut self, count: usize) -> Vec<i16> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.generate_sample());
        }
        out
    }

    fn generate_sample(&mut self) -> i16 {
        let mut mix = 0i32;
        for ch in 0..4 {
            if !self.audio.channels[ch].playing {
                continue;
            }
            mix += self.tick_channel(ch) as i32;
        }
        mix /= 4;
        let volume_scale = self.audio.volume_sfx as f64 / 10.0;
        ((mix as f64) * volume_scale).clamp(i16::MIN as f64, i16::MAX as f64) as i16
    }

    fn tick_channel(&mut self, ch: usize) -> i16 {
        let (sfx_id, row, offset, length) = {
            let c = &self.audio.channels[ch];
            (c.sfx_id as u8, c.row, c.offset, c.length)
        };
        let (loop_start, loop_end, speed_raw) = self.sfx_header(sfx_id);
        let speed = if speed_raw == 0 { TICKS_PER_NOTE_DEFAULT } else { speed_raw as u32 };
        let (pitch, instrument, note_vol, effect) = self.sfx_note(sfx_id, row);

        let c = &mut self.audio.channels[ch];
        c.target_volume = note_vol * 18;
        if c.volume < c.target_volume {
            c.volume = (c.volume + 4).min(c.target_volume);
        } else if c.volume > c.target_volume {
            c.volume = c.volume.saturating_sub(4).max(c.target_volume);
        }

        let effective_pitch = apply_effect(effect, pitch, c.prev_pitch, c.tick_in_row, speed);
        let freq = pitch_to_freq(effective_pitch);
        let phase_step = ((freq * 2048.0 / SAMPLE_RATE as f64) * (1u64 << 16) as f64) as u32;

        c.phase = c.phase.wrapping_add(phase_step);
        let table_index = ((c.phase >> 16) as usize) % WAVE_LEN;

        let raw = if instrument == 6 {
            // Noise: 15-bit LFSR, polynomial x^15 + x^14 + 1.
            let bit = ((c.lfsr ^ (c.lfsr >> 1)) & 1) as u16;
            c.lfsr = (c.lfsr >> 1) | (bit << 14);
            if c.lfsr & 1 != 0 { 10000 } else { -10000 }
        } else if instrument == 7 {
            // Phaser: triangle with slow phase modulation.
            let mod_index = (table_index + (c.phase >> 20) as usize % WAVE_LEN) % WAVE_LEN;
            waveforms()[0][mod_index]
        } else {
            waveforms()[instrument.min(5) as usize][table_index]
        };

        let sample = (raw as i32 * c.volume as i32 / 255) as i16;

        c.tick_in_row += 1;
        if c.tick_in_row >= speed {
            c.tick_in_row = 0;
            c.prev_pitch = pitch;
            let next_row = c.row + 1;
            let end = offset.saturating_add(length);
            if next_row >= end || next_row as usize >= NOTES_PER_SFX {
                if loop_end > loop_start {
                    c.row = loop_start;
                } else {
                    c.playing = false;
                }
            } else {
                c.row = next_row;
            }
        }

        sample
    }
}

/// Applies one of the 8 SFX effects to a note's pitch for the current
/// tick-within-row (spec.md §4.5): 0 none, 1 slide, 2 vibrato, 3 drop,
/// 4 fade-in, 5 fade-out, 6 fast arpeggio, 7 slow arpeggio.
fn apply_effect(effect: u8, pitch: u8, prev_pitch: u8, tick_in_row: u32, speed: u32) -> u8 {
    let progress = if speed == 0 { 1.0 } else { tick_in_row as f64 / speed as f64 };
    match effect {
        1 => {
            // Slide from the previous note's pitch toward this one.
            let delta = pitch as f64 - prev_pitch as f64;
            (prev_pitch as f64 + delta * progress).round().clamp(0.0, 63.0) as u8
        }
        2 => {
            // Vibrato: +/-1 semitone wobble.
            let wobble = ((tick_in_row as f64 * std::f64::consts::TAU / 4.0).sin()).round() as i32;
            (pitch as i32 + wobble).clamp(0, 63) as u8
        }
        3 => {
            // Drop: pitch falls toward 0 over the row.
            (pitch as f64 * (1.0 - progress)).round().clamp(0.0, 63.0) as u8
        }
        6 => {
            // Fast arpeggio: alternate pitch, pitch+4, pitch+7 every tick.
            let step = tick_in_row % 3;
            (pitch + [0, 4, 7][step as usize]).min(63)
        }
        7 => {
            // Slow arpeggio: same pattern, one step every 2 ticks.
            let step = (tick_in_row / 2) % 3;
            (pitch + [0, 4, 7][step as usize]).min(63)
        }
        _ => pitch,
    }
}

/// Converts a Q16.16 fade duration in milliseconds to samples at the
/// engine's sample rate, used by `music()`'s fade-in handling once wired
/// into the mixer's volume ramp.
#[allow(dead_code)]
fn fade_samples(fade_ms: FixedNum) -> u32 {
    ((fade_ms.to_f64() / 1000.0) * SAMPLE_RATE as f64).max(0.0) as u32
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sfx_marks_channel_playing() {
        let mut m = Machine::new();
        m.sfx(0, 0, 0, -1);
        assert!(m.audio.channels[0].playing);
    }

    #[test]
    fn sfx_stop_clears_channel() {
        let mut m = Machine::new();
        m.sfx(0, 0, 0, -1);
        m.sfx(-1, 0, 0, -1);
        assert!(!m.audio.channels[0].playing);
    }

    #[test]
    fn generate_audio_produces_requested_sample_count() {
        let mut m = Machine::new();
        m.sfx(0, 0, 0, -1);
        let samples = m.generate_audio(368);
        assert_eq!(samples.len(), 368);
    }

    #[test]
    fn music_minus_one_stops_sequencer() {
        let mut m = Machine::new();
        m.music(0, 0, -1);
        assert_eq!(m.audio.music.pattern, 0);
        m.music(-1, 0, -1);
        assert_eq!(m.audio.music.pattern, -1);
    }

    #[test]
    fn snapshot_restore_roundtrip() {
        let mut m = Machine::new();
        m.sfx(3, 1, 0, -1);
        let blob = m.audio.snapshot();
        let mut m2 = Machine::new();
        m2.audio.restore(&blob);
        assert_eq!(m2.audio.channels[1].sfx_id, 3);
        assert!(m2.audio.channels[1].playing);
    }
}
