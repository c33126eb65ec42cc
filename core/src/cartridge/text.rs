//! `.p8` plain-text cart parsing: named sections `__lua__`, `__gfx__`,
//! `__gff__`, `__map__`, `__sfx__`, `__music__` (spec.md §4.2, §6).
//! Unspecified patterns and trailing data are zero-initialized.

use super::{CartImage, CartLoadError, FLAGS_SIZE, GFX_SIZE, MAP_SIZE, MUSIC_SIZE, SFX_SIZE};

pub fn parse(text: &str) -> Result<CartImage, CartLoadError> {
    let mut img = CartImage::blank();

    // A missing `__lua__` section is a load error (spec.md §7); a present
    // but empty one is the valid blank-boot cart.
    let lua = extract_section(text, "lua").ok_or(CartLoadError::MissingCode)?;
    img.code = lua.to_string();

    if let Some(section) = extract_section(text, "gfx") {
        parse_hex_grid(section, &mut img.gfx, GFX_SIZE * 2); // 2 pixels/byte
    }
    if let Some(section) = extract_section(text, "gff") {
        parse_hex_bytes(section, &mut img.flags, FLAGS_SIZE);
    }
    if let Some(section) = extract_section(text, "map") {
        parse_hex_bytes(section, &mut img.map, MAP_SIZE);
    }
    if let Some(section) = extract_section(text, "sfx") {
        parse_sfx(section, &mut img.sfx);
    }
    if let Some(section) = extract_section(text, "music") {
        parse_music(section, &mut img.music);
    }

    Ok(img)
}

/// Finds a named section (a line reading exactly `__tag__`) and returns
/// everything up to the next section tag or end of file, matching
/// `original_source/src/core/real8_cart.cpp`'s `extractSection` scanning
/// rule (skip the tag line itself, stop at the next `__..__` line).
fn extract_section<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let needle = format!("__{tag}__");
    let tag_line_start = text.lines().find(|line| line.trim_end() == needle)?;
    let tag_pos = text.find(tag_line_start)?;
    let after_tag = tag_pos + tag_line_start.len();
    let rest = &text[after_tag..];
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')).unwrap_or(rest);

    let end = rest
        .lines()
        .scan(0usize, |consumed, line| {
            let this = *consumed;
            *consumed += line.len() + 1;
            Some((this, line))
        })
        .find(|(_, line)| line.starts_with("__") && line.trim_end().ends_with("__"))
        .map(|(offset, _)| offset);

    Some(match end {
        Some(end) => rest[..end].trim_end_matches(['\r', '\n']),
        None => rest.trim_end_matches(['\r', '\n']),
    })
}

/// Parses a hex digit grid where every character is one nibble (pixel
/// color), packing two nibbles per byte (low nibble = even X), matching
/// `__gfx__`'s layout.
fn parse_hex_grid(section: &str, out: &mut [u8], max_nibbles: usize) {
    let mut nibble_idx = 0usize;
    for ch in section.chars().filter(|c| c.is_ascii_hexdigit()) {
        if nibble_idx >= max_nibbles {
            break;
        }
        let val = ch.to_digit(16).unwrap() as u8;
        let byte_idx = nibble_idx / 2;
        if byte_idx >= out.len() {
            break;
        }
        if nibble_idx % 2 == 0 {
            out[byte_idx] = (out[byte_idx] & 0xF0) | val;
        } else {
            out[byte_idx] = (out[byte_idx] & 0x0F) | (val << 4);
        }
        nibble_idx += 1;
    }
}

/// Parses a hex-pair-per-byte grid (`__gff__`/`__map__`).
fn parse_hex_bytes(section: &str, out: &mut [u8], max_bytes: usize) {
    let hex: Vec<char> = section.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    for (i, pair) in hex.chunks(2).enumerate() {
        if i >= max_bytes || pair.len() < 2 {
            break;
        }
        let hi = pair[0].to_digit(16).unwrap() as u8;
        let lo = pair[1].to_digit(16).unwrap() as u8;
        out[i] = (hi << 4) | lo;
    }
}

/// `__sfx__`: one line per SFX id, `header(4 bytes, 8 hex digits)` then up
/// to 32 notes of 5 hex digits each (pitch-2/instrument-1/volume-1/
/// effect-1), packed per spec.md §4.5's `sfx_ram[id*68 + row*2]` layout.
fn parse_sfx(section: &str, out: &mut [u8]) {
    for (id, line) in section.lines().enumerate() {
        if id >= SFX_SIZE / 68 {
            break;
        }
        let hex: Vec<char> = line.chars().filter(|c| c.is_ascii_hexdigit()).collect();
        if hex.len() < 8 {
            continue;
        }
        let base = id * 68;
        let mut header = [0u8; 4];
        for i in 0..4 {
            header[i] = (hex[i * 2].to_digit(16).unwrap() as u8) << 4
                | hex[i * 2 + 1].to_digit(16).unwrap() as u8;
        }
        out[base + 64..base + 68].copy_from_slice(&header);

        let notes = &hex[8..];
        for (row, note) in notes.chunks(5).enumerate() {
            if row >= 32 || note.len() < 5 {
                break;
            }
            let pitch = (note[0].to_digit(16).unwrap() as u8) << 4
                | note[1].to_digit(16).unwrap() as u8;
            let instr = note[2].to_digit(16).unwrap() as u8 & 0x07;
            let vol = note[3].to_digit(16).unwrap() as u8 & 0x07;
            let eff = note[4].to_digit(16).unwrap() as u8 & 0x03;
            let combined = (instr << 5) | (vol << 2) | eff;
            out[base + row * 2] = pitch;
            out[base + row * 2 + 1] = combined;
        }
    }
}

/// `__music__`: one line per pattern, a hex flag byte then four decimal
/// channel ids (`-1` = empty channel, encoded as `0x40` silent).
fn parse_music(section: &str, out: &mut [u8]) {
    for (pattern, line) in section.lines().enumerate() {
        if pattern >= MUSIC_SIZE / 4 {
            break;
        }
        let mut tokens = line.split_whitespace();
        let Some(flag_tok) = tokens.next() else { continue };
        let Ok(flags) = u8::from_str_radix(flag_tok, 16) else { continue };

        let base = pattern * 4;
        for ch in 0..4 {
            let id: i32 = tokens.next().and_then(|t| t.parse().ok()).unwrap_or(-1);
            let mut byte = if id < 0 { 0x40 } else { (id as u8) & 0x3F };
            // bit0/1/2 -> loop-start/loop-back/stop on channels 0/1/2.
            if ch < 3 && (flags & (1 << ch)) != 0 {
                byte |= 0x80;
            }
            out[base + ch] = byte;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn extracts_lua_section() {
        let text = "pico-8 cartridge // http://www.pico-8.com\nversion 16\n__lua__\nfunction _draw()\nend\n__gfx__\n0000\n";
        let code = extract_section(text, "lua").unwrap();
        assert_eq!(code, "function _draw()\nend");
    }

    #[test]
    fn parses_gfx_nibbles() {
        let mut gfx = vec![0u8; 2];
        parse_hex_grid("1234", &mut gfx, 4);
        assert_eq!(gfx, vec![0x21, 0x43]);
    }

    #[test]
    fn parses_sfx_row() {
        let mut sfx = vec![0u8; SFX_SIZE];
        // header 00000000, one note: pitch=2a instrument=3 vol=5 eff=1
        parse_sfx("000000002a351", &mut sfx);
        assert_eq!(sfx[0], 0x2a);
        let combined = sfx[1];
        assert_eq!(combined, (3 << 5) | (5 << 2) | 1);
    }

    #[test]
    fn parses_music_row_with_silent_channel() {
        let mut music = vec![0u8; MUSIC_SIZE];
        parse_music("01 0 1 -1 -1", &mut music);
        assert_eq!(music[0], 0x80); // channel 0, loop-start flag set
        assert_eq!(music[1], 1);
        assert_eq!(music[2], 0x40);
        assert_eq!(music[3], 0x40);
    }

    #[test]
    fn missing_lua_section_is_a_load_error() {
        let text = "pico-8 cartridge // http://www.pico-8.com\nversion 16\n__gfx__\n0000\n";
        assert!(matches!(parse(text), Err(CartLoadError::MissingCode)));
    }

    #[test]
    fn empty_lua_section_parses_as_blank_boot() {
        let text = "pico-8 cartridge // http://www.pico-8.com\nversion 16\n__lua__\n__gfx__\n0000\n";
        let img = parse(text).unwrap();
        assert_eq!(img.code, "");
    }
}
