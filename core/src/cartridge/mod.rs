//! Cart loading: decodes `.p8.png` (PNG steganography) and `.p8` (plain
//! text) cart files into a [`CartImage`], the read-only source of truth
//! RAM is (re)populated from on load and reset (spec.md §4.2, §3
//! "Lifecycles").

mod legacy;
mod png;
mod pxa;
mod text;

use thiserror::Error;

/// Size, in bytes, of each cart section (matching the RAM region layout
/// in spec.md §3).
pub const GFX_SIZE: usize = 0x2000;
pub const MAP_SIZE: usize = 0x1000;
pub const FLAGS_SIZE: usize = 0x100;
pub const MUSIC_SIZE: usize = 0x100;
pub const SFX_SIZE: usize = 0x1100;

/// Total size of the uncompressed cart image header (everything before
/// the code region), matching spec.md §4.2's layout table.
const HEADER_SIZE: usize = GFX_SIZE + MAP_SIZE + FLAGS_SIZE + MUSIC_SIZE + SFX_SIZE;

/// Decoded cart contents. Consumed once into RAM on load; retained only
/// so the frame driver can restore RAM on a soft reset (spec.md §3).
#[derive(Debug, Clone)]
pub struct CartImage {
    pub gfx: Vec<u8>,
    pub map: Vec<u8>,
    pub flags: Vec<u8>,
    pub music: Vec<u8>,
    pub sfx: Vec<u8>,
    pub code: String,
}

impl CartImage {
    fn blank() -> Self {
        CartImage {
            gfx: vec![0; GFX_SIZE],
            map: vec![0; MAP_SIZE],
            flags: vec![0; FLAGS_SIZE],
            music: vec![0; MUSIC_SIZE],
            sfx: vec![0; SFX_SIZE],
            code: String::new(),
        }
    }

    /// Decodes a cart from raw file bytes, dispatching on the PNG
    /// signature vs. plain text (spec.md §4.2, §6 "Cart file formats").
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CartLoadError> {
        if bytes.starts_with(&PNG_SIGNATURE) {
            let raw = png::decode(bytes)?;
            Self::from_header_and_code(&raw)
        } else {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| CartLoadError::UnknownFormat)?;
            text::parse(text)
        }
    }

    /// Splits a decoded 32 KiB cart image (gfx/map/flags/music/sfx
    /// verbatim, code region still compressed) into a [`CartImage`].
    fn from_header_and_code(raw: &[u8]) -> Result<Self, CartLoadError> {
        if raw.len() < HEADER_SIZE {
            return Err(CartLoadError::Truncated);
        }
        let mut off = 0;
        let take = |off: &mut usize, len: usize| -> Vec<u8> {
            let slice = raw[*off..*off + len].to_vec();
            *off += len;
            slice
        };

        let gfx = take(&mut off, GFX_SIZE);
        let map = take(&mut off, MAP_SIZE);
        let flags = take(&mut off, FLAGS_SIZE);
        let music = take(&mut off, MUSIC_SIZE);
        let sfx = take(&mut off, SFX_SIZE);
        let code_region = &raw[off..];

        let code = decode_code(code_region)?;

        Ok(CartImage { gfx, map, flags, music, sfx, code })
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Dispatches the code region on its signature: PXA (`\0pxa`), legacy
/// (`:c:\0`), or plain text (spec.md §4.2).
fn decode_code(region: &[u8]) -> Result<String, CartLoadError> {
    if region.len() >= 8 && region[0..4] == [0x00, b'p', b'x', b'a'] {
        return pxa::decompress(region);
    }
    if region.len() >= 8 && region[0..4] == [b':', b'c', b':', 0x00] {
        return legacy::decompress(region);
    }

    // Plain-text fallback: the first (up to) 10 bytes must all be either
    // `\0` or printable-and-above (tab and up), matching
    // original_source/src/core/real8_cart.cpp's detection rule.
    let probe_len = region.len().min(10);
    let looks_like_text = region[..probe_len].iter().all(|&b| b == 0 || b >= 0x09);
    if looks_like_text {
        let end = region.iter().position(|&b| b == 0).unwrap_or(region.len());
        return Ok(String::from_utf8_lossy(&region[..end]).into_owned());
    }

    Err(CartLoadError::UnknownCompression)
}

/// Taxonomy per spec.md §7 "CartLoadError".
#[derive(Debug, Error)]
pub enum CartLoadError {
    #[error("unknown cart signature")]
    UnknownFormat,

    #[error("unknown compression format")]
    UnknownCompression,

    #[error("cart data truncated")]
    Truncated,

    #[error("corrupt PNG cart: {0}")]
    Png(String),

    #[error("missing __lua__ section")]
    MissingCode,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn blank_image_has_expected_sizes() {
        let img = CartImage::blank();
        assert_eq!(img.gfx.len(), GFX_SIZE);
        assert_eq!(img.map.len(), MAP_SIZE);
        assert_eq!(img.flags.len(), FLAGS_SIZE);
        assert_eq!(img.music.len(), MUSIC_SIZE);
        assert_eq!(img.sfx.len(), SFX_SIZE);
    }

    #[test]
    fn plain_code_region_passthrough() {
        let code = decode_code(b"function _draw() end\0").unwrap();
        assert_eq!(code, "function _draw() end");
    }

    #[test]
    fn unknown_signature_errors() {
        let region = [0xFFu8; 16];
        assert!(matches!(decode_code(&region), Err(CartLoadError::UnknownCompression)));
    }
}
