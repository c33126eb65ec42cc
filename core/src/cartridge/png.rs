//! `.p8.png` cart decoding: cart bytes steganographically packed into the
//! low two bits of each RGBA channel (spec.md §4.2, §6).

use png::{BitDepth, ColorType, Decoder};

use super::CartLoadError;

/// Decodes a PNG cart into the raw 32 KiB cart image (still containing
/// the compressed code region at the tail).
pub fn decode(bytes: &[u8]) -> Result<Vec<u8>, CartLoadError> {
    let decoder = Decoder::new(bytes);
    let mut reader = decoder
        .read_info()
        .map_err(|e| CartLoadError::Png(e.to_string()))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| CartLoadError::Png(e.to_string()))?;
    let pixels = &buf[..info.buffer_size()];

    if info.bit_depth != BitDepth::Eight {
        return Err(CartLoadError::Png("unsupported bit depth".into()));
    }

    let channels: usize = match info.color_type {
        ColorType::Rgba => 4,
        ColorType::Rgb => 3,
        other => return Err(CartLoadError::Png(format!("unsupported color type {other:?}"))),
    };

    let out_len = super::GFX_SIZE + super::MAP_SIZE + super::FLAGS_SIZE
        + super::MUSIC_SIZE + super::SFX_SIZE
        + (0x8000 - (super::GFX_SIZE + super::MAP_SIZE + super::FLAGS_SIZE + super::MUSIC_SIZE + super::SFX_SIZE));
    let mut out = Vec::with_capacity(out_len);

    for pixel in pixels.chunks_exact(channels) {
        if out.len() >= out_len {
            break;
        }
        let (r, g, b, a) = if channels == 4 {
            (pixel[0], pixel[1], pixel[2], pixel[3])
        } else {
            (pixel[0], pixel[1], pixel[2], 0xFF)
        };

        let byte = ((a & 0x03) << 6) | ((r & 0x03) << 4) | ((g & 0x03) << 2) | (b & 0x03);
        out.push(byte);
    }

    if out.len() < out_len {
        out.resize(out_len, 0);
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unrecognized_bytes_error_cleanly() {
        let bogus = [0x89, b'P', b'N', b'G', 0, 0, 0, 0];
        assert!(decode(&bogus).is_err());
    }
}
