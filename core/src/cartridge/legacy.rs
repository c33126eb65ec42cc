//! Legacy `:c:\0` code decompressor (spec.md §4.2), pinned down exactly by
//! `original_source/src/core/real8_compression.cpp`'s `decompress_legacy`.

use super::CartLoadError;

/// Official PICO-8 legacy lookup table. Index 0 (`^`) is never emitted as
/// a literal value; value 0 means "the next byte is a raw literal".
const LUT: &[u8; 60] = b"^\n 0123456789abcdefghijklmnopqrstuvwxyz!#%(){}[]<>+=/*:;.,~_";

const FUTURE_CODE: &str = "if(_update60)_update=function()_update60()_update60()end";
const FUTURE_CODE2: &str =
    "if(_update60)_update=function()_update60()_update_buttons()_update60()end";

/// Maximum decompressed length: matches the `0x4300..0x8000` code region
/// size used as `out_max` in the original decompressor.
const OUT_MAX: usize = 0x8000 - 0x4300;

pub fn decompress(region: &[u8]) -> Result<String, CartLoadError> {
    if region.len() < 8 {
        return Err(CartLoadError::Truncated);
    }

    // Header is 4 bytes (`:c:\0`), already matched by the caller.
    let target_len = ((region[4] as usize) << 8 | region[5] as usize).min(OUT_MAX - 1);
    // Bytes 6..8 are the compressed length, unused by the decompressor.
    let mut input = &region[8..];

    let mut out: Vec<u8> = Vec::with_capacity(target_len);

    while out.len() < target_len && !input.is_empty() {
        let val = input[0];
        input = &input[1..];

        if val < 60 {
            if val == 0 {
                let Some((&byte, rest)) = input.split_first() else { break };
                out.push(byte);
                input = rest;
            } else {
                out.push(LUT[val as usize]);
            }
        } else {
            let Some((&val2, rest)) = input.split_first() else { break };
            input = rest;

            let block_offset = (val as usize - 60) * 16 + (val2 & 0x0F) as usize;
            let block_length = (val2 >> 4) as usize + 2;

            if block_offset == 0 || block_offset > out.len() {
                // Corrupt cart: original decompressor zero-fills rather
                // than failing (spec.md §4.2 "Failure modes").
                for _ in 0..block_length {
                    if out.len() >= OUT_MAX {
                        break;
                    }
                    out.push(0);
                }
            } else {
                let mut src = out.len() - block_offset;
                for _ in 0..block_length {
                    if out.len() >= OUT_MAX {
                        break;
                    }
                    // Byte-by-byte: overlapping copies are RLE-like and
                    // must observe bytes written earlier in this loop.
                    let byte = out[src];
                    out.push(byte);
                    src += 1;
                }
            }
        }
    }

    strip_suffix(&mut out, FUTURE_CODE.as_bytes());
    strip_suffix(&mut out, FUTURE_CODE2.as_bytes());

    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn strip_suffix(out: &mut Vec<u8>, suffix: &[u8]) {
    if out.len() >= suffix.len() && &out[out.len() - suffix.len()..] == suffix {
        out.truncate(out.len() - suffix.len());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_raw_literal() {
        // header ":c:\0" + target_len=1 (big-endian) + unused compressed
        // length + literal-escape (0) + the raw byte 'A'.
        let mut region = vec![b':', b'c', b':', 0, 0, 1, 0, 0];
        region.push(0); // literal escape
        region.push(b'A');
        let code = decompress(&region).unwrap();
        assert_eq!(code, "A");
    }

    #[test]
    fn lut_literal() {
        let mut region = vec![b':', b'c', b':', 0, 0, 1, 0, 0];
        region.push(2); // LUT[2] == '0'
        let code = decompress(&region).unwrap();
        assert_eq!(code, "0");
    }

    #[test]
    fn back_reference_repeats_prior_output() {
        // Emit "aaaa": first literal 'a', then a back-reference of
        // length 3 at offset 1.
        let mut region = vec![b':', b'c', b':', 0, 0, 4, 0, 0];
        region.push(0);
        region.push(b'a');
        // value >= 60 => block copy. offset=1 => val=60, val2 low nibble=1
        // length = (val2>>4)+2 = 3 => val2 = 0x10 | 1 = 0x11
        region.push(60);
        region.push(0x11);
        let code = decompress(&region).unwrap();
        assert_eq!(code, "aaaa");
    }
}
