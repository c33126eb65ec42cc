//! The fixed RGB values of the 16 base PICO-8 colors, used only to turn a
//! color index into pixels when dumping a framebuffer to PNG. This is a
//! presentation convenience for the CLI; `real8-core` itself only ever
//! deals in the 0..=15 indices (spec.md §3 "Framebuffer").
const BASE: [[u8; 3]; 16] = [
    [0x00, 0x00, 0x00], // 0 black
    [0x1D, 0x2B, 0x53], // 1 dark blue
    [0x7E, 0x25, 0x53], // 2 dark purple
    [0x00, 0x87, 0x51], // 3 dark green
    [0xAB, 0x52, 0x36], // 4 brown
    [0x5F, 0x57, 0x4F], // 5 dark gray
    [0xC2, 0xC3, 0xC7], // 6 light gray
    [0xFF, 0xF1, 0xE8], // 7 white
    [0xFF, 0x00, 0x4D], // 8 red
    [0xFF, 0xA3, 0x00], // 9 orange
    [0xFF, 0xEC, 0x27], // 10 yellow
    [0x00, 0xE4, 0x36], // 11 green
    [0x29, 0xAD, 0xFF], // 12 blue
    [0x83, 0x76, 0x9C], // 13 lavender
    [0xFF, 0x77, 0xA8], // 14 pink
    [0xFF, 0xCC, 0xAA], // 15 tan
];

/// Returns the RGB triple for a 0..=15 color index, clamped if out of
/// range (e.g. the extended hardware-palette convention, which this CLI
/// doesn't render specially).
pub fn rgb(index: u8) -> [u8; 3] {
    BASE[(index & 0x0F) as usize]
}
