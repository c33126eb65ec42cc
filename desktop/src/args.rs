use std::path::PathBuf;

use structopt::StructOpt;

/// Headless cart-loader/frame-runner CLI for `real8-core`.
///
/// This is the minimal stand-in for the "interactive shell/browser,
/// platform host backends" spec.md §1 declares out of scope for the core:
/// it loads a cart, drives the frame driver for a fixed number of frames,
/// and dumps the resulting framebuffer and cartdata so the core can be
/// exercised end to end without a real window, audio device, or script
/// interpreter.
#[derive(Debug, StructOpt)]
#[structopt(name = "real8")]
pub struct Args {
    /// Path to a `.p8` or `.p8.png` cart file.
    #[structopt(parse(from_os_str))]
    pub rom: PathBuf,

    /// Number of frames to run before exiting.
    #[structopt(long = "frames", default_value = "60")]
    pub frames: u32,

    /// Dump the final framebuffer as a PNG to this path.
    #[structopt(long = "dump-png", parse(from_os_str))]
    pub dump_png: Option<PathBuf>,

    /// Directory cartdata/save-state files are read from and written to.
    #[structopt(long = "save-dir", parse(from_os_str), default_value = "saves")]
    pub save_dir: PathBuf,

    /// Path to a host settings file (spec.md §6 "Config"). Defaults are
    /// used if the file doesn't exist.
    #[structopt(long = "config", parse(from_os_str))]
    pub config: Option<PathBuf>,
}
