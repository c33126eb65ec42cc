//! `real8`: a headless cart-loader/frame-runner CLI.
//!
//! Loads a `.p8`/`.p8.png` cart, drives `real8_core`'s frame driver for a
//! fixed number of frames with no window, audio device, or script
//! interpreter attached, and optionally dumps the final framebuffer as a
//! PNG. Exit codes follow spec.md §6: 0 normal, 1 cart load failure, 2
//! unhandled script error.

use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};
use structopt::StructOpt;

use real8_core::cartridge::CartImage;
use real8_core::{Console, Disruption, SCREEN_HEIGHT, SCREEN_WIDTH};

mod args;
mod config;
mod env;
mod palette;
mod script_host;

use args::Args;
use config::Config;
use env::HeadlessHost;
use script_host::StubScriptHost;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::from_args();

    let config_path = args.config.or_else(default_config_path);
    let config = match &config_path {
        Some(path) => Config::load(path).context("failed to read config file")?,
        None => Config::default(),
    };
    log::info!("config: {config:?}");

    let rom_bytes = fs::read(&args.rom)
        .with_context(|| format!("failed to read cart file {:?}", args.rom))?;

    let cart = match CartImage::from_bytes(&rom_bytes) {
        Ok(cart) => cart,
        Err(err) => {
            log::error!("cart load failed: {err}");
            return Ok(ExitCode::from(1));
        }
    };
    log::info!("loaded cart, code length {} bytes", cart.code.len());

    let mut console = Console::new();
    console.load_cart(cart);
    if let Some(fps) = config.target_fps {
        console.machine_mut().stat.target_fps = fps;
    }

    let mut host = StubScriptHost::new();
    real8_core::script::register_api(&mut host);
    log::info!("registered {} native API functions", host.registered_count());

    let mut peripherals = HeadlessHost::new(args.save_dir)
        .context("failed to set up save directory")?;

    let mut exit_code = ExitCode::from(0);
    for frame in 0..args.frames {
        match console.run_frame(&mut peripherals, &mut host) {
            Ok(()) => {}
            Err(Disruption::ResetRequested) => {
                log::info!("frame {frame}: reset requested, reloading cart state");
            }
            Err(Disruption::ExitRequested) => {
                log::info!("frame {frame}: shutdown requested, stopping");
                break;
            }
            Err(Disruption::Terminated) => {
                log::error!("frame {frame}: uncaught script error, cart terminated");
                exit_code = ExitCode::from(2);
                break;
            }
        }
    }

    log::info!(
        "ran {} frame(s); flips={} samples={} target_fps={}",
        console.machine().stat.frame_count,
        peripherals.display.flips,
        peripherals.audio.samples_pushed,
        console.machine().stat.target_fps,
    );

    if let Some(out) = &args.dump_png {
        dump_png(out, &peripherals.display.framebuffer, &peripherals.display.screen_palette)
            .with_context(|| format!("failed to write framebuffer dump {out:?}"))?;
        log::info!("wrote framebuffer dump to {out:?}");
    }

    Ok(exit_code)
}

/// Default host settings file location, following the platform config
/// directory convention (`~/.config/real8/config.toml` on Linux).
fn default_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|dir| dir.join("real8").join("config.toml"))
}

/// Writes the final framebuffer as an RGB PNG, remapping each color index
/// through the PICO-8 base palette for inspection purposes (the palette
/// indices themselves, not their RGB values, are what the core is
/// authoritative over; RGB lookup is a pure presentation convenience).
fn dump_png(path: &std::path::Path, framebuffer: &[u8], screen_palette: &[u8; 16]) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut encoder = png::Encoder::new(file, SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32);
    encoder.set_color(png::ColorType::RGB);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;

    let mut rgb = Vec::with_capacity(SCREEN_WIDTH * SCREEN_HEIGHT * 3);
    for &index in framebuffer {
        let remapped = screen_palette[(index & 0x0F) as usize];
        let [r, g, b] = palette::rgb(remapped);
        rgb.push(r);
        rgb.push(g);
        rgb.push(b);
    }
    writer.write_image_data(&rgb)?;
    Ok(())
}
