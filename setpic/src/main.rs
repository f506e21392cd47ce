//! setpic - send pictures to ST2205 USB photo frames
//!
//! Features:
//! - Upload PNG/JPEG/GIF files or whole directories, centred and cropped
//! - Backlight and LCD sleep control
//! - Runs against an in-memory frame with `--emulate` for trying things out

mod config;
mod picture;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use st2205::{
    BlockDevice, DescriptorSource, EmulatedFrame, OpenOptions, PanelDescriptor, St2205,
};
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "setpic")]
#[command(about = "Send pictures to ST2205 USB photo frames", long_about = None)]
struct Args {
    /// Block device of the frame (overrides the config file)
    #[arg(short = 'D', long)]
    device: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/st2205/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Open the device without O_DIRECT
    #[arg(long)]
    no_direct_io: bool,

    /// Use an emulated frame of this size (WIDTHxHEIGHT) instead of a device
    #[arg(long, value_name = "WxH", value_parser = parse_geometry)]
    emulate: Option<(u32, u32)>,

    /// Enable verbose debug output
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the panel geometry
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Turn the backlight on or off
    Backlight { state: OnOff },
    /// Put the LCD to sleep or wake it
    Lcd { state: SleepWake },
    /// Send pictures (files or directories) to the frame
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Pause between pictures in milliseconds
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
    },
    /// Fill the panel with one colour (RRGGBB)
    Fill { color: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OnOff {
    On,
    Off,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SleepWake {
    Sleep,
    Wake,
}

#[derive(Serialize)]
struct PanelInfo {
    width: u32,
    height: u32,
    bpp: u8,
    protocol: String,
    offset_x: i8,
    offset_y: i8,
}

fn parse_geometry(s: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {:?}", s))?;
    let dim = |v: &str| match v.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("bad dimension {:?}", v)),
    };
    Ok((dim(w)?, dim(h)?))
}

fn main() -> Result<()> {
    // Set up panic hook to log panics before crashing
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        if let Some(dir) = log_dir() {
            if let Ok(mut f) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("crash.log"))
            {
                use std::io::Write;
                let _ = writeln!(f, "[{}] PANIC: {}", chrono::Local::now(), panic_info);
            }
        }
    }));

    let args = Args::parse();

    // Initialize logging - quiet by default, verbose with --debug
    let default_filter = if args.debug {
        "debug,setpic=debug,st2205=debug"
    } else {
        "warn,setpic=info,st2205=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // File log next to the crash log, daily rotation
    let file_layer = log_dir().map(|dir| {
        let (writer, guard) = tracing_appender::non_blocking(rolling::daily(&dir, "setpic.log"));
        (fmt::layer().with_writer(writer).with_ansi(false), guard)
    });
    let (file_layer, _guard) = match file_layer {
        Some((layer, guard)) => (Some(layer), Some(guard)),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    let config = Config::load(args.config.as_deref())?;
    let mut options = config.open_options()?;
    if args.no_direct_io {
        options = options.direct_io(false);
    }

    if let Some((width, height)) = args.emulate {
        let descriptor = match options.descriptor {
            DescriptorSource::Fixed(d) => PanelDescriptor { width, height, ..d },
            DescriptorSource::Firmware => PanelDescriptor {
                width,
                height,
                ..PanelDescriptor::default()
            },
        };
        info!("Using emulated {}x{} frame", width, height);
        // the emulated firmware only carries small panels in its parameter block
        let options = options.descriptor(match descriptor.to_bytes() {
            Some(_) => DescriptorSource::Firmware,
            None => DescriptorSource::Fixed(descriptor),
        });
        let mut emulator = EmulatedFrame::new(descriptor);
        // only the count is reported
        emulator.set_recording(false);
        let mut frame =
            St2205::from_device(emulator, &options).context("opening emulated frame")?;
        run(&mut frame, &args.command)?;
        let transfers = frame.device().transfer_count();
        println!("Emulated frame received {} transfer(s)", transfers);
        frame.close();
        return Ok(());
    }

    let device = args
        .device
        .clone()
        .or_else(|| config.device.clone())
        .context("no device given; use --device or set `device` in the config")?;
    let mut frame = open(&device, &options)?;
    run(&mut frame, &args.command)?;
    frame.close();
    Ok(())
}

/// State directory for logs (~/.local/state/st2205)
fn log_dir() -> Option<PathBuf> {
    let dir = std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/state")))?
        .join("st2205");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

fn open(device: &Path, options: &OpenOptions) -> Result<St2205> {
    let frame = St2205::open_with(device, options)
        .with_context(|| format!("opening frame at {}", device.display()))?;
    println!(
        "Found device: {}x{}, {} bpp",
        frame.width(),
        frame.height(),
        frame.bpp()
    );
    Ok(frame)
}

fn run<D: BlockDevice>(frame: &mut St2205<D>, command: &Command) -> Result<()> {
    match command {
        Command::Info { json } => {
            let d = frame.descriptor();
            let panel = PanelInfo {
                width: d.width,
                height: d.height,
                bpp: d.format.bpp(),
                protocol: d.protocol.to_string(),
                offset_x: d.offset.x,
                offset_y: d.offset.y,
            };
            if *json {
                println!("{}", serde_json::to_string_pretty(&panel)?);
            } else {
                println!("Resolution: {}x{}", panel.width, panel.height);
                println!("Depth: {} bpp", panel.bpp);
                println!("Protocol: {}", panel.protocol);
                println!("Offset: {},{}", panel.offset_x, panel.offset_y);
            }
        }
        Command::Backlight { state } => {
            frame
                .backlight(matches!(state, OnOff::On))
                .context("switching backlight")?;
        }
        Command::Lcd { state } => {
            frame
                .lcd_sleep(matches!(state, SleepWake::Sleep))
                .context("switching LCD power")?;
        }
        Command::Upload { paths, delay_ms } => {
            let mut first = true;
            for arg in paths {
                for file in picture::expand(arg)? {
                    if !first && *delay_ms > 0 {
                        thread::sleep(Duration::from_millis(*delay_ms));
                    }
                    first = false;
                    upload(frame, &file)?;
                }
            }
        }
        Command::Fill { color } => {
            let rgb = picture::solid(color, frame.width(), frame.height())?;
            frame.write_full(&rgb).context("sending frame")?;
        }
    }
    Ok(())
}

fn upload<D: BlockDevice>(frame: &mut St2205<D>, file: &Path) -> Result<()> {
    let rgb = picture::load(file, frame.width(), frame.height())?;
    match frame
        .update_changed(&rgb)
        .with_context(|| format!("sending {}", file.display()))?
    {
        Some(report) => info!(
            "{}: sent {} ({} bytes)",
            file.display(),
            report.window,
            report.payload_bytes
        ),
        None => info!("{}: panel already shows it", file.display()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_geometry() {
        assert_eq!(parse_geometry("320x240"), Ok((320, 240)));
        assert_eq!(parse_geometry("128X128"), Ok((128, 128)));
        assert!(parse_geometry("0x10").is_err());
        assert!(parse_geometry("320").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args =
            Args::try_parse_from(["setpic", "--emulate", "96x64", "fill", "ff0000"]).unwrap();
        assert_eq!(args.emulate, Some((96, 64)));
        assert!(matches!(args.command, Command::Fill { ref color } if color == "ff0000"));

        let args = Args::try_parse_from(["setpic", "-D", "/dev/sdb", "backlight", "off"]).unwrap();
        assert!(matches!(args.command, Command::Backlight { state: OnOff::Off }));
        assert!(Args::try_parse_from(["setpic", "upload"]).is_err());
    }

    #[test]
    fn test_run_against_emulator() {
        let d = PanelDescriptor::new(16, 8, 16, 0, Default::default()).unwrap();
        let mut frame =
            St2205::from_device(EmulatedFrame::new(d), &OpenOptions::default()).unwrap();

        run(&mut frame, &Command::Fill { color: "00ff00".into() }).unwrap();
        assert_eq!(frame.device().pixel(3, 3), [0, 0xfc, 0]);

        run(&mut frame, &Command::Backlight { state: OnOff::Off }).unwrap();
        run(&mut frame, &Command::Lcd { state: SleepWake::Sleep }).unwrap();
        assert!(!frame.device().backlight_on());
        assert!(frame.device().is_asleep());
        assert_eq!(frame.device().transfers().len(), 1);
        assert_eq!(frame.device().transfer_count(), 1);
    }
}
