//! Hardware smoke test for a connected photo frame
//! Cycles solid colours, then draws a moving square with partial updates

use st2205::{Rect, St2205};
use std::thread;
use std::time::Duration;

fn solid(width: u32, height: u32, (r, g, b): (u8, u8, u8)) -> Vec<u8> {
    [r, g, b].repeat(width as usize * height as usize)
}

/// Square of `side` pixels at column `step`, vertically centred
fn square(step: u32, side: u32, height: u32) -> Rect {
    let top = (height - side) / 2;
    Rect::new(step, top, step + side - 1, top + side - 1)
}

/// Edge of the moving square; never larger than the panel
fn square_side(width: u32, height: u32) -> u32 {
    (width.min(height) / 4).max(1)
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(std::io::stderr)
        .try_init();

    let path = match std::env::args().nth(1) {
        Some(p) => p,
        None => {
            println!("usage: st2205-test /dev/sdX");
            std::process::exit(2);
        }
    };

    println!("=== ST2205 Panel Test ===");
    let mut frame = match St2205::open(&path) {
        Ok(f) => f,
        Err(e) => {
            println!("Failed to open {}: {}", path, e);
            std::process::exit(1);
        }
    };

    let (width, height) = (frame.width(), frame.height());
    println!("Frame opened successfully!");
    println!("  Resolution: {}x{}", width, height);
    println!("  Depth: {} bpp", frame.bpp());
    println!("  Protocol: {}", frame.protocol());

    println!("\nYou should see RED -> GREEN -> BLUE cycling");
    let colors = [
        ("RED", (255, 0, 0)),
        ("GREEN", (0, 255, 0)),
        ("BLUE", (0, 0, 255)),
        ("WHITE", (255, 255, 255)),
    ];
    for (name, color) in colors {
        match frame.write_full(&solid(width, height, color)) {
            Ok(report) => println!("Showing {} ({} bytes on the wire)", name, report.wire_bytes),
            Err(e) => {
                println!("Full update failed: {}", e);
                std::process::exit(1);
            }
        }
        thread::sleep(Duration::from_millis(700));
    }

    println!("\nMoving a square with changed-region updates");
    let side = square_side(width, height);
    let mut canvas = solid(width, height, (0, 0, 0));
    for step in 0..width.saturating_sub(side) {
        canvas.fill(0);
        let square = square(step, side, height);
        for y in square.y_start..=square.y_end {
            let row = (y * width) as usize * 3;
            let (start, end) = (square.x_start as usize * 3, (square.x_end as usize + 1) * 3);
            canvas[row + start..row + end].fill(0xff);
        }
        if let Err(e) = frame.update_changed(&canvas) {
            println!("Step {} failed: {}", step, e);
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }

    println!("\nBacklight off for one second");
    let toggled = frame
        .backlight(false)
        .and_then(|()| {
            thread::sleep(Duration::from_secs(1));
            frame.backlight(true)
        });
    if let Err(e) = toggled {
        println!("Backlight control failed: {}", e);
    }

    println!("\nTest complete! Did the colours and the square show up?");
    frame.close();
}
