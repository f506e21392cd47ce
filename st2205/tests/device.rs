//! End-to-end behaviour of the frame handle against the emulated device

use st2205::codec::{encode_full, encode_region};
use st2205::{
    ControlCommand, DescriptorSource, EmulatedFrame, ErrorKind, Fault, OpenOptions,
    PanelDescriptor, PanelOffset, ProtocolId, Rect, RegionBuffer, St2205,
};
use std::io::Write;

fn descriptor(width: u32, height: u32, bpp: u8, protocol: u8) -> PanelDescriptor {
    PanelDescriptor::new(width, height, bpp, protocol, PanelOffset::default()).unwrap()
}

fn open(d: PanelDescriptor) -> St2205<EmulatedFrame> {
    St2205::from_device(EmulatedFrame::new(d), &OpenOptions::default()).unwrap()
}

fn rgba(width: u32, height: u32, seed: u8) -> Vec<u8> {
    (0..width * height)
        .flat_map(|i| {
            let v = (i as u8).wrapping_mul(7).wrapping_add(seed);
            [v, v ^ 0x55, v.wrapping_add(91), 0xff]
        })
        .collect()
}

#[test]
fn test_open_nonexistent_path() {
    let err = St2205::open("/nonexistent/st2205-frame").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Open);
}

#[test]
fn test_open_disk_image() {
    let mut image = tempfile::NamedTempFile::new().unwrap();
    image.write_all(&[0u8; 0x10000]).unwrap();

    // a regular file is refused unless asked otherwise
    let err = St2205::open_with(image.path(), &OpenOptions::new().direct_io(false))
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Open);

    // no signature in sector 0
    let options = OpenOptions::new()
        .direct_io(false)
        .require_block_device(false);
    let err = St2205::open_with(image.path(), &options).err().unwrap();
    assert!(matches!(err, st2205::Error::NotPhotoFrame));
}

#[test]
fn test_update_full_twice_same_shadow() {
    let mut frame = open(descriptor(64, 48, 24, 1));
    let src = rgba(64, 48, 3);

    frame.update_full(&src).unwrap();
    let first = frame.shadow().to_vec();
    frame.update_full(&src).unwrap();
    assert_eq!(frame.shadow(), &first[..]);
    assert_eq!(first, encode_full(&src, 64, 48).unwrap());
    assert_eq!(frame.device().framebuffer(), &first[..]);
}

#[test]
fn test_update_region_on_100x80_panel() {
    let mut frame = open(descriptor(100, 80, 24, 1));
    let src = rgba(100, 80, 11);
    let rect = Rect::new(10, 5, 19, 14);

    let before = frame.shadow().to_vec();
    let report = frame.update_region(&src, rect).unwrap();
    assert_eq!(report.payload_bytes, 300);
    assert_eq!(report.window, rect);

    let sent = &frame.device().transfers()[0];
    assert_eq!(sent.payload.len(), 300);
    assert_eq!(sent.window, rect);

    // the fresh shadow is black, so exactly the non-black bytes of the
    // rectangle change
    let expected = encode_region(&src, 100, 80, rect).unwrap();
    assert!(before.iter().all(|&b| b == 0));
    let changed = before
        .iter()
        .zip(frame.shadow())
        .filter(|(a, b)| a != b)
        .count();
    assert_eq!(changed, expected.data.iter().filter(|&&b| b != 0).count());
    assert!(changed > 250);

    for y in 0..80 {
        for x in 0..100 {
            let i = (y * 100 + x) * 3;
            let px = &frame.shadow()[i..i + 3];
            if rect.contains(x as u32, y as u32) {
                let j = ((y - 5) * 10 + (x - 10)) * 3;
                assert_eq!(px, &expected.data[j..j + 3]);
            } else {
                assert_eq!(px, &before[i..i + 3], "pixel ({}, {}) changed", x, y);
            }
        }
    }
}

#[test]
fn test_out_of_range_rect_writes_nothing() {
    let mut frame = open(descriptor(100, 80, 24, 1));
    let src = rgba(100, 80, 0);

    for rect in [
        Rect::new(0, 0, 100, 10),
        Rect::new(0, 0, 10, 80),
        Rect::new(20, 0, 10, 10),
    ] {
        let err = frame.update_region(&src, rect).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range, "{}", rect);
    }
    let bad = RegionBuffer {
        rect: Rect::new(0, 0, 1, 1),
        data: vec![0; 5],
    };
    assert_eq!(frame.write_partial(&bad).unwrap_err().kind(), ErrorKind::Range);
    assert!(frame.device().transfers().is_empty());
    assert!(frame.shadow().iter().all(|&b| b == 0));
}

#[test]
fn test_control_commands_leave_pixels_alone() {
    let mut frame = open(descriptor(32, 32, 16, 0));
    let src = rgba(32, 32, 9);
    frame.update_full(&src).unwrap();
    let shadow = frame.shadow().to_vec();
    let shown = frame.device().framebuffer().to_vec();

    frame.backlight(false).unwrap();
    frame.lcd_sleep(true).unwrap();
    assert!(!frame.device().backlight_on());
    assert!(frame.device().is_asleep());

    frame.lcd_sleep(false).unwrap();
    frame.backlight(true).unwrap();
    assert!(frame.device().backlight_on());
    assert!(!frame.device().is_asleep());

    assert_eq!(frame.shadow(), &shadow[..]);
    assert_eq!(frame.device().framebuffer(), &shown[..]);
    assert_eq!(frame.device().transfers().len(), 1);
    assert_eq!(
        frame.device().controls(),
        &[
            ControlCommand::BacklightOff,
            ControlCommand::LcdSleep,
            ControlCommand::LcdWake,
            ControlCommand::BacklightOn,
        ]
    );
}

#[test]
fn test_short_write_is_retryable() {
    let mut frame = open(descriptor(40, 30, 24, 0));
    let src = rgba(40, 30, 1);
    let rect = Rect::new(4, 4, 12, 9);

    frame.device_mut().inject_fault(Fault::Short(100));
    let err = frame.update_region(&src, rect).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(frame.shadow().iter().all(|&b| b == 0));

    frame.update_region(&src, rect).unwrap();
    let expected = encode_region(&src, 40, 30, rect).unwrap();
    let i = (4 * 40 + 4) * 3;
    assert_eq!(&frame.shadow()[i..i + 27], &expected.data[..27]);
}

#[test]
fn test_panel_offsets_reach_the_wire() {
    let d = PanelDescriptor::new(128, 128, 16, 0, PanelOffset { x: 2, y: 1 }).unwrap();
    let mut frame = open(d);
    let src = rgba(128, 128, 5);
    frame.update_region(&src, Rect::new(0, 0, 9, 9)).unwrap();
    // the emulator removes the offsets again when decoding
    assert_eq!(frame.device().transfers()[0].window, Rect::new(0, 0, 9, 9));
    let rgb = encode_full(&src, 128, 128).unwrap();
    assert_eq!(frame.device().pixel(9, 9)[0], rgb[(9 * 128 + 9) * 3] & 0xf8);
}

#[test]
fn test_mercury_fixed_descriptor() {
    let d = PanelDescriptor::default();
    let options = OpenOptions::new().descriptor(DescriptorSource::Fixed(d));
    let mut frame =
        St2205::from_device(EmulatedFrame::without_param_block(d), &options).unwrap();
    assert_eq!(frame.protocol(), ProtocolId::Mercury);
    assert_eq!((frame.width(), frame.height(), frame.bpp()), (320, 240, 24));

    let src = rgba(320, 240, 77);
    let report = frame.update_region(&src, Rect::new(300, 200, 319, 239)).unwrap();
    assert_eq!(report.payload_bytes, 20 * 40 * 3);
    assert_eq!(
        frame.device().transfers()[0].window,
        Rect::new(300, 200, 319, 239)
    );
}

#[test]
fn test_fixed_descriptor_outside_window_range() {
    let fixed = |d: PanelDescriptor| OpenOptions::new().descriptor(DescriptorSource::Fixed(d));

    // Mercury rows are a single byte
    let tall = PanelDescriptor {
        height: 300,
        ..PanelDescriptor::default()
    };
    let err = St2205::from_device(EmulatedFrame::without_param_block(tall), &fixed(tall))
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Open);

    // PCF8833 columns are a single byte too
    let wide = PanelDescriptor {
        width: 300,
        height: 10,
        protocol: ProtocolId::Pcf8833,
        ..PanelDescriptor::default()
    };
    let device = EmulatedFrame::without_param_block(wide);
    let err = St2205::from_device(device, &fixed(wide)).err().unwrap();
    assert!(matches!(err, st2205::Error::Descriptor(_)));

    let empty = PanelDescriptor {
        width: 0,
        ..PanelDescriptor::default()
    };
    let device = EmulatedFrame::without_param_block(PanelDescriptor::default());
    let err = St2205::from_device(device, &fixed(empty)).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Open);
}

#[test]
fn test_twelve_bpp_widening_counts_against_range() {
    // 256 even columns end on register value 255
    let wide = PanelDescriptor {
        width: 256,
        ..descriptor(255, 64, 12, 0)
    };
    let options = OpenOptions::new().descriptor(DescriptorSource::Fixed(wide));
    assert!(St2205::from_device(EmulatedFrame::without_param_block(wide), &options).is_ok());

    // 255 columns widen to 256, and the offset pushes the last one past 255

    let shifted = PanelDescriptor {
        offset: PanelOffset { x: 1, y: 0 },
        ..descriptor(255, 64, 12, 0)
    };
    let options = OpenOptions::new().descriptor(DescriptorSource::Fixed(shifted));
    let err = St2205::from_device(EmulatedFrame::without_param_block(shifted), &options)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Open);
}

#[test]
fn test_twelve_bpp_partial_keeps_neighbours() {
    let mut frame = open(descriptor(15, 10, 12, 0));
    let base = vec![0xa0u8; 15 * 10 * 3];
    frame.write_full(&base).unwrap();

    let mut next = base.clone();
    let i = (3 * 15 + 5) * 3;
    next[i..i + 3].copy_from_slice(&[0x10, 0x20, 0x30]);
    let report = frame.update_changed(&next).unwrap().unwrap();
    // column 5 alone widens to 4..=5
    assert_eq!(report.window, Rect::new(4, 3, 5, 3));
    assert_eq!(report.payload_bytes, 3);
    assert_eq!(frame.shadow(), &next[..]);
    assert_eq!(frame.device().pixel(4, 3), [0xa0; 3]);
    assert_eq!(frame.device().pixel(5, 3), [0x10, 0x20, 0x30]);

    // last column reaches past the edge
    let mut last = next.clone();
    let j = (9 * 15 + 14) * 3;
    last[j..j + 3].copy_from_slice(&[0xf0; 3]);
    let report = frame.update_changed(&last).unwrap().unwrap();
    assert_eq!(report.window, Rect::new(14, 9, 15, 9));
    assert_eq!(frame.shadow(), &last[..]);
}

#[test]
fn test_send_partial_from_native_frame() {
    let mut frame = open(descriptor(50, 40, 24, 1));
    let rgb: Vec<u8> = (0..50 * 40 * 3).map(|i| (i % 253) as u8).collect();
    let rect = Rect::new(7, 8, 20, 30);
    frame.send_partial(&rgb, rect).unwrap();
    for y in rect.y_start..=rect.y_end {
        for x in rect.x_start..=rect.x_end {
            let i = ((y * 50 + x) * 3) as usize;
            assert_eq!(frame.device().pixel(x, y), [rgb[i], rgb[i + 1], rgb[i + 2]]);
        }
    }
    assert_eq!(frame.device().pixel(6, 8), [0; 3]);
}

#[test]
fn test_update_rgba_changed() {
    let mut frame = open(descriptor(20, 20, 24, 1));
    let mut src = rgba(20, 20, 0);
    assert_eq!(
        frame.update_rgba_changed(&src).unwrap().unwrap().window,
        Rect::full(20, 20)
    );
    assert_eq!(frame.update_rgba_changed(&src).unwrap(), None);

    // alpha alone is not a change
    src[3] = 0;
    assert_eq!(frame.update_rgba_changed(&src).unwrap(), None);
    src[(5 * 20 + 6) * 4] ^= 0xff;
    let report = frame.update_rgba_changed(&src).unwrap().unwrap();
    assert_eq!(report.window, Rect::new(6, 5, 6, 5));
}
