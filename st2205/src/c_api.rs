//! C API compatible with libst2205
//!
//! Exposes the classic `st2205_*` entry points so existing C programs can
//! link against this library instead. Functions returning `c_int` report `0`
//! on success and `-1` on failure; the reason is logged through `tracing`.

#![allow(non_camel_case_types)]

use crate::device::St2205;
use crate::geometry::Rect;
use crate::Result;
use std::ffi::{c_char, c_int, c_uint, CStr};
use std::ptr;
use std::sync::Once;
use tracing::{debug, error};

static INIT_LOGGING: Once = Once::new();

fn init_logging() {
    INIT_LOGGING.call_once(|| {
        // the host program may already have a subscriber
        let _ = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .try_init();
    });
}

/// Opaque frame handle
pub struct st2205_handle {
    inner: St2205,
}

fn status(what: &str, result: Result<()>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("{}: {}", what, e);
            -1
        }
    }
}

fn rect_from_c(xs: c_int, ys: c_int, xe: c_int, ye: c_int) -> Result<Rect> {
    let coord = |v: c_int| {
        u32::try_from(v).map_err(|_| crate::Error::Range(format!("negative coordinate {}", v)))
    };
    Ok(Rect::new(coord(xs)?, coord(ys)?, coord(xe)?, coord(ye)?))
}

/// Borrow the handle and a frame of `bytes_per_pixel` bytes
///
/// # Safety
/// `h` must come from [`st2205_open`] and `pixels` must point to at least
/// `width * height * bytes_per_pixel` readable bytes.
unsafe fn with_frame<'a>(
    h: *mut st2205_handle,
    pixels: *const u8,
    bytes_per_pixel: usize,
) -> Option<(&'a mut St2205, &'a [u8])> {
    let handle = h.as_mut()?;
    if pixels.is_null() {
        error!("null pixel buffer");
        return None;
    }
    let len = handle.inner.width() as usize * handle.inner.height() as usize * bytes_per_pixel;
    Some((&mut handle.inner, std::slice::from_raw_parts(pixels, len)))
}

/// Open the frame at `dev` (e.g. `/dev/sdb`). Returns null on failure.
///
/// # Safety
/// `dev` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn st2205_open(dev: *const c_char) -> *mut st2205_handle {
    init_logging();
    if dev.is_null() {
        error!("st2205_open: null path");
        return ptr::null_mut();
    }
    let path = match CStr::from_ptr(dev).to_str() {
        Ok(p) => p,
        Err(_) => {
            error!("st2205_open: path is not UTF-8");
            return ptr::null_mut();
        }
    };
    match St2205::open(path) {
        Ok(inner) => Box::into_raw(Box::new(st2205_handle { inner })),
        Err(e) => {
            error!("st2205_open({}): {}", path, e);
            ptr::null_mut()
        }
    }
}

/// Close the handle and free it. Null is ignored.
///
/// # Safety
/// `h` must be null or come from [`st2205_open`], and must not be used again.
#[no_mangle]
pub unsafe extern "C" fn st2205_close(h: *mut st2205_handle) {
    if h.is_null() {
        return;
    }
    debug!("st2205_close");
    let handle = Box::from_raw(h);
    handle.inner.close();
}

#[no_mangle]
pub unsafe extern "C" fn st2205_get_width(h: *const st2205_handle) -> c_uint {
    h.as_ref().map_or(0, |h| h.inner.width())
}

#[no_mangle]
pub unsafe extern "C" fn st2205_get_height(h: *const st2205_handle) -> c_uint {
    h.as_ref().map_or(0, |h| h.inner.height())
}

#[no_mangle]
pub unsafe extern "C" fn st2205_get_bpp(h: *const st2205_handle) -> c_int {
    h.as_ref().map_or(-1, |h| c_int::from(h.inner.bpp()))
}

/// 0 for PCF8833, 1 for Mercury, -1 for a null handle
#[no_mangle]
pub unsafe extern "C" fn st2205_get_protocol(h: *const st2205_handle) -> c_int {
    h.as_ref().map_or(-1, |h| h.inner.protocol() as c_int)
}

/// Send a frame of `width*height` r,g,b triplets. Only the part that changed
/// since the last update is transmitted.
///
/// # Safety
/// See [`with_frame`]: `pixinfo` holds `width*height*3` bytes.
#[no_mangle]
pub unsafe extern "C" fn st2205_send_data(h: *mut st2205_handle, pixinfo: *const u8) -> c_int {
    let Some((frame, rgb)) = with_frame(h, pixinfo, 3) else {
        return -1;
    };
    status("st2205_send_data", frame.update_changed(rgb).map(|_| ()))
}

/// Send rectangle `(xs,ys)-(xe,ye)` of a frame of r,g,b triplets
///
/// # Safety
/// `pixinfo` holds `width*height*3` bytes.
#[no_mangle]
pub unsafe extern "C" fn st2205_send_partial(
    h: *mut st2205_handle,
    pixinfo: *const u8,
    xs: c_int,
    ys: c_int,
    xe: c_int,
    ye: c_int,
) -> c_int {
    let Some((frame, rgb)) = with_frame(h, pixinfo, 3) else {
        return -1;
    };
    let result = rect_from_c(xs, ys, xe, ye).and_then(|rect| frame.send_partial(rgb, rect));
    status("st2205_send_partial", result.map(|_| ()))
}

/// Send a whole RGBA frame
///
/// # Safety
/// `rgba` holds `width*height*4` bytes.
#[no_mangle]
pub unsafe extern "C" fn st2205_rgba(h: *mut st2205_handle, rgba: *const u8) -> c_int {
    let Some((frame, src)) = with_frame(h, rgba, 4) else {
        return -1;
    };
    status("st2205_rgba", frame.update_full(src).map(|_| ()))
}

/// Send rectangle `(xs,ys)-(xe,ye)` of an RGBA frame
///
/// # Safety
/// `rgba` holds `width*height*4` bytes.
#[no_mangle]
pub unsafe extern "C" fn st2205_rgba_partial(
    h: *mut st2205_handle,
    rgba: *const u8,
    xs: c_int,
    ys: c_int,
    xe: c_int,
    ye: c_int,
) -> c_int {
    let Some((frame, src)) = with_frame(h, rgba, 4) else {
        return -1;
    };
    let result = rect_from_c(xs, ys, xe, ye).and_then(|rect| frame.update_region(src, rect));
    status("st2205_rgba_partial", result.map(|_| ()))
}

/// # Safety
/// `h` must be null or come from [`st2205_open`].
#[no_mangle]
pub unsafe extern "C" fn st2205_backlight(h: *mut st2205_handle, on: c_int) -> c_int {
    match h.as_mut() {
        Some(h) => status("st2205_backlight", h.inner.backlight(on != 0)),
        None => -1,
    }
}

/// # Safety
/// `h` must be null or come from [`st2205_open`].
#[no_mangle]
pub unsafe extern "C" fn st2205_lcd_sleep(h: *mut st2205_handle, sleep: c_int) -> c_int {
    match h.as_mut() {
        Some(h) => status("st2205_lcd_sleep", h.inner.lcd_sleep(sleep != 0)),
        None => -1,
    }
}
