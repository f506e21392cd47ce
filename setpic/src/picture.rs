//! Picture loading
//!
//! Pictures are decoded with the `image` crate and placed centred on a black
//! panel-sized canvas. Larger pictures are cropped around their centre; no
//! scaling happens.

use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Files to upload for one command-line argument: the file itself, or the
/// decodable pictures of a directory in name order
pub fn expand(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(path).with_context(|| format!("reading {}", path.display()))? {
        let file = entry?.path();
        if file.is_file() && is_picture(&file) {
            files.push(file);
        } else {
            debug!("Skipping {:?}", file);
        }
    }
    files.sort();
    if files.is_empty() {
        warn!("No pictures in {}", path.display());
    }
    Ok(files)
}

fn is_picture(path: &Path) -> bool {
    matches!(
        ImageFormat::from_path(path),
        Ok(ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif)
    )
}

/// Decode `path` into a `width`x`height` RGB frame
pub fn load(path: &Path, width: u32, height: u32) -> Result<Vec<u8>> {
    let picture = image::open(path)
        .with_context(|| format!("decoding {}", path.display()))?
        .to_rgb8();
    debug!(
        "{}: {}x{} picture on {}x{} panel",
        path.display(),
        picture.width(),
        picture.height(),
        width,
        height
    );
    Ok(fit(&picture, width, height))
}

/// Centre `picture` on a black canvas, cropping what does not fit
pub fn fit(picture: &RgbImage, width: u32, height: u32) -> Vec<u8> {
    let (pw, ph) = picture.dimensions();
    let cols = pw.min(width);
    let rows = ph.min(height);
    // offsets into the canvas and into the picture
    let (dx, sx) = ((width - cols) / 2, (pw - cols) / 2);
    let (dy, sy) = ((height - rows) / 2, (ph - rows) / 2);

    let mut canvas = vec![0u8; width as usize * height as usize * 3];
    let src = picture.as_raw();
    for row in 0..rows {
        let s = (((sy + row) * pw + sx) * 3) as usize;
        let d = (((dy + row) * width + dx) * 3) as usize;
        let n = cols as usize * 3;
        canvas[d..d + n].copy_from_slice(&src[s..s + n]);
    }
    canvas
}

/// Solid `width`x`height` frame of colour `RRGGBB`
pub fn solid(color: &str, width: u32, height: u32) -> Result<Vec<u8>> {
    let hex = color.trim_start_matches('#');
    if hex.len() != 6 {
        anyhow::bail!("colour must be RRGGBB, got {:?}", color);
    }
    let value = u32::from_str_radix(hex, 16).with_context(|| format!("bad colour {:?}", color))?;
    let [_, r, g, b] = value.to_be_bytes();
    Ok([r, g, b].repeat(width as usize * height as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_fit_small_picture_centred() {
        let picture = RgbImage::from_pixel(2, 2, Rgb([9, 8, 7]));
        let frame = fit(&picture, 4, 4);
        let at = |x: usize, y: usize| &frame[(y * 4 + x) * 3..(y * 4 + x) * 3 + 3];
        assert_eq!(at(0, 0), &[0, 0, 0]);
        assert_eq!(at(1, 1), &[9, 8, 7]);
        assert_eq!(at(2, 2), &[9, 8, 7]);
        assert_eq!(at(3, 3), &[0, 0, 0]);
    }

    #[test]
    fn test_fit_large_picture_cropped() {
        let picture = RgbImage::from_fn(6, 6, |x, y| Rgb([x as u8, y as u8, 0]));
        let frame = fit(&picture, 2, 2);
        assert_eq!(frame, vec![2, 2, 0, 3, 2, 0, 2, 3, 0, 3, 3, 0]);
    }

    #[test]
    fn test_solid() {
        assert_eq!(solid("#ff8000", 2, 1).unwrap(), vec![0xff, 0x80, 0, 0xff, 0x80, 0]);
        assert!(solid("fff", 1, 1).is_err());
        assert!(solid("gg0000", 1, 1).is_err());
    }

    #[test]
    fn test_expand_directory() {
        let dir = tempfile::tempdir().unwrap();
        let picture = RgbImage::from_pixel(3, 3, Rgb([1, 2, 3]));
        picture.save(dir.path().join("b.png")).unwrap();
        picture.save(dir.path().join("a.png")).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let files = expand(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png", "b.png"]);

        let frame = load(&files[0], 3, 3).unwrap();
        assert_eq!(&frame[12..15], &[1, 2, 3]);
    }
}
