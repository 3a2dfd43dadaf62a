//! Display PNGs for coastal tiles.

use std::path::Path;

use image::{Rgb, RgbImage};
use ndarray::ArrayView3;

use crate::error::ExportError;

/// Convert (bands, rows, cols) samples to an 8-bit RGB image.
///
/// The first three bands become R, G and B. With fewer than three bands the
/// first band is replicated as gray. Samples are clipped to 0..=255 and
/// truncated; NaN becomes 0.
pub fn to_rgb(pixels: &ArrayView3<'_, f64>) -> Result<RgbImage, ExportError> {
    let (bands, rows, cols) = pixels.dim();
    if bands == 0 || rows == 0 || cols == 0 {
        return Err(ExportError::InvalidData(format!(
            "cannot render a {bands}-band {cols}x{rows} tile"
        )));
    }
    let channel_band = if bands >= 3 { [0, 1, 2] } else { [0, 0, 0] };

    let mut image = RgbImage::new(cols as u32, rows as u32);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let (row, col) = (y as usize, x as usize);
        *pixel = Rgb(channel_band.map(|band| to_u8(pixels[(band, row, col)])));
    }
    Ok(image)
}

fn to_u8(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    num_traits::clamp(value, 0.0, 255.0) as u8
}

/// Render `pixels`, save them as PNG at `path` and hand back the image.
pub fn write_png<P: AsRef<Path>>(path: P, pixels: &ArrayView3<'_, f64>) -> Result<RgbImage, ExportError> {
    let image = to_rgb(pixels)?;
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn test_clip_truncate_and_nan() {
        let pixels = array![[[-5.0, 12.9, 300.0, f64::NAN]]];
        let image = to_rgb(&pixels.view()).unwrap();
        let reds: Vec<u8> = image.pixels().map(|p| p.0[0]).collect();
        assert_eq!(reds, vec![0, 12, 255, 0]);
    }

    #[test]
    fn test_gray_replicated() {
        let pixels = array![[[40.0]]];
        let image = to_rgb(&pixels.view()).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgb([40, 40, 40]));
    }

    #[test]
    fn test_band_order_and_orientation() {
        let mut pixels = Array3::zeros((4, 2, 3));
        pixels[(0, 1, 2)] = 10.0;
        pixels[(1, 1, 2)] = 20.0;
        pixels[(2, 1, 2)] = 30.0;
        pixels[(3, 1, 2)] = 255.0; // alpha is ignored
        let image = to_rgb(&pixels.view()).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1), &Rgb([10, 20, 30]));
        assert_eq!(image.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_write_png_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile_0_0.png");
        let pixels = Array3::from_elem((3, 4, 5), 128.0);
        let image = write_png(&path, &pixels.view()).unwrap();

        let decoded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (5, 4));
        assert_eq!(decoded.get_pixel(4, 3), &Rgb([128, 128, 128]));
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_empty_rejected() {
        let pixels = Array3::<f64>::zeros((0, 4, 4));
        assert!(matches!(to_rgb(&pixels.view()), Err(ExportError::InvalidData(_))));
    }
}
