//! Image equalization
//!
//! The old and new renderers may size their output region differently (for
//! example due to surrounding chrome), and naive pixel-diffing of two
//! differently sized rasters would misreport every such case as fully
//! different. Equalization pads both images onto a common opaque-white canvas
//! sized to the maximum of each axis, anchored at the top-left origin, so a
//! pixel-wise comparison is well-defined.

use image::{imageops, Rgba, RgbaImage};

use exdiff_common::{Error, Result};

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Decode a screenshot buffer into RGBA, rejecting empty or malformed input
pub fn decode_rgba(buffer: &[u8]) -> Result<RgbaImage> {
    if buffer.is_empty() {
        return Err(Error::Decode("empty image buffer".to_string()));
    }
    let image = image::load_from_memory(buffer)
        .map_err(|e| Error::Decode(e.to_string()))?
        .to_rgba8();
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::Decode("zero-sized image".to_string()));
    }
    Ok(image)
}

/// Pad two images onto white canvases of their common maximum size.
///
/// Original pixel data is preserved in `[0, w)×[0, h)` of each output; every
/// added pixel is opaque white. Outputs are never smaller than either input
/// along either axis.
pub fn equalize(a: &[u8], b: &[u8]) -> Result<(RgbaImage, RgbaImage)> {
    let a = decode_rgba(a)?;
    let b = decode_rgba(b)?;

    let width = a.width().max(b.width());
    let height = a.height().max(b.height());

    Ok((pad(&a, width, height), pad(&b, width, height)))
}

fn pad(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if image.width() == width && image.height() == height {
        return image.clone();
    }
    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
    imageops::overlay(&mut canvas, image, 0, 0);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn png_bytes(width: u32, height: u32, pixel: Rgba<u8>) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, pixel);
        let mut buffer = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut buffer, ImageFormat::Png)
            .expect("png encoding");
        buffer.into_inner()
    }

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    #[test]
    fn test_equalize_pads_to_common_max_size() {
        let (a, b) = equalize(&png_bytes(100, 50, RED), &png_bytes(80, 70, BLUE)).unwrap();

        assert_eq!((a.width(), a.height()), (100, 70));
        assert_eq!((b.width(), b.height()), (100, 70));

        // Original pixels intact in each input's region
        assert_eq!(*a.get_pixel(0, 0), RED);
        assert_eq!(*a.get_pixel(99, 49), RED);
        assert_eq!(*b.get_pixel(0, 0), BLUE);
        assert_eq!(*b.get_pixel(79, 69), BLUE);

        // Added pixels are opaque white
        assert_eq!(*a.get_pixel(50, 60), BACKGROUND);
        assert_eq!(*a.get_pixel(99, 69), BACKGROUND);
        assert_eq!(*b.get_pixel(90, 0), BACKGROUND);
        assert_eq!(*b.get_pixel(99, 69), BACKGROUND);
    }

    #[test]
    fn test_equal_sizes_pass_through() {
        let (a, b) = equalize(&png_bytes(40, 40, RED), &png_bytes(40, 40, BLUE)).unwrap();
        assert_eq!((a.width(), a.height()), (40, 40));
        assert_eq!((b.width(), b.height()), (40, 40));
        assert_eq!(*a.get_pixel(39, 39), RED);
        assert_eq!(*b.get_pixel(39, 39), BLUE);
    }

    #[test]
    fn test_empty_buffer_is_a_decode_error() {
        match equalize(&[], &png_bytes(10, 10, RED)) {
            Err(Error::Decode(_)) => {}
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_buffer_is_a_decode_error() {
        let garbage = vec![0x00, 0x01, 0x02, 0x03];
        match equalize(&png_bytes(10, 10, RED), &garbage) {
            Err(Error::Decode(_)) => {}
            other => panic!("expected decode error, got {:?}", other),
        }
    }
}
