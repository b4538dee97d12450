//! Raster preparation — turns encoded image bytes into something a PDF image
//! XObject can carry.
//!
//! Baseline RGB/greyscale JPEGs pass through untouched under `DCTDecode`.
//! Everything else is decoded, flattened to 8-bit RGB, and deflated; a
//! separate soft mask is kept only when some pixel is not fully opaque.

use image::{ColorType, DynamicImage, ImageFormat};
use miniz_oxide::deflate::compress_to_vec_zlib;
use thiserror::Error;

const DEFLATE_LEVEL: u8 = 6;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("image is empty")]
    Empty,

    #[error("image failed to decode: {0}")]
    Decode(#[from] image::ImageError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageEncoding {
    /// Original JPEG bytes.
    Dct { data: Vec<u8>, gray: bool },
    /// Zlib-compressed 8-bit RGB samples, plus an optional zlib-compressed
    /// 8-bit alpha channel.
    Flate { rgb: Vec<u8>, alpha: Option<Vec<u8>> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub encoding: ImageEncoding,
}

pub fn prepare(bytes: &[u8]) -> Result<PreparedImage, RasterError> {
    if bytes.is_empty() {
        return Err(RasterError::Empty);
    }

    let format = image::guess_format(bytes)?;
    let decoded = image::load_from_memory_with_format(bytes, format)?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(RasterError::Empty);
    }

    if format == ImageFormat::Jpeg {
        match decoded.color() {
            ColorType::Rgb8 | ColorType::L8 => {
                return Ok(PreparedImage {
                    width: decoded.width(),
                    height: decoded.height(),
                    encoding: ImageEncoding::Dct {
                        data: bytes.to_vec(),
                        gray: decoded.color() == ColorType::L8,
                    },
                });
            }
            _ => {}
        }
    }

    Ok(flate(&decoded))
}

fn flate(decoded: &DynamicImage) -> PreparedImage {
    let rgba = decoded.to_rgba8();
    let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);

    let rgb: Vec<u8> = rgba
        .pixels()
        .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
        .collect();
    let alpha = has_alpha.then(|| {
        let samples: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
        compress_to_vec_zlib(&samples, DEFLATE_LEVEL)
    });

    PreparedImage {
        width: rgba.width(),
        height: rgba.height(),
        encoding: ImageEncoding::Flate {
            rgb: compress_to_vec_zlib(&rgb, DEFLATE_LEVEL),
            alpha,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_jpeg_passes_through() {
        let bytes = encode(
            DynamicImage::ImageRgb8(image::RgbImage::from_pixel(8, 4, image::Rgb([1, 2, 3]))),
            ImageFormat::Jpeg,
        );
        let prepared = prepare(&bytes).unwrap();
        assert_eq!((prepared.width, prepared.height), (8, 4));
        assert_eq!(
            prepared.encoding,
            ImageEncoding::Dct {
                data: bytes,
                gray: false
            }
        );
    }

    #[test]
    fn test_opaque_png_has_no_mask() {
        let bytes = encode(
            DynamicImage::ImageRgb8(image::RgbImage::from_pixel(3, 5, image::Rgb([9, 9, 9]))),
            ImageFormat::Png,
        );
        let prepared = prepare(&bytes).unwrap();
        assert_eq!((prepared.width, prepared.height), (3, 5));
        match prepared.encoding {
            ImageEncoding::Flate { rgb, alpha } => {
                let raw = miniz_oxide::inflate::decompress_to_vec_zlib(&rgb).unwrap();
                assert_eq!(raw.len(), 3 * 5 * 3);
                assert!(alpha.is_none());
            }
            other => panic!("expected flate encoding, got {other:?}"),
        }
    }

    #[test]
    fn test_translucent_png_keeps_mask() {
        let bytes = encode(
            DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 10]))),
            ImageFormat::Png,
        );
        match prepare(&bytes).unwrap().encoding {
            ImageEncoding::Flate { alpha, .. } => assert!(alpha.is_some()),
            other => panic!("expected flate encoding, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_and_empty_are_errors() {
        assert!(matches!(prepare(&[]), Err(RasterError::Empty)));
        assert!(matches!(prepare(b"not an image"), Err(RasterError::Decode(_))));
    }
}
