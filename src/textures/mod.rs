//! Procedural and loaded textures
//!
//! CPU-side RGBA images; the renderer uploads them. Nothing here touches the
//! GPU so it can be tested anywhere.

mod font;
pub mod loader;

use std::path::PathBuf;

use image::{Rgba, RgbaImage};

/// Candy stripe texture size
pub const CANDY_SIZE: u32 = 64;
/// Photo card size
pub const CARD_SIZE: u32 = 512;
/// Uploaded photos larger than this are downscaled
pub const MAX_PHOTO_SIZE: u32 = 1024;

const WHITE: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
const STRIPE_RED: Rgba<u8> = Rgba([0xff, 0x00, 0x00, 0xff]);
const CARD_CREAM: Rgba<u8> = Rgba([0xfc, 0xee, 0xa7, 0xff]);
const CARD_GOLD: Rgba<u8> = Rgba([0xd4, 0xaf, 0x37, 0xff]);

/// Errors creating or loading textures
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("invalid texture size {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

fn blank(width: u32, height: u32, fill: Rgba<u8>) -> Result<RgbaImage, TextureError> {
    if width == 0 || height == 0 {
        return Err(TextureError::InvalidDimensions { width, height });
    }
    Ok(RgbaImage::from_pixel(width, height, fill))
}

/// White square with two red diagonal bands, 16px wide
pub fn candy_stripes(size: u32) -> Result<RgbaImage, TextureError> {
    let mut img = blank(size, size, WHITE)?;

    // Bands run along x - y = c, laid out for a 64px tile
    let unit = size as f32 / 64.0;
    let centers = [-64.0 * unit, 32.0 * unit];
    let half_width = 8.0 * unit;

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let d = x as f32 - y as f32;
        let on_band = centers
            .iter()
            .any(|c| (d - c).abs() / std::f32::consts::SQRT_2 <= half_width);
        if on_band {
            *pixel = STRIPE_RED;
        }
    }

    Ok(img)
}

/// Cream card with a gold caption centered on it
pub fn photo_card(size: u32, caption: &str) -> Result<RgbaImage, TextureError> {
    let mut img = blank(size, size, CARD_CREAM)?;

    let caption = caption.trim();
    if caption.is_empty() {
        return Ok(img);
    }

    // ~64px tall glyphs on a 512 card, shrunk to fit long captions
    let margin = size / 16;
    let cells = font::text_width(caption);
    let max_scale = (size / 8 / font::GLYPH_HEIGHT).max(1);
    let fit_scale = (size.saturating_sub(2 * margin) / cells.max(1)).max(1);
    let scale = max_scale.min(fit_scale);

    let text_width = cells * scale;
    let text_height = font::GLYPH_HEIGHT * scale;
    let left = size.saturating_sub(text_width) / 2;
    let top = size.saturating_sub(text_height) / 2;

    font::draw_text(&mut img, caption, left, top, scale, CARD_GOLD);
    Ok(img)
}

/// Decode the contents of image file `name` for use as a photo, downscaled
/// to [`MAX_PHOTO_SIZE`]
pub fn decode_photo(name: &str, bytes: &[u8]) -> Result<RgbaImage, TextureError> {
    let img = image::load_from_memory(bytes).map_err(|source| TextureError::Decode {
        path: PathBuf::from(name),
        source,
    })?;
    limit_size(img.to_rgba8())
}

fn limit_size(img: RgbaImage) -> Result<RgbaImage, TextureError> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(TextureError::InvalidDimensions { width, height });
    }
    if width <= MAX_PHOTO_SIZE && height <= MAX_PHOTO_SIZE {
        return Ok(img);
    }

    let scale = MAX_PHOTO_SIZE as f32 / width.max(height) as f32;
    let new_width = ((width as f32 * scale) as u32).max(1);
    let new_height = ((height as f32 * scale) as u32).max(1);
    log::debug!("Downscaling photo {}x{} -> {}x{}", width, height, new_width, new_height);
    Ok(image::imageops::resize(
        &img,
        new_width,
        new_height,
        image::imageops::FilterType::Lanczos3,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candy_stripes() {
        let img = candy_stripes(CANDY_SIZE).unwrap();
        assert_eq!(img.dimensions(), (64, 64));
        assert_eq!(*img.get_pixel(0, 0), WHITE);
        assert_eq!(*img.get_pixel(32, 0), STRIPE_RED);
        assert_eq!(*img.get_pixel(0, 63), STRIPE_RED);
        assert_eq!(*img.get_pixel(63, 31), STRIPE_RED);
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(
            candy_stripes(0),
            Err(TextureError::InvalidDimensions { width: 0, height: 0 })
        ));
        assert!(photo_card(0, "HI").is_err());
    }

    #[test]
    fn test_photo_card_caption_centered() {
        let img = photo_card(CARD_SIZE, "JOYEUX NOEL").unwrap();
        assert_eq!(*img.get_pixel(0, 0), CARD_CREAM);
        assert_eq!(*img.get_pixel(511, 511), CARD_CREAM);

        let gold: Vec<(u32, u32)> = img
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == CARD_GOLD)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!gold.is_empty());

        let min_x = gold.iter().map(|g| g.0).min().unwrap();
        let max_x = gold.iter().map(|g| g.0).max().unwrap();
        let min_y = gold.iter().map(|g| g.1).min().unwrap();
        let max_y = gold.iter().map(|g| g.1).max().unwrap();
        assert!(min_x >= 32 && max_x < 480);
        // Roughly centered both ways
        assert!(((min_x + max_x) as i32 - 511).abs() < 40);
        assert!(((min_y + max_y) as i32 - 511).abs() < 20);
    }

    #[test]
    fn test_long_caption_fits() {
        let caption = "MERRY CHRISTMAS AND A HAPPY NEW YEAR";
        let img = photo_card(CARD_SIZE, caption).unwrap();
        for y in 0..CARD_SIZE {
            assert_eq!(*img.get_pixel(0, y), CARD_CREAM);
            assert_eq!(*img.get_pixel(CARD_SIZE - 1, y), CARD_CREAM);
        }
    }

    #[test]
    fn test_blank_caption() {
        let img = photo_card(64, "   ").unwrap();
        assert!(img.pixels().all(|p| *p == CARD_CREAM));
    }

    #[test]
    fn test_undecodable_photo() {
        let err = decode_photo("notes.png", b"definitely not an image").unwrap_err();
        match err {
            TextureError::Decode { path, .. } => assert_eq!(path, PathBuf::from("notes.png")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_large_photo_downscaled() {
        let img = limit_size(RgbaImage::from_pixel(2048, 1024, WHITE)).unwrap();
        assert_eq!(img.dimensions(), (1024, 512));
    }
}
