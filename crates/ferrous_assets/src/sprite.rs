//! Sprite sources and their decoding into RGBA8 pixels.

use std::io::{self, Cursor};
use std::path::PathBuf;

use image::io::Reader as ImageReader;
use image::{ImageEncoder, RgbaImage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("could not read image: {0}")]
    Io(#[from] io::Error),
    #[error("could not decode image: {0}")]
    Image(#[from] image::ImageError),
}

/// Where a sprite's encoded bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpriteSource {
    File(PathBuf),
    /// An encoded image (PNG) already in memory.
    Memory(Vec<u8>),
}

impl SpriteSource {
    /// Width and height from the image header, without decoding pixels.
    pub fn dimensions(&self) -> Result<(u32, u32), DecodeError> {
        Ok(match self {
            SpriteSource::File(path) => ImageReader::open(path)?
                .with_guessed_format()?
                .into_dimensions()?,
            SpriteSource::Memory(bytes) => ImageReader::new(Cursor::new(bytes))
                .with_guessed_format()?
                .into_dimensions()?,
        })
    }

    pub fn decode(&self) -> Result<RgbaImage, DecodeError> {
        let image = match self {
            SpriteSource::File(path) => ImageReader::open(path)?.with_guessed_format()?.decode()?,
            SpriteSource::Memory(bytes) => image::load_from_memory(bytes)?,
        };
        Ok(image.to_rgba8())
    }
}

impl From<PathBuf> for SpriteSource {
    fn from(path: PathBuf) -> Self {
        SpriteSource::File(path)
    }
}

impl From<Vec<u8>> for SpriteSource {
    fn from(bytes: Vec<u8>) -> Self {
        SpriteSource::Memory(bytes)
    }
}

/// Encodes an RGBA8 buffer as PNG. Used for in-memory sprites and the atlas
/// debug dump.
pub fn encode_png(width: u32, height: u32, rgba: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out).write_image(
        rgba,
        width,
        height,
        image::ColorType::Rgba8,
    )?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> Vec<u8> {
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                rgba.extend_from_slice(&[v, 0, 255 - v, 255]);
            }
        }
        rgba
    }

    #[test]
    fn memory_source_reports_header_dimensions() {
        let png = encode_png(5, 3, &checker(5, 3)).unwrap();
        assert_eq!(SpriteSource::Memory(png).dimensions().unwrap(), (5, 3));
    }

    #[test]
    fn memory_source_decodes_pixels() {
        let rgba = checker(4, 4);
        let png = encode_png(4, 4, &rgba).unwrap();
        let image = SpriteSource::from(png).decode().unwrap();
        assert_eq!(image.dimensions(), (4, 4));
        assert_eq!(image.as_raw(), &rgba);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let source = SpriteSource::Memory(b"definitely not a png".to_vec());
        assert!(source.dimensions().is_err());
        assert!(source.decode().is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let source = SpriteSource::File(PathBuf::from("/nonexistent/sprite.png"));
        assert!(matches!(source.dimensions(), Err(DecodeError::Io(_))));
    }
}
