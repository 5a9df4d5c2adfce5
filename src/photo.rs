//! Uploaded photo decoding and normalization.
//!
//! Every photo is oriented upright (EXIF) and converted to 8-bit RGB before a
//! detector sees it. The uploaded bytes are not kept; only their SHA-256 is.

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, RgbImage};
use sha2::{Digest, Sha256};
use std::io::Cursor;

/// Normalized RGB photo ready for detection.
pub struct Photo {
    image: RgbImage,
    sha256: [u8; 32],
}

impl Photo {
    /// Wrap an already-decoded RGB image. The digest covers the raw pixels.
    pub fn from_rgb(image: RgbImage) -> Self {
        let sha256 = Sha256::digest(image.as_raw()).into();
        Self { image, sha256 }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Interleaved RGB bytes, row major.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn sha256_hex(&self) -> String {
        hex::encode(self.sha256)
    }
}

/// Decode an uploaded JPEG or PNG into an upright RGB photo.
pub fn decode_photo(bytes: &[u8]) -> Result<Photo> {
    if bytes.is_empty() {
        return Err(anyhow!("photo upload is empty"));
    }
    let format = image::guess_format(bytes).context("unrecognized photo format")?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(anyhow!(
            "unsupported photo format {:?}; expected JPEG or PNG",
            format
        ));
    }

    let mut decoder = ImageReader::with_format(Cursor::new(bytes), format)
        .into_decoder()
        .context("decode photo header")?;
    let orientation = decoder.orientation().context("read photo orientation")?;
    let mut image = DynamicImage::from_decoder(decoder).context("decode photo")?;
    image.apply_orientation(orientation);

    let rgb = normalize_to_rgb(image);
    log::debug!(
        "decoded {:?} photo {}x{} ({} bytes)",
        format,
        rgb.width(),
        rgb.height(),
        bytes.len()
    );
    Ok(Photo {
        image: rgb,
        sha256: Sha256::digest(bytes).into(),
    })
}

fn normalize_to_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.into_rgb8(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, format).expect("encode test image");
        out.into_inner()
    }

    #[test]
    fn png_round_trips_to_rgb() -> Result<()> {
        let rgb = ImageBuffer::from_pixel(4, 3, Rgb([10u8, 20, 30]));
        let bytes = encode(DynamicImage::ImageRgb8(rgb), ImageFormat::Png);

        let photo = decode_photo(&bytes)?;
        assert_eq!((photo.width(), photo.height()), (4, 3));
        assert_eq!(&photo.pixels()[..3], &[10, 20, 30]);
        assert_eq!(photo.sha256_hex(), hex::encode(Sha256::digest(&bytes)));
        Ok(())
    }

    #[test]
    fn grayscale_is_expanded_to_rgb() -> Result<()> {
        let gray = ImageBuffer::from_pixel(2, 2, Luma([77u8]));
        let bytes = encode(DynamicImage::ImageLuma8(gray), ImageFormat::Png);

        let photo = decode_photo(&bytes)?;
        assert_eq!(photo.pixels(), &[77u8; 12][..]);
        Ok(())
    }

    #[test]
    fn jpeg_is_accepted() -> Result<()> {
        let rgb = ImageBuffer::from_pixel(8, 8, Rgb([200u8, 200, 200]));
        let bytes = encode(DynamicImage::ImageRgb8(rgb), ImageFormat::Jpeg);
        let photo = decode_photo(&bytes)?;
        assert_eq!((photo.width(), photo.height()), (8, 8));
        Ok(())
    }

    #[test]
    fn rejects_empty_and_unknown_uploads() {
        assert!(decode_photo(&[]).is_err());
        assert!(decode_photo(b"not an image at all").is_err());
    }
}
