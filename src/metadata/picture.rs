// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The PICTURE block's payload, and media type detection for cover art
//!
//! The payload layout is, with all integers big-endian:
//!
//! ```text
//! picture type (4) | media type length (4) | media type |
//! description length (4) | description | width (4) | height (4) |
//! color depth (4) | indexed colors (4) | data length (4) | image bytes
//! ```

use super::PayloadCursor;
use crate::Error;
use bitstream_io::{BigEndian, BitWrite, BitWriter};
use std::path::Path;

/// Number of leading bytes consulted when detecting a media type
const SNIFF_WINDOW: usize = 512;

/// A decoded PICTURE metadata block payload
///
/// Covers staged by this crate always use the front cover picture
/// type; pictures parsed from existing files keep whatever raw
/// type code they carried.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Picture {
    /// The raw picture type code
    pub picture_type: u32,
    /// The media type string as specified by RFC2046
    pub media_type: String,
    /// The description of the picture
    pub description: String,
    /// The width of the picture in pixels
    pub width: u32,
    /// The height of the picture in pixels
    pub height: u32,
    /// The color depth of the picture in bits per pixel
    pub color_depth: u32,
    /// For indexed-color pictures, the number of colors used
    pub colors_used: u32,
    /// The binary picture data
    pub data: Vec<u8>,
}

impl Picture {
    /// The "front cover" picture type code
    pub const FRONT_COVER: u32 = 3;

    /// Builds a front cover picture from raw image bytes and a media type
    ///
    /// The dimension fields default to 600×600 at a 24-bit color
    /// depth with no indexed colors.  These are placeholders, not
    /// derived from the image content; callers needing accurate
    /// metrics should overwrite the public fields before staging.
    pub fn new<V, S>(data: V, media_type: S) -> Self
    where
        V: Into<Vec<u8>>,
        S: Into<String>,
    {
        Self {
            picture_type: Self::FRONT_COVER,
            media_type: media_type.into(),
            description: String::new(),
            width: 600,
            height: 600,
            color_depth: 24,
            colors_used: 0,
            data: data.into(),
        }
    }

    /// Builds a front cover picture, detecting its media type from content
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageTooSmall`] when fewer bytes are
    /// available than the detection window requires, or
    /// [`Error::UnsupportedImageFormat`] on unrecognized content.
    pub fn from_sniffed_bytes<V>(data: V) -> Result<Self, Error>
    where
        V: Into<Vec<u8>> + AsRef<[u8]>,
    {
        detect_media_type(data.as_ref()).map(|media_type| Self::new(data, media_type))
    }

    /// Builds a front cover picture from an image file on disk
    ///
    /// The media type is detected from the file's content,
    /// never from its extension.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        std::fs::read(path)
            .map_err(Error::Io)
            .and_then(Self::from_sniffed_bytes)
    }

    /// Parses a PICTURE block payload
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedEndOfBlock`] when a declared
    /// length points past the payload's end.
    pub fn parse(payload: &[u8]) -> Result<Self, Error> {
        let mut r = PayloadCursor::new(payload);

        Ok(Self {
            picture_type: r.u32_be()?,
            media_type: {
                let len = r.u32_be()?;
                r.string(len as usize)?
            },
            description: {
                let len = r.u32_be()?;
                r.string(len as usize)?
            },
            width: r.u32_be()?,
            height: r.u32_be()?,
            color_depth: r.u32_be()?,
            colors_used: r.u32_be()?,
            data: {
                let len = r.u32_be()?;
                r.bytes(len as usize)?.to_vec()
            },
        })
    }

    /// Serializes ourself to a fresh block payload
    ///
    /// # Errors
    ///
    /// Returns [`Error::LengthOverflow`] if a field overflows its
    /// 32-bit length prefix.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        fn prefixed_field<W: BitWrite + ?Sized>(w: &mut W, field: &[u8]) -> Result<(), Error> {
            w.write_from::<u32>(field.len().try_into().map_err(|_| Error::LengthOverflow)?)?;
            w.write_bytes(field)?;
            Ok(())
        }

        let mut w = BitWriter::endian(Vec::new(), BigEndian);
        w.write_from::<u32>(self.picture_type)?;
        prefixed_field(&mut w, self.media_type.as_bytes())?;
        prefixed_field(&mut w, self.description.as_bytes())?;
        w.write_from(self.width)?;
        w.write_from(self.height)?;
        w.write_from(self.color_depth)?;
        w.write_from(self.colors_used)?;
        prefixed_field(&mut w, &self.data)?;
        Ok(w.into_writer())
    }
}

/// Detects an image's media type from its leading magic bytes
///
/// At least 512 bytes must be available for detection, the same
/// sniff window common HTTP content detectors use.
///
/// # Example
///
/// ```
/// use flac_metaedit::metadata::picture::detect_media_type;
///
/// let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0];
/// jpeg.resize(1000, 0);
/// assert_eq!(detect_media_type(&jpeg).unwrap(), "image/jpeg");
/// ```
pub fn detect_media_type(data: &[u8]) -> Result<&'static str, Error> {
    if data.len() < SNIFF_WINDOW {
        Err(Error::ImageTooSmall(data.len()))
    } else if data.starts_with(b"\x89\x50\x4E\x47\x0D\x0A\x1A\x0A") {
        Ok("image/png")
    } else if data.starts_with(b"\xFF\xD8\xFF") {
        Ok("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Ok("image/gif")
    } else if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        Ok("image/webp")
    } else if data.starts_with(b"BM") {
        Ok("image/bmp")
    } else {
        Err(Error::UnsupportedImageFormat)
    }
}
