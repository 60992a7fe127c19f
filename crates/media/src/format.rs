//! Inline image decoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::MediaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Identify the format from the leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

/// Decode a `data:image/...;base64,` URI or bare base64 payload.
///
/// The bytes themselves decide the format; a declared MIME type only has to
/// name one of the accepted image types.
pub fn decode_image(input: &str, max_bytes: usize) -> Result<DecodedImage, MediaError> {
    let input = input.trim();

    let payload = match input.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| MediaError::InvalidEncoding("data URI has no payload".into()))?;

            let mut parts = header.split(';');
            let mime = parts.next().unwrap_or_default();
            if !parts.any(|part| part.eq_ignore_ascii_case("base64")) {
                return Err(MediaError::InvalidEncoding(
                    "data URI must be base64 encoded".into(),
                ));
            }
            if ImageFormat::from_mime(mime).is_none() {
                return Err(MediaError::UnsupportedType(mime.to_string()));
            }
            payload
        }
        None => input,
    };

    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(MediaError::InvalidEncoding("image payload is empty".into()));
    }

    let estimated = compact.len() / 4 * 3;
    if estimated > max_bytes.saturating_add(3) {
        return Err(MediaError::TooLarge {
            size: estimated,
            limit: max_bytes,
        });
    }

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| MediaError::InvalidEncoding(e.to_string()))?;

    if bytes.len() > max_bytes {
        return Err(MediaError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    let format = ImageFormat::sniff(&bytes)
        .ok_or_else(|| MediaError::UnsupportedType("unrecognised image data".into()))?;

    Ok(DecodedImage { format, bytes })
}
