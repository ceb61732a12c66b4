use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ember_common::{Error, Result};

use crate::providers::InlineImage;

/// Decode an inline image payload from its transport form: strip any
/// `data:<type>;base64,` prefix, check the base64 decodes, and sniff the
/// actual media type from the magic bytes. The sniffed type wins over
/// whatever the data URI claimed.
///
/// Failures map to [`Error::Provider`]; callers degrade to a text reply
/// rather than aborting the turn.
pub fn decode_inline_image(payload: &str) -> Result<InlineImage> {
    let data = payload
        .split_once("base64,")
        .map(|(_, rest)| rest)
        .unwrap_or(payload)
        .trim();

    let bytes = BASE64
        .decode(data)
        .map_err(|e| Error::Provider(format!("image payload is not valid base64: {e}")))?;

    let mime_type = sniff_image_mime(&bytes)
        .ok_or_else(|| Error::Provider("image payload is not a recognized image format".to_string()))?;

    Ok(InlineImage {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}

/// Identify PNG/JPEG/GIF/WebP from their magic bytes.
fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

    #[test]
    fn decodes_a_bare_base64_png() {
        let payload = BASE64.encode(PNG_HEADER);
        let image = decode_inline_image(&payload).expect("should decode");
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, payload);
    }

    #[test]
    fn strips_the_data_uri_prefix() {
        let encoded = BASE64.encode(PNG_HEADER);
        let payload = format!("data:image/png;base64,{encoded}");
        let image = decode_inline_image(&payload).expect("should decode");
        assert_eq!(image.data, encoded);
    }

    #[test]
    fn sniffed_type_wins_over_the_prefix_claim() {
        let jpeg = BASE64.encode([0xFF, 0xD8, 0xFF, 0xE0]);
        let payload = format!("data:image/png;base64,{jpeg}");
        let image = decode_inline_image(&payload).expect("should decode");
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[test]
    fn invalid_base64_is_an_error() {
        let err = decode_inline_image("!!! not base64 !!!").expect_err("should fail");
        assert!(err.to_string().contains("base64"));
    }

    #[test]
    fn unrecognized_bytes_are_an_error() {
        let payload = BASE64.encode(b"plain text, no image here");
        let err = decode_inline_image(&payload).expect_err("should fail");
        assert!(err.to_string().contains("not a recognized image format"));
    }
}
