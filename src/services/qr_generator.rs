use chrono::{DateTime, Utc};
use qrcode::render::svg;
use qrcode::QrCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::signature;

#[derive(thiserror::Error, Debug)]
pub enum QrGenerationError {
    #[error("QR code generation failed: {0}")]
    QrCodeError(#[from] qrcode::types::QrError),

    #[error("JSON serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Payload embedded in an attendee badge QR code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgePayload {
    pub attendee_id: Uuid,
    pub event_id: Uuid,
    pub full_name: String,
    pub issued_at: DateTime<Utc>,
}

/// Wire form of a badge: the payload fields plus the HMAC signature the
/// scanner checks before classifying a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedBadge {
    #[serde(flatten)]
    pub badge: BadgePayload,
    pub sig: String,
}

impl BadgePayload {
    pub fn new(attendee_id: Uuid, event_id: Uuid, full_name: String) -> Self {
        Self {
            attendee_id,
            event_id,
            full_name,
            issued_at: Utc::now(),
        }
    }

    fn to_signing_string(&self) -> Result<String, QrGenerationError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Signs the payload, producing the wire form
    pub fn sign(self, signing_key: &[u8]) -> Result<SignedBadge, QrGenerationError> {
        let sig = signature::sign(&self.to_signing_string()?, signing_key);
        Ok(SignedBadge { badge: self, sig })
    }
}

impl SignedBadge {
    /// Parses a scanned badge payload and checks its signature.
    ///
    /// Returns `None` for malformed JSON or a bad signature — an invalid
    /// badge is a classification concern, not an error.
    pub fn parse_and_verify(raw: &str, signing_key: &[u8]) -> Option<BadgePayload> {
        let signed: SignedBadge = serde_json::from_str(raw).ok()?;
        let canonical = signed.badge.to_signing_string().ok()?;

        if signature::verify(&canonical, &signed.sig, signing_key) {
            Some(signed.badge)
        } else {
            None
        }
    }

    pub fn to_json(&self) -> Result<String, QrGenerationError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Generates a badge QR code rendered as SVG
pub fn generate_qr_svg(badge: &SignedBadge) -> Result<String, QrGenerationError> {
    let json_str = badge.to_json()?;

    let code = QrCode::new(json_str.as_bytes())?;
    let svg = code.render::<svg::Color>().min_dimensions(200, 200).build();

    Ok(svg)
}

/// Generates a badge QR code rendered as PNG bytes
pub fn generate_qr_png(badge: &SignedBadge) -> Result<Vec<u8>, QrGenerationError> {
    use image::{ImageBuffer, Luma};

    let json_str = badge.to_json()?;
    let code = QrCode::new(json_str.as_bytes())?;

    // Each module is 10x10 pixels
    let module_size = 10u32;
    let width = code.width() as u32;
    let img_size = width * module_size;

    let mut img = ImageBuffer::<Luma<u8>, Vec<u8>>::new(img_size, img_size);

    for (x, y, color) in img.enumerate_pixels_mut() {
        let module_x = x / module_size;
        let module_y = y / module_size;
        let module_color = code[(module_x as usize, module_y as usize)];
        let pixel_value = match module_color {
            qrcode::types::Color::Dark => Luma([0u8]),
            qrcode::types::Color::Light => Luma([255u8]),
        };
        *color = pixel_value;
    }

    let mut png_data = Vec::new();
    image::DynamicImage::ImageLuma8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut png_data),
            image::ImageFormat::Png,
        )
        .map_err(|_| QrGenerationError::QrCodeError(qrcode::types::QrError::DataTooLong))?;

    Ok(png_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_badge() -> BadgePayload {
        BadgePayload::new(Uuid::new_v4(), Uuid::new_v4(), "Ada Lovelace".to_string())
    }

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let key = b"badge-signing-key";
        let badge = sample_badge();
        let attendee_id = badge.attendee_id;

        let signed = badge.sign(key).unwrap();
        let raw = signed.to_json().unwrap();

        let verified = SignedBadge::parse_and_verify(&raw, key).unwrap();
        assert_eq!(verified.attendee_id, attendee_id);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let signed = sample_badge().sign(b"key-a").unwrap();
        let raw = signed.to_json().unwrap();

        assert!(SignedBadge::parse_and_verify(&raw, b"key-b").is_none());
    }

    #[test]
    fn test_tampered_badge_rejected() {
        let signed = sample_badge().sign(b"key").unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&signed.to_json().unwrap()).unwrap();
        value["attendee_id"] = serde_json::json!(Uuid::new_v4());

        assert!(SignedBadge::parse_and_verify(&value.to_string(), b"key").is_none());
    }

    #[test]
    fn test_garbage_payload_rejected() {
        assert!(SignedBadge::parse_and_verify("not json", b"key").is_none());
        assert!(SignedBadge::parse_and_verify(r#"{"sig":"aa"}"#, b"key").is_none());
    }

    #[test]
    fn test_qr_svg_generation() {
        let signed = sample_badge().sign(b"key").unwrap();
        let svg = generate_qr_svg(&signed).unwrap();

        assert!(svg.contains("<svg"));
        assert!(svg.contains("</svg>"));
    }
}
