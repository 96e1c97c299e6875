use ring::hmac;

/// Signs a payload with HMAC-SHA256, returning a hex string.
pub fn sign(payload: &str, key: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    let tag = hmac::sign(&key, payload.as_bytes());
    hex::encode(tag.as_ref())
}

/// Verifies a hex HMAC-SHA256 signature in constant time.
pub fn verify(payload: &str, signature: &str, key: &[u8]) -> bool {
    let Ok(sig_bytes) = hex::decode(signature) else {
        return false;
    };

    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::verify(&key, payload.as_bytes(), &sig_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let key = b"test-signing-key";
        let signature = sign("payload", key);

        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(verify("payload", &signature, key));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let key = b"test-signing-key";
        let signature = sign("payload", key);

        assert!(!verify("payload2", &signature, key));
        assert!(!verify("payload", &signature, b"other-key"));
    }

    #[test]
    fn test_malformed_signature_fails() {
        assert!(!verify("payload", "not-hex", b"key"));
        assert!(!verify("payload", "", b"key"));
    }
}
