//! Token fingerprints for limiter and cache keys.

/// Short stable hash of a token: first 8 bytes of BLAKE3, hex-encoded.
/// Rate-limiter and cache keys embed this instead of the secret itself.
pub fn token_fingerprint(token: &str) -> String {
    hex::encode(&blake3::hash(token.as_bytes()).as_bytes()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = token_fingerprint("token-a");
        assert_eq!(a, token_fingerprint("token-a"));
        assert_eq!(a.len(), 16);
        assert_ne!(a, token_fingerprint("token-b"));
    }

    #[test]
    fn fingerprint_does_not_leak_token() {
        let fp = token_fingerprint("super-secret-value");
        assert!(!fp.contains("secret"));
    }
}
