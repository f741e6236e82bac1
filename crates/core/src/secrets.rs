use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Short stable fingerprint of a secret, safe to log and expose in health
/// output. Lets an operator confirm which token a deploy picked up without
/// the token itself ever reaching a log line.
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..6])
}

/// Constant-time string comparison for webhook and admin secrets.
pub fn secrets_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_short_and_stable() {
        let fp = token_fingerprint("12345:token");
        assert_eq!(fp.len(), 12);
        assert_eq!(fp, token_fingerprint("12345:token"));
        assert_ne!(fp, token_fingerprint("12345:other"));
    }

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("abc", "abc"));
        assert!(!secrets_match("abc", "abd"));
        assert!(!secrets_match("abc", "abcd"));
        assert!(!secrets_match("", "abc"));
    }
}
