use rand::RngCore;

/// Random bytes per session token; hex encoding doubles the length.
const TOKEN_BYTES: usize = 60;

/// Fresh tokens tried before giving up on finding an unused one.
pub(super) const MAX_ATTEMPTS: usize = 5;

/// Generate a new opaque session token.
pub(super) fn generate() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_hex_and_distinct() {
        let a = generate();
        let b = generate();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
