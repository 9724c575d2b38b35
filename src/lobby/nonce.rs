//! Room code generation

use rand::Rng;

/// Length of a room code.
pub const NONCE_LEN: usize = 4;

// 36^4, about 1.68 million distinct codes. Collisions are rare but real,
// which is why the controller bounds its retry loop instead of spinning.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Sample a candidate room code. The caller checks it for collisions
/// against both the live registry and the archive.
pub fn propose() -> String {
    let mut rng = rand::thread_rng();
    (0..NONCE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposed_codes_are_short_uppercase_alphanumeric() {
        for _ in 0..100 {
            let code = propose();
            assert_eq!(code.len(), NONCE_LEN);
            assert!(code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }
}
