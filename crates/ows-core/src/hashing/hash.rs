//! Hash helpers sobre blake3.

use blake3::Hasher;

/// Hashea un string y devuelve hex.
pub fn hash_str(input: &str) -> String {
    let mut h = Hasher::new();
    h.update(input.as_bytes());
    h.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_digest_is_stable() {
        let a = hash_str("ows");
        assert_eq!(a, hash_str("ows"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_str("ows "));
    }
}
