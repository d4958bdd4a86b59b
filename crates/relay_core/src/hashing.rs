use serde::Serialize;
use sha2::{Digest, Sha256};

/// First 8 bytes of the SHA-256 digest, hex encoded.
pub(crate) fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

/// Hash of a value's JSON form. Struct fields serialize in declaration order, so the
/// result is stable for a given type.
pub(crate) fn fingerprint<T: Serialize>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(json) => short_hash(&json),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{fingerprint, short_hash};

    #[test]
    fn short_hash_is_stable_hex() {
        let hash = short_hash("abc");
        assert_eq!(hash, "ba7816bf8f01cfea");
        assert_eq!(hash, short_hash("abc"));
    }

    #[test]
    fn fingerprint_depends_on_every_field() {
        #[derive(serde::Serialize)]
        struct Pair<'a> {
            a: &'a str,
            b: Option<&'a str>,
        }
        let base = fingerprint(&Pair { a: "x", b: None });
        assert_ne!(base, fingerprint(&Pair { a: "x", b: Some("") }));
        assert_ne!(base, fingerprint(&Pair { a: "y", b: None }));
    }
}
