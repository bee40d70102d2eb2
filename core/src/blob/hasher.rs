//! Blob digests
//!
//! `sha256(path || content)`, fed as two updates with no separator. Remote stores
//! compute the same digest independently, so the byte sequence must not change.

use sha2::{Digest, Sha256};

/// Compute the 64-character lower-case hex digest of a blob
pub fn digest(logical_path: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(logical_path.as_bytes());
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_shape() {
        let d = digest("src/main.rs", "fn main() {}\n");
        assert_eq!(d.len(), 64);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(digest("a.py", "print(1)\n"), digest("a.py", "print(1)\n"));
    }

    #[test]
    fn test_known_vectors() {
        // sha256("") and sha256("abc") split across the two inputs
        assert_eq!(
            digest("", ""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            digest("a", "bc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(digest("ab", "c"), digest("a", "bc"));
    }

    #[test]
    fn test_path_and_content_both_matter() {
        let base = digest("a.py", "x = 1\n");
        assert_ne!(base, digest("b.py", "x = 1\n"));
        assert_ne!(base, digest("a.py", "x = 2\n"));
        assert_ne!(
            digest("a.py#chunk1of2", "same\n"),
            digest("a.py#chunk2of2", "same\n")
        );
    }
}
