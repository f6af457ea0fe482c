use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Stable, URL-safe identity for a story, derived from its canonical link.
///
/// Shared and saved stories are keyed by this value, so the hash and the
/// encoding must never change between releases. Callers trim the link
/// before it gets here; the input is hashed byte for byte.
pub fn story_identity(link: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(link.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_deterministic() {
        let link = "https://news.example/2024/apple-watch";
        assert_eq!(story_identity(link), story_identity(link));
    }

    #[test]
    fn identity_is_pinned() {
        // SHA-256("abc"), base64url without padding. Changing this breaks
        // every stored shared/saved story reference.
        assert_eq!(
            story_identity("abc"),
            "ungWv48Bz-pBQUDeXa4iI7ADYaOWF3qctBD_YfIAFa0"
        );
    }

    #[test]
    fn identity_is_url_safe() {
        for i in 0..200 {
            let id = story_identity(&format!("https://news.example/{i}"));
            assert_eq!(id.len(), 43);
            assert!(id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn single_character_difference_changes_identity() {
        let a = story_identity("https://news.example/a");
        let b = story_identity("https://news.example/b");
        let c = story_identity("https://news.example/a ");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
