//! Identity-based entity hashing.
//!
//! The id deliberately excludes the entity body: an implementation change
//! keeps the id, so inbound edges stay valid and derived metadata is merely
//! stale. Changing name, containing file or signature mints a new identity;
//! renames surface as delete + create rather than tracked renames.

use crate::types::{EntityId, EntityKind};
use sha2::{Digest, Sha256};

/// Joins hash fields; US (unit separator) is not expected in any field.
const FIELD_SEP: char = '\u{1f}';

const ID_HEX_LEN: usize = 16;

pub fn entity_id(
    repository_id: &str,
    file_path: &str,
    kind: EntityKind,
    name: &str,
    signature: Option<&str>,
) -> EntityId {
    truncated_digest(&[
        repository_id,
        file_path,
        &kind.to_string(),
        name,
        signature.unwrap_or(""),
    ])
}

/// Deterministic id for a quarantine placeholder, so a placeholder can be
/// looked up and deleted without a table scan and re-runs never duplicate it.
pub fn quarantine_id(repository_id: &str, file_path: &str) -> EntityId {
    truncated_digest(&[repository_id, file_path, "quarantine"])
}

fn truncated_digest(fields: &[&str]) -> EntityId {
    let mut hasher = Sha256::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update(FIELD_SEP.to_string().as_bytes());
        }
        hasher.update(field.as_bytes());
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(ID_HEX_LEN);
    for byte in digest.iter().take(ID_HEX_LEN / 2) {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_across_calls() {
        let a = entity_id("repo", "src/a.ts", EntityKind::Function, "foo", Some("(x)"));
        let b = entity_id("repo", "src/a.ts", EntityKind::Function, "foo", Some("(x)"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn id_ignores_body_but_not_identity_fields() {
        let base = entity_id("repo", "src/a.ts", EntityKind::Function, "foo", None);
        assert_ne!(
            base,
            entity_id("repo", "src/b.ts", EntityKind::Function, "foo", None)
        );
        assert_ne!(
            base,
            entity_id("repo", "src/a.ts", EntityKind::Function, "bar", None)
        );
        assert_ne!(
            base,
            entity_id("repo", "src/a.ts", EntityKind::Function, "foo", Some("()"))
        );
        assert_ne!(
            base,
            entity_id("repo", "src/a.ts", EntityKind::Class, "foo", None)
        );
    }

    #[test]
    fn separator_prevents_field_bleed() {
        // "ab" + "c" must not collide with "a" + "bc".
        assert_ne!(
            truncated_digest(&["ab", "c"]),
            truncated_digest(&["a", "bc"])
        );
    }

    #[test]
    fn quarantine_id_is_deterministic() {
        assert_eq!(
            quarantine_id("repo", "src/huge.ts"),
            quarantine_id("repo", "src/huge.ts")
        );
        assert_ne!(
            quarantine_id("repo", "src/huge.ts"),
            quarantine_id("repo", "src/other.ts")
        );
    }
}
