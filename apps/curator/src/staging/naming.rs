use chrono::{DateTime, Utc};

use crate::staging::{PermanentStores, StagingArea};

/// Time-based candidate for a new submission's base identifier.
pub fn candidate_base(now: DateTime<Utc>) -> String {
    format!("item_{}", now.timestamp_millis())
}

/// Returns `candidate`, or `candidate_N` with the smallest N ≥ 1, such that no
/// staged or promoted artifact already uses that stem.
///
/// Check-then-use is not atomic; only one ingestion process may run at a time.
pub fn ensure_unique_base(
    candidate: &str,
    staging: &StagingArea,
    stores: &PermanentStores,
) -> String {
    let taken = |name: &str| staging.has_stem(name) || stores.has_stem(name);

    let mut name = candidate.to_string();
    let mut suffix = 1u32;
    while taken(&name) {
        name = format!("{candidate}_{suffix}");
        suffix += 1;
    }
    name
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::TimeZone;

    use super::*;
    use crate::staging::ArtifactKind;

    fn fixture() -> (tempfile::TempDir, StagingArea, PermanentStores) {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join("pending"));
        let stores = PermanentStores::new(
            dir.path().join("images"),
            dir.path().join("prompts"),
            "images",
            "prompts",
        );
        fs::create_dir_all(&stores.image_dir).unwrap();
        fs::create_dir_all(&stores.prompt_dir).unwrap();
        (dir, staging, stores)
    }

    #[test]
    fn test_candidate_uses_epoch_millis() {
        let now = Utc.timestamp_millis_opt(1_000).unwrap();
        assert_eq!(candidate_base(now), "item_1000");
    }

    #[test]
    fn test_free_candidate_is_returned_unchanged() {
        let (_dir, staging, stores) = fixture();
        assert_eq!(ensure_unique_base("item_1000", &staging, &stores), "item_1000");
    }

    #[test]
    fn test_collisions_in_any_location_get_suffixes() {
        let (_dir, staging, stores) = fixture();
        // staged title marker only
        staging.write("item_1000", ArtifactKind::Title, b"t").unwrap();
        // promoted prompt only
        fs::write(stores.prompt_path("item_1000_1"), "p").unwrap();
        // promoted image only
        fs::write(stores.image_path("item_1000_2"), "i").unwrap();

        assert_eq!(ensure_unique_base("item_1000", &staging, &stores), "item_1000_3");
    }

    #[test]
    fn test_repeated_allocations_never_collide() {
        let (_dir, staging, stores) = fixture();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..5 {
            let base = ensure_unique_base("item_42", &staging, &stores);
            assert!(seen.insert(base.clone()), "duplicate base {base}");
            staging.write(&base, ArtifactKind::Image, b"jpeg").unwrap();
        }
        assert!(seen.contains("item_42_4"));
    }
}
