/*!
Tests for the integrity envelope: digests, stamping and version checks.
*/

#[cfg(test)]
mod tests {
    use crate::integrity::{
        compute_digest, stamp, verify, FormatVersion, StampedSnapshot, VersionRequirement,
        FORMAT_VERSION, MIN_SUPPORTED_VERSION,
    };
    use crate::{Node, PakError, Snapshot, Value};

    fn sample_snapshot() -> Snapshot {
        let mut pak = Node::new();
        pak.set_path("player.name", "ada").unwrap();
        pak.set_path("player.level", 3).unwrap();
        pak.set("flags", vec![true, false]).unwrap();
        pak.to_snapshot()
    }

    #[test]
    fn test_digest_is_deterministic() {
        let first = compute_digest(&sample_snapshot()).unwrap();
        let second = compute_digest(&sample_snapshot()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_digest_distinguishes_branch_from_map() {
        let mut as_nodes = Node::new();
        as_nodes.set_path("a.b", 1).unwrap();

        let mut inner = std::collections::BTreeMap::new();
        inner.insert("b".to_string(), Value::Int(1));
        let mut as_maps = Node::new();
        as_maps.set("a", Value::Map(inner)).unwrap();

        // structurally equal, but only one of them is a branch
        assert_eq!(as_nodes, as_maps);
        assert_ne!(
            compute_digest(&as_nodes.to_snapshot()).unwrap(),
            compute_digest(&as_maps.to_snapshot()).unwrap()
        );
    }

    #[test]
    fn test_digest_changes_with_content() {
        let mut changed = sample_snapshot();
        changed.insert("extra".to_string(), Value::Null);
        assert_ne!(
            compute_digest(&sample_snapshot()).unwrap(),
            compute_digest(&changed).unwrap()
        );
    }

    #[test]
    fn test_stamp_then_verify() {
        let stamped = stamp(sample_snapshot(), FORMAT_VERSION, None).unwrap();
        assert_eq!(stamped.version, FORMAT_VERSION);

        let state = verify(stamped, &VersionRequirement::default()).unwrap();
        assert_eq!(state, sample_snapshot());
    }

    #[test]
    fn test_saved_at_is_not_covered() {
        let mut stamped = stamp(sample_snapshot(), FORMAT_VERSION, None).unwrap();
        stamped.saved_at = stamped.saved_at - chrono::Duration::days(30);
        assert!(verify(stamped, &VersionRequirement::default()).is_ok());
    }

    #[test]
    fn test_created_at_defaults_to_first_save() {
        let stamped = stamp(sample_snapshot(), FORMAT_VERSION, None).unwrap();
        assert_eq!(stamped.created_at, stamped.saved_at);
    }

    #[test]
    fn test_created_at_is_carried_over() {
        let created = chrono::Utc::now() - chrono::Duration::days(7);
        let stamped = stamp(sample_snapshot(), FORMAT_VERSION, Some(created)).unwrap();
        assert_eq!(stamped.created_at, created);
        assert!(stamped.saved_at > created);
    }

    #[test]
    fn test_modified_state_fails_integrity() {
        let mut stamped = stamp(sample_snapshot(), FORMAT_VERSION, None).unwrap();
        stamped
            .state
            .insert("injected".to_string(), Value::Text("x".to_string()));

        let result = verify(stamped, &VersionRequirement::default());
        assert!(matches!(result, Err(PakError::IntegrityCheckFailed { .. })));
    }

    #[test]
    fn test_integrity_checked_before_version() {
        let mut stamped = stamp(sample_snapshot(), FormatVersion::new(0, 1, 0), None).unwrap();
        stamped.digest = "0".repeat(64);

        let result = verify(stamped, &VersionRequirement::default());
        assert!(matches!(result, Err(PakError::IntegrityCheckFailed { .. })));
    }

    #[test]
    fn test_old_version_rejected() {
        let stamped = stamp(sample_snapshot(), FormatVersion::new(0, 9, 9), None).unwrap();
        match verify(stamped, &VersionRequirement::AtLeast(MIN_SUPPORTED_VERSION)) {
            Err(PakError::IncompatibleVersion { stored, required }) => {
                assert_eq!(stored, FormatVersion::new(0, 9, 9));
                assert_eq!(required, MIN_SUPPORTED_VERSION);
            }
            other => panic!("Expected IncompatibleVersion, got {other:?}"),
        }
    }

    #[test]
    fn test_bypass_accepts_old_version() {
        let stamped = stamp(sample_snapshot(), FormatVersion::new(0, 1, 0), None).unwrap();
        assert!(verify(stamped, &VersionRequirement::Bypass).is_ok());
    }

    #[test]
    fn test_reserved_field_names_on_the_wire() {
        let stamped = stamp(sample_snapshot(), FORMAT_VERSION, None).unwrap();
        let json = serde_json::to_value(&stamped).unwrap();

        assert!(json.get("__pak_digest__").is_some());
        assert_eq!(json["__pak_version__"], serde_json::json!([1, 0, 0]));
        assert!(json.get("__pak_created_at__").is_some());
        assert!(json.get("__pak_saved_at__").is_some());
        assert!(json["state"].get("player").is_some());

        let back: StampedSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back.digest, stamped.digest);
    }

    #[test]
    fn test_user_key_named_like_metadata_is_preserved() {
        let mut pak = Node::new();
        pak.set("__pak_digest__", "user data").unwrap();

        let stamped = stamp(pak.to_snapshot(), FORMAT_VERSION, None).unwrap();
        let state = verify(stamped, &VersionRequirement::default()).unwrap();
        assert_eq!(
            state.get("__pak_digest__"),
            Some(&Value::Text("user data".to_string()))
        );
    }
}
