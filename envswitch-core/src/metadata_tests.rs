/*!
Tests for metadata values and diffing, including edge cases.
*/

#[cfg(test)]
mod tests {
    use crate::metadata::{diff_metadata, Change, ChangeKind, Metadata, MetadataValue};

    fn meta(pairs: &[(&str, MetadataValue)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_diff_reports_all_kinds() {
        let snapshot = meta(&[
            ("account", "alice@corp.io".into()),
            ("project", "billing".into()),
            ("profiles", 2i64.into()),
        ]);
        let live = meta(&[
            ("account", "bob@corp.io".into()),
            ("profiles", 2i64.into()),
            ("region", "eu-west-1".into()),
        ]);

        let changes = diff_metadata(&snapshot, &live);

        assert_eq!(
            changes,
            vec![
                Change::modified("account", "alice@corp.io".into(), "bob@corp.io".into()),
                Change::removed("project", "billing".into()),
                Change::added("region", "eu-west-1".into()),
            ]
        );
    }

    #[test]
    fn test_diff_against_empty_snapshot() {
        let live = meta(&[("context", "kind-dev".into()), ("contexts", 3i64.into())]);
        let changes = diff_metadata(&Metadata::new(), &live);

        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.kind == ChangeKind::Added));
        assert!(changes.iter().all(|c| c.old.is_none()));
    }

    #[test]
    fn test_type_change_is_a_modification() {
        let snapshot = meta(&[("signing", MetadataValue::Bool(true))]);
        let live = meta(&[("signing", MetadataValue::String("true".into()))]);

        let changes = diff_metadata(&snapshot, &live);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn test_metadata_yaml_roundtrip_keeps_variants() {
        let original = meta(&[
            ("context", "prod".into()),
            ("contexts", 4i64.into()),
            ("signing", true.into()),
        ]);

        let yaml = serde_yaml::to_string(&original).unwrap();
        let parsed: Metadata = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed, original);
        assert_eq!(parsed["contexts"], MetadataValue::Number(4));
        assert_eq!(parsed["signing"], MetadataValue::Bool(true));
    }

    #[test]
    fn test_change_kind_serializes_lowercase() {
        let json = serde_json::to_string(&ChangeKind::Removed).unwrap();
        assert_eq!(json, "\"removed\"");
    }
}
