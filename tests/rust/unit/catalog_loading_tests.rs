//! Catalog definitions, snapshots and reloads through the public API.

#[cfg(test)]
mod catalog_loading {
    use std::io::Write;

    use rulesql::collection_catalog::{
        CatalogConfig, CatalogError, CatalogStore, CollectionLookup, FieldKind,
    };

    const YAML: &str = r#"
collections:
  - id: pbc_posts
    name: posts
    fields:
      - name: title
        type: text
      - name: published
        type: autodate
      - name: related
        type: relation
        collection: pbc_posts
        multiple: true
"#;

    #[test]
    fn test_relation_target_by_id() {
        let catalog = CatalogConfig::from_yaml_str(YAML)
            .unwrap()
            .to_catalog()
            .unwrap();

        let posts = catalog.find_collection_by_name_or_id("pbc_posts").unwrap();
        assert_eq!(posts.name, "posts");
        assert_eq!(posts.field_names(), vec!["id", "title", "published", "related"]);
        assert_eq!(posts.field("published").unwrap().kind, FieldKind::AutoDate);

        let related = posts.field("related").unwrap().kind.as_relation().unwrap();
        assert_eq!(related.collection_id, "pbc_posts");
        assert!(related.multiple);
    }

    #[test]
    fn test_store_reload_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let store = CatalogStore::from_yaml_file(file.path()).unwrap();
        let before = store.snapshot();
        assert_eq!(before.len(), 1);

        let mut next = tempfile::NamedTempFile::new().unwrap();
        next.write_all(b"collections:\n  - name: tags\n  - name: notes\n")
            .unwrap();
        store.reload_from_yaml_file(next.path()).unwrap();

        assert_eq!(store.snapshot().len(), 2);
        assert_eq!(before.len(), 1);
    }

    #[test]
    fn test_duplicate_collection_ids() {
        let yaml = r#"
collections:
  - id: c1
    name: posts
  - id: c1
    name: tags
"#;
        let err = CatalogConfig::from_yaml_str(yaml)
            .unwrap()
            .to_catalog()
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateCollection {
                key: "id",
                value: "c1".to_string()
            }
        );
    }
}
