//! Integration tests for config merging functionality

use gist::fields::Tier;
use gist::prelude::*;
use std::io::Write;

#[test]
fn test_merge_single_config() {
    let config = GistConfig::default_config();
    let original_types = config.types.len();

    let merged = GistConfig::default().merge(config);

    assert_eq!(merged.types.len(), original_types);
    assert!(merged.build_registry().is_ok());
}

#[test]
fn test_merge_multiple_configs_no_overlap() {
    let config1_yaml = r#"
types:
  - name: dataSet
    shareable: true
    properties:
      - name: name
        type: text
      - name: dataElements
        collection: dataElement
  - name: dataElement
    properties:
      - name: name
        type: text
      - name: valueType
        type: text
"#;

    let config2_yaml = r#"
types:
  - name: category
    plural: categories
    properties:
      - name: name
        type: text
"#;

    let config1 = GistConfig::from_yaml_str(config1_yaml).unwrap();
    let config2 = GistConfig::from_yaml_str(config2_yaml).unwrap();

    let merged = config1.merge(config2);
    assert_eq!(merged.types.len(), 3);

    let registry = merged.build_registry().unwrap();
    assert!(registry.collection("dataSets").is_some());
    assert!(registry.collection("dataElements").is_some());
    assert!(registry.collection("categories").is_some());
}

#[test]
fn test_merge_configs_with_type_overlap() {
    let config1_yaml = r#"
types:
  - name: orgUnit
    properties:
      - name: name
        type: text
      - name: level
        type: number
"#;

    let config2_yaml = r#"
types:
  - name: orgUnit
    display: Organisation unit
    properties:
      - name: name
        type: text
      - name: path
        type: text
"#;

    let merged = GistConfig::from_yaml_str(config1_yaml)
        .unwrap()
        .merge(GistConfig::from_yaml_str(config2_yaml).unwrap());

    // Later declaration replaces the earlier one as a whole
    assert_eq!(merged.types.len(), 1);
    let registry = merged.build_registry().unwrap();
    let org_unit = registry.get("orgUnit").unwrap();
    assert_eq!(org_unit.display, "Organisation unit");
    assert!(org_unit.get("path").is_some());
    assert!(org_unit.get("level").is_none());
}

#[test]
fn test_merge_later_settings_win() {
    let first = GistConfig::from_yaml_str("paging:\n  default_page_size: 10\n").unwrap();
    let second = GistConfig::from_yaml_str(
        "paging:\n  default_page_size: 25\nprojection:\n  default_tier: S\n",
    )
    .unwrap();

    let merged = first.merge(second);
    assert_eq!(merged.paging.default_page_size, 25);
    assert_eq!(merged.projection.default_tier, Tier::S);
}

#[test]
fn test_merge_reference_across_files() {
    let users = GistConfig::default_config();
    let programs = GistConfig::from_yaml_str(
        r#"
types:
  - name: program
    properties:
      - name: name
        type: text
      - name: owner
        reference: user
"#,
    )
    .unwrap();

    // A reference may point at a type declared in another file
    assert!(programs.build_registry().is_err());
    assert!(users.merge(programs).build_registry().is_ok());
}

#[test]
fn test_merge_files_from_disk() {
    let mut base = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        base,
        "server:\n  base_url: https://play.example.org\ntypes:\n  - name: indicator\n    properties:\n      - name: name\n        type: text"
    )
    .unwrap();
    let mut overlay = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        overlay,
        "server:\n  base_url: https://prod.example.org\ntypes:\n  - name: dashboard\n    properties:\n      - name: name\n        type: text"
    )
    .unwrap();

    let merged = GistConfig::from_yaml_file(base.path())
        .unwrap()
        .merge(GistConfig::from_yaml_file(overlay.path()).unwrap());

    assert_eq!(merged.server.base_url, "https://prod.example.org");
    assert_eq!(merged.types.len(), 2);
}

#[test]
fn test_builder_merges_configs_in_order() {
    let host = GistServerBuilder::new()
        .with_config(GistConfig::default_config())
        .with_config(
            GistConfig::from_yaml_str(
                "types:\n  - name: userGroup\n    plural: teams\n    properties:\n      - name: name\n        type: text\n",
            )
            .unwrap(),
        )
        .build_host()
        .unwrap();

    assert!(host.registry.collection("teams").is_some());
    assert!(host.registry.collection("userGroups").is_none());
}
