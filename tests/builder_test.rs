//! Tests for manifest parsing and the manifest shape builder

use rstest::rstest;

use tagbind::domain::{parse_path, DomainError, Manifest, TreeBuilder, ROOT_ALIAS};
use tagbind::tree_traits::TreeNodeConvert;

#[rstest]
#[case("Body/Head", vec!["Body", "Head"])]
#[case("/Body//Head/", vec!["Body", "Head"])]
#[case("Wheel", vec!["Wheel"])]
#[case("", vec![])]
#[case("///", vec![])]
fn given_path_when_parsing_then_empty_segments_are_dropped(
    #[case] path: &str,
    #[case] expected: Vec<&str>,
) {
    assert_eq!(parse_path(path), expected);
}

#[test]
fn given_nested_manifest_when_building_then_shares_intermediate_nodes() {
    // Arrange
    let manifest = Manifest::new()
        .with("a", "A")
        .with("b", "B")
        .with("c", "B/C");

    // Act
    let shape = TreeBuilder::new().build(&manifest).unwrap();

    // Assert
    let root = shape.root();
    let b = shape.child(root, "B").expect("B node");
    let c = shape.child(b, "C").expect("C node");
    assert_eq!(shape.len(), 4, "root, A, B and C");
    assert_eq!(shape.target(), 4);
    assert_eq!(shape.depth(), 3);
    assert_eq!(shape.node(root).unwrap().alias.as_deref(), Some(ROOT_ALIAS));
    assert_eq!(shape.node(b).unwrap().alias.as_deref(), Some("b"));
    assert!(!shape.node(b).unwrap().is_leaf());
    assert!(shape.node(c).unwrap().is_leaf());
}

#[test]
fn given_unaliased_intermediate_when_building_then_node_has_no_alias() {
    let manifest = Manifest::new().with("wheel", "Chassis/Wheel");

    let shape = TreeBuilder::new().build(&manifest).unwrap();

    let chassis = shape.child(shape.root(), "Chassis").unwrap();
    assert_eq!(shape.node(chassis).unwrap().alias, None);
    assert_eq!(shape.target(), 2);
    assert_eq!(shape.leaf_aliases(), vec!["wheel".to_string()]);
}

#[test]
fn given_two_aliases_on_one_path_when_building_then_duplicate_alias() {
    let manifest = Manifest::new().with("x", "A").with("y", "/A/");

    let err = TreeBuilder::new().build(&manifest).unwrap_err();

    assert_eq!(
        err,
        DomainError::DuplicateAlias {
            path: "/A".to_string(),
            existing: "x".to_string(),
            alias: "y".to_string(),
        }
    );
}

#[test]
fn given_empty_path_when_building_then_collides_with_root() {
    let manifest = Manifest::new().with("self", "");

    let err = TreeBuilder::new().build(&manifest).unwrap_err();

    assert!(matches!(
        err,
        DomainError::DuplicateAlias { ref existing, .. } if existing == ROOT_ALIAS
    ));
}

#[test]
fn given_root_alias_in_manifest_when_building_then_reserved() {
    let manifest = Manifest::new().with(ROOT_ALIAS, "Body");

    let err = TreeBuilder::new().build(&manifest).unwrap_err();

    assert_eq!(err, DomainError::ReservedAlias(ROOT_ALIAS.to_string()));
}

#[test]
fn given_empty_manifest_when_building_then_root_is_a_leaf() {
    let shape = TreeBuilder::new().build(&Manifest::new()).unwrap();

    assert_eq!(shape.len(), 1);
    assert_eq!(shape.target(), 1);
    assert!(shape.node(shape.root()).unwrap().is_leaf());
}

#[test]
fn given_toml_manifest_section_when_parsing_then_reads_pairs() {
    let content = r#"
[manifest]
head = "Body/Head"
wheel = "Wheel"
"#;

    let manifest = Manifest::from_toml_str(content).unwrap();

    assert_eq!(manifest.len(), 2);
    assert_eq!(manifest.get("head"), Some("Body/Head"));
    assert_eq!(manifest.target(), 3);
}

#[test]
fn given_non_string_toml_value_when_parsing_then_invalid_manifest() {
    let err = Manifest::from_toml_str("wheel = 4").unwrap_err();

    assert!(matches!(err, DomainError::InvalidManifest { .. }));
}

#[test]
fn given_shape_when_rendering_then_walks_in_name_order() {
    let manifest = Manifest::new().with("z", "Z").with("a", "A/Inner");
    let shape = TreeBuilder::new().build(&manifest).unwrap();

    let rendered = shape.to_tree_string().to_string();
    let a_pos = rendered.find("A").unwrap();
    let z_pos = rendered.find("Z [z]").unwrap();

    assert!(a_pos < z_pos, "children render in name order:\n{rendered}");
    assert!(rendered.contains("Inner [a]"));
    let walked: Vec<_> = shape
        .iter()
        .map(|(_, node)| node.segment.clone())
        .collect();
    assert_eq!(walked, vec!["", "A", "Inner", "Z"]);
}
