//! # Reference Data Tests
//!
//! Loading the drug catalog and the food interactions table from disk,
//! including the files shipped under `config/`.

use medication_victory_plan::catalog::DrugCatalog;
use medication_victory_plan::drug_matcher::DrugMatcher;
use medication_victory_plan::errors::AppError;
use medication_victory_plan::interactions::{FoodInteractions, NO_KNOWN_INTERACTIONS};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn shipped(file: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config").join(file)
}

fn temp_file_with(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file
}

#[test]
fn test_catalog_loads_from_file() {
    let file = temp_file_with(r#"[{"name": "Warfarin", "dose": "5mg"}]"#);
    let catalog = DrugCatalog::load_from_path(file.path()).unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.entries()[0].name, "Warfarin");
}

#[test]
fn test_explicit_catalog_path_is_authoritative() {
    let err = DrugCatalog::load(Some("/definitely/not/here/drug_list.json")).unwrap_err();
    match err {
        AppError::Config(msg) => assert!(msg.contains("failed to read drug catalog")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn test_malformed_catalog_file_fails_whole_load() {
    let file = temp_file_with(
        r#"[{"name": "Warfarin", "dose": "5mg"}, {"dose": "10mg"}]"#,
    );
    let err = DrugCatalog::load_from_path(file.path()).unwrap_err();
    assert_eq!(
        err,
        AppError::Config("drug catalog[1] is missing 'name'".to_string())
    );
}

#[test]
fn test_shipped_catalog_is_valid_and_matches_its_own_names() {
    let catalog = Arc::new(DrugCatalog::load_from_path(shipped("drug_list.json")).unwrap());
    assert!(!catalog.is_empty());

    let matcher = DrugMatcher::new(Arc::clone(&catalog));
    for entry in catalog.entries() {
        let label = format!("Rx {} {} tablets", entry.name.to_uppercase(), entry.dose);
        let found = matcher.match_text(&label).expect("own name should match");
        assert_eq!(found.confidence, 1.0, "{}", entry.name);
    }
}

#[test]
fn test_interactions_load_from_file_case_insensitively() {
    let file = temp_file_with(
        r#"[{"name": " Warfarin ", "food_interactions": ["Kale", "Cranberry juice"]}]"#,
    );
    let table = FoodInteractions::load_from_path(file.path()).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.get("warfarin"), vec!["Kale", "Cranberry juice"]);
    assert_eq!(table.get("Warfarin"), table.get("WARFARIN"));
}

#[test]
fn test_unknown_drug_has_no_known_interactions() {
    let table = FoodInteractions::from_json_str("[]").unwrap();
    assert!(table.is_empty());
    assert_eq!(table.get("Metformin"), vec![NO_KNOWN_INTERACTIONS.to_string()]);
}

#[test]
fn test_interactions_reject_blank_names() {
    let err = FoodInteractions::from_json_str(r#"[{"name": " ", "food_interactions": []}]"#)
        .unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn test_shipped_interactions_cover_warfarin() {
    let table = FoodInteractions::load_from_path(shipped("drug_food_interactions.json")).unwrap();
    let foods = table.get("Warfarin");
    assert!(!foods.is_empty());
    assert_ne!(foods, vec![NO_KNOWN_INTERACTIONS.to_string()]);
}
