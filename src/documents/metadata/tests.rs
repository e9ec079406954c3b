use super::*;
use tempfile::TempDir;

const CSV: &str = "\
filename,department,region,policy_type,effective_date,description
expense_policy.pdf,Finance,Global,Policy,2024-01-01,Travel and expense reimbursement
remote_work_policy.pdf,HR,North America,Guideline,,
data_retention.pdf,  Legal , EU ,,2023-06-30,Record keeping
";

#[test]
fn rows_are_keyed_by_filename() {
    let catalog = MetadataCatalog::from_reader(CSV.as_bytes(), &MetadataDefaults::default())
        .expect("valid csv");

    assert_eq!(catalog.len(), 3);
    let expense = catalog.lookup("expense_policy.pdf");
    assert_eq!(expense.department, "Finance");
    assert_eq!(expense.region, "Global");
    assert_eq!(expense.effective_date, "2024-01-01");
    assert_eq!(expense.description, "Travel and expense reimbursement");
}

#[test]
fn blank_cells_take_defaults() {
    let catalog = MetadataCatalog::from_reader(CSV.as_bytes(), &MetadataDefaults::default())
        .expect("valid csv");

    let remote = catalog.lookup("remote_work_policy.pdf");
    assert_eq!(remote.policy_type, "Guideline");
    assert_eq!(remote.effective_date, UNSPECIFIED);
    assert_eq!(remote.description, UNSPECIFIED);

    let retention = catalog.lookup("data_retention.pdf");
    assert_eq!(retention.department, "Legal");
    assert_eq!(retention.region, "EU");
    assert_eq!(retention.policy_type, UNSPECIFIED);
}

#[test]
fn unknown_files_get_flag_defaults() {
    let defaults = MetadataDefaults {
        department: Some("Operations".to_string()),
        region: None,
        policy_type: Some("  ".to_string()),
    };
    let catalog = MetadataCatalog::from_reader(CSV.as_bytes(), &defaults).expect("valid csv");

    let other = catalog.lookup("security_policy.pdf");
    assert_eq!(other.department, "Operations");
    assert_eq!(other.region, UNSPECIFIED);
    assert_eq!(other.policy_type, UNSPECIFIED);
    assert!(!catalog.contains("security_policy.pdf"));

    // Flag defaults also fill blank cells
    assert_eq!(
        catalog.lookup("data_retention.pdf").policy_type,
        UNSPECIFIED
    );
    assert_eq!(
        catalog.lookup("remote_work_policy.pdf").department,
        "HR"
    );
}

#[test]
fn empty_catalog_uses_defaults() {
    let catalog = MetadataCatalog::new(&MetadataDefaults::default());
    assert!(catalog.is_empty());
    assert_eq!(catalog.lookup("anything.pdf"), PolicyMetadata::default());
}

#[test]
fn missing_optional_columns_are_allowed() {
    let csv = "filename,department\nhandbook.pdf,HR\n";
    let catalog = MetadataCatalog::from_reader(csv.as_bytes(), &MetadataDefaults::default())
        .expect("valid csv");

    let handbook = catalog.lookup("handbook.pdf");
    assert_eq!(handbook.department, "HR");
    assert_eq!(handbook.region, UNSPECIFIED);
}

#[test]
fn missing_filename_column_is_rejected() {
    let csv = "department,region\nHR,EU\n";
    let result = MetadataCatalog::from_reader(csv.as_bytes(), &MetadataDefaults::default());
    assert!(matches!(result, Err(PolicyError::Config(_))));
}

#[test]
fn reports_rows_without_files() {
    let catalog = MetadataCatalog::from_reader(CSV.as_bytes(), &MetadataDefaults::default())
        .expect("valid csv");

    let present = vec![
        "expense_policy.pdf".to_string(),
        "remote_work_policy.pdf".to_string(),
    ];
    assert_eq!(catalog.unmatched(&present), vec!["data_retention.pdf"]);
}

#[test]
fn loads_from_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("metadata.csv");
    std::fs::write(&path, CSV).expect("write csv");

    let catalog =
        MetadataCatalog::from_csv_path(&path, &MetadataDefaults::default()).expect("load csv");
    assert_eq!(catalog.len(), 3);

    let missing = MetadataCatalog::from_csv_path(
        &dir.path().join("absent.csv"),
        &MetadataDefaults::default(),
    );
    assert!(missing.is_err());
}
