//! Experiment table loading tests

use nip_harness::experiment::{load_definitions, ExperimentTable};
use nip_harness::Error;

fn shipped_table() -> ExperimentTable {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("framework.json");
    ExperimentTable::load(path).expect("framework.json must load")
}

#[test]
fn test_shipped_framework_table() {
    let table = shipped_table();
    let names: Vec<&str> = table.names().collect();
    assert_eq!(names, ["train-nip", "train-manipulation", "train-djpg"]);

    let nip = table.resolve("train-nip").unwrap();
    assert!(nip.command().contains("--cam \"{cam}\""));
    assert_eq!(nip.files()[0], "nip_snapshots/{}/inet/progress.json");
    let perf = nip.performance().unwrap();
    assert_eq!(perf.file(), "nip_snapshots/{}/inet/progress.json");
    assert_eq!(perf.values().get("Performance/psnr"), Some(&40.0));
}

#[test]
fn test_performance_is_optional() {
    let table = load_definitions(
        r#"{"plot": {"log": "plot.log", "command": "python3 plot.py", "files": ["plots/{}.pdf"]}}"#,
    )
    .unwrap();
    assert!(table.resolve("plot").unwrap().performance().is_none());
}

#[test]
fn test_invalid_json_is_config_error() {
    let err = load_definitions("{ not json").unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_top_level_must_be_object() {
    assert!(matches!(
        load_definitions(r#"["train-nip"]"#),
        Err(Error::Config { .. })
    ));
}

#[test]
fn test_each_required_field() {
    for missing in ["log", "command", "files"] {
        let mut entry = serde_json::json!({
            "log": "x.log",
            "command": "true",
            "files": []
        });
        entry.as_object_mut().unwrap().remove(missing);
        let source = serde_json::json!({ "x": entry }).to_string();

        let err = load_definitions(&source).unwrap_err();
        assert!(
            err.to_string().contains(missing),
            "error for missing '{missing}' was: {err}"
        );
    }
}

#[test]
fn test_wrong_field_types() {
    let cases = [
        r#"{"x": {"log": 1, "command": "true", "files": []}}"#,
        r#"{"x": {"log": "x.log", "command": "true", "files": "a"}}"#,
        r#"{"x": {"log": "x.log", "command": "true", "files": [1]}}"#,
        r#"{"x": {"log": "x.log", "command": "true", "files": [], "performance": {"values": {}}}}"#,
        r#"{"x": {"log": "x.log", "command": "true", "files": [], "performance": {"file": "p.json", "values": {"a": "high"}}}}"#,
        r#"{"x": "not an object"}"#,
    ];
    for source in cases {
        assert!(
            matches!(load_definitions(source), Err(Error::Config { .. })),
            "accepted: {source}"
        );
    }
}

#[test]
fn test_unknown_fields_are_ignored() {
    let table = load_definitions(
        r#"{"x": {"log": "x.log", "command": "true", "files": [], "notes": "resume from epoch 20"}}"#,
    )
    .unwrap();
    assert_eq!(table.len(), 1);
}

#[test]
fn test_resolve_all_fails_on_first_unknown() {
    let table = shipped_table();
    let err = table
        .resolve_all(&["train-nip", "train-fan", "also-missing"])
        .unwrap_err();
    assert!(matches!(err, Error::UnknownExperiment(ref name) if name == "train-fan"));
}
