//! Built-in senders driven through a configuration document.

use std::time::Duration;

use logsend_core::{interpret, ConfigDocument, ConfigError, RunSettings};
use logsend_senders::with_builtin_senders;
use rusqlite::Connection;
use tempfile::TempDir;

const FLUSH: Duration = Duration::from_secs(5);

#[tokio::test]
async fn file_and_sqlite_receive_typed_captures() {
    let dir = TempDir::new().expect("tempdir");
    let out = dir.path().join("errors.log");
    let db = dir.path().join("events.db");
    Connection::open(&db)
        .unwrap()
        .execute_batch("create table requests (path text, took integer, load real)")
        .unwrap();

    let raw = serde_json::json!({
        "file": {"path": out.display().to_string()},
        "sqlite": {"path": db.display().to_string()},
        "groups": [{
            "mask": "\\.log$",
            "rules": [
                {
                    "regexp": "GET (?P<path>\\S+) took=(?P<took_INT>\\d+) load=(?P<load_FLOAT>[\\d.]+)",
                    "sqlite": {"query": "insert into requests values('{{.path}}', {{.took}}, {{.load}})"},
                    "file": {"template": "{{ path }} {{ took * 2 }}"}
                },
                {"regexp": "ERROR", "file": {}}
            ]
        }]
    });
    let doc = ConfigDocument::from_json(&raw.to_string()).expect("decode");
    let mut registry = with_builtin_senders().expect("registry");
    let table = interpret(&doc, &mut registry, &RunSettings::default()).expect("interpret");

    assert!(!registry.is_activated("stdout"));
    assert_eq!(table.route_all("GET /index took=21 load=0.5"), 1);
    assert_eq!(table.route_all("ERROR disk full"), 1);
    assert_eq!(table.route_all("nothing here"), 0);
    assert!(registry.flush(FLUSH).await.is_empty());

    let lines = std::fs::read_to_string(&out).unwrap();
    assert_eq!(lines, "/index 42\nERROR\n");

    let conn = Connection::open(&db).unwrap();
    let (took, load): (i64, f64) = conn
        .query_row("select took, load from requests where path = '/index'", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(took, 21);
    assert!((load - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn sqlite_binding_without_query_fails_interpretation() {
    let doc = ConfigDocument::from_json(
        r#"{"sqlite": {"path": ":memory:"},
            "groups": [{"mask": ".*", "rules": [{"regexp": "x", "sqlite": {}}]}]}"#,
    )
    .unwrap();
    let mut registry = with_builtin_senders().unwrap();
    let err = interpret(&doc, &mut registry, &RunSettings::default()).unwrap_err();
    assert!(
        matches!(err, ConfigError::Binding { ref sender, .. } if sender == "sqlite"),
        "got: {err}"
    );
}

#[tokio::test]
async fn bad_template_syntax_fails_interpretation() {
    let doc = ConfigDocument::from_json(
        r#"{"stdout": {},
            "groups": [{"mask": ".*", "rules": [{"regexp": "x", "stdout": {"template": "{{ oops"}}]}]}"#,
    )
    .unwrap();
    let mut registry = with_builtin_senders().unwrap();
    let err = interpret(&doc, &mut registry, &RunSettings::default()).unwrap_err();
    assert!(matches!(err, ConfigError::Binding { .. }), "got: {err}");
}
