// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use gleaner::{
    Connection, Dialect, Error, FieldValue, GleanerConfig, TypeMap, connect_and_ingest,
    expand_pattern, ingest_dialect, ingest_patterns, open_database, read_column, read_columns,
    table_columns,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const TIMING_A: &str = "\
# revision casename nProcs DomSize |KDUPS|simLoop|
r1 cube 24 64 1.5 10.0
r1 cube 48 64 2.5 6.0
";

const TIMING_B: &str = "\
#revision casename nProcs DomSize KDUPS simLoop MemRSS
r2 cube 24 64 1.7 9.0 2048
";

fn write_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content)?;
    Ok(path)
}

fn row_count(conn: &Connection, table: &str) -> Result<i64> {
    Ok(conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
        row.get(0)
    })?)
}

#[test]
fn test_timing_file_typed_columns() -> Result<()> {
    let _ = env_logger::try_init();
    let dir = TempDir::new()?;
    let path = write_file(dir.path(), "timing.res", TIMING_A)?;

    let mut conn = open_database(":memory:")?;
    let rows = ingest_dialect(
        &mut conn,
        "timing",
        &path,
        Dialect::Timing,
        &TypeMap::timing(),
    )?;
    assert_eq!(rows, 2);
    assert_eq!(
        table_columns(&conn, "timing")?,
        vec!["revision", "casename", "nProcs", "DomSize", "KDUPS", "simLoop"]
    );

    let cols = read_columns(&conn, "timing", &["revision", "nProcs", "simLoop"])?;
    assert_eq!(cols[0], vec![FieldValue::from("r1"), FieldValue::from("r1")]);
    assert_eq!(cols[1], vec![FieldValue::Integer(24), FieldValue::Integer(48)]);
    assert_eq!(cols[2], vec![FieldValue::Real(10.0), FieldValue::Real(6.0)]);
    Ok(())
}

#[test]
fn test_ingest_twice_doubles_rows() -> Result<()> {
    let _ = env_logger::try_init();
    let dir = TempDir::new()?;
    let path = write_file(dir.path(), "timing.res", TIMING_A)?;
    let pattern = path.to_string_lossy().to_string();

    let mut conn = open_database(":memory:")?;
    let types = TypeMap::timing();
    let first = ingest_patterns(&mut conn, &[&pattern], "timing", Dialect::Timing, &types)?;
    let second = ingest_patterns(&mut conn, &[&pattern], "timing", Dialect::Timing, &types)?;

    assert_eq!(first.rows, 2);
    assert_eq!(second.rows, 2);
    assert_eq!(first.columns, second.columns);
    assert_eq!(row_count(&conn, "timing")?, 4);
    Ok(())
}

#[test]
fn test_new_header_fields_extend_table() -> Result<()> {
    let _ = env_logger::try_init();
    let dir = TempDir::new()?;
    write_file(dir.path(), "runs/a/timing.res", TIMING_A)?;
    write_file(dir.path(), "runs/b/timing.res", TIMING_B)?;
    write_file(dir.path(), "runs/b/notes.txt", "not a result file\n")?;

    let pattern = format!("{}/runs/*/timing.res", dir.path().display());
    let matched = expand_pattern(&pattern)?;
    assert_eq!(matched.len(), 2);
    assert!(matched[0].ends_with("runs/a/timing.res"));

    let db = dir.path().join("results.duckdb");
    let conn = connect_and_ingest(&[pattern], &db, "timing", Dialect::Timing)?;
    assert_eq!(row_count(&conn, "timing")?, 3);
    assert_eq!(
        table_columns(&conn, "timing")?.last().map(String::as_str),
        Some("MemRSS")
    );
    assert_eq!(
        read_column(&conn, "timing", "MemRSS")?,
        vec![FieldValue::Null, FieldValue::Null, FieldValue::Integer(2048)]
    );
    drop(conn);

    // The store persists across connections
    let conn = open_database(&db)?;
    assert_eq!(row_count(&conn, "timing")?, 3);
    Ok(())
}

#[test]
fn test_tracking_and_csv_dialects() -> Result<()> {
    let _ = env_logger::try_init();
    let dir = TempDir::new()?;
    let tracking = write_file(
        dir.path(),
        "probe.res",
        "# s kg/m^3 m\n# time density(kg/m^3) coordX\n0.0 1.0 0.5\n0.1 1.1 0.5\n",
    )?;
    let csv = write_file(
        dir.path(),
        "slice.csv",
        "\"Points:0\",\"Points:1\",\"p\"\n1.0,0.0,3.5\n0.0,1.0,4.5\n",
    )?;

    let mut conn = open_database(":memory:")?;
    for (table, path, dialect) in [
        ("probe", &tracking, Dialect::Tracking),
        ("slice", &csv, Dialect::ExportedCsv),
    ] {
        let rows = ingest_dialect(&mut conn, table, path, dialect, &dialect.type_map())?;
        assert_eq!(rows, 2);
    }

    assert_eq!(table_columns(&conn, "probe")?, vec!["time", "density", "coordX"]);
    assert_eq!(
        read_column(&conn, "probe", "density")?,
        vec![FieldValue::Real(1.0), FieldValue::Real(1.1)]
    );
    assert_eq!(table_columns(&conn, "slice")?, vec!["Points_0", "Points_1", "p"]);
    assert_eq!(
        read_column(&conn, "slice", "p")?,
        vec![FieldValue::Real(3.5), FieldValue::Real(4.5)]
    );
    Ok(())
}

#[test]
fn test_row_width_mismatch_commits_nothing() -> Result<()> {
    let _ = env_logger::try_init();
    let dir = TempDir::new()?;
    let path = write_file(
        dir.path(),
        "broken.res",
        "# revision nProcs KDUPS\nr1 24 1.0\nr1 48\n",
    )?;

    let mut conn = open_database(":memory:")?;
    let err = ingest_dialect(
        &mut conn,
        "timing",
        &path,
        Dialect::Timing,
        &TypeMap::timing(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::RowWidth {
            line: 3,
            expected: 3,
            found: 2,
            ..
        }
    ));
    assert_eq!(row_count(&conn, "timing")?, 0);
    Ok(())
}

#[test]
fn test_missing_literal_file_fails() -> Result<()> {
    let _ = env_logger::try_init();
    let dir = TempDir::new()?;
    let missing = dir.path().join("absent.res");
    assert!(matches!(
        expand_pattern(&missing.to_string_lossy()),
        Err(Error::Io { .. })
    ));
    // A glob without matches is not an error
    let pattern = format!("{}/*.res", dir.path().display());
    assert!(expand_pattern(&pattern)?.is_empty());
    Ok(())
}

#[test]
fn test_parent_components_after_wildcard_rejected() -> Result<()> {
    let _ = env_logger::try_init();
    let dir = TempDir::new()?;
    write_file(dir.path(), "runs/a/timing.res", TIMING_A)?;

    let pattern = format!("{}/runs/*/../*.res", dir.path().display());
    assert!(matches!(
        expand_pattern(&pattern),
        Err(Error::Pattern { pattern: p, .. }) if p == pattern
    ));
    assert!(matches!(
        expand_pattern("runs/*/../*.res"),
        Err(Error::Pattern { .. })
    ));
    Ok(())
}

#[test]
fn test_config_driven_ingest()-> Result<()> {
    let _ = env_logger::try_init();
    let dir = TempDir::new()?;
    write_file(dir.path(), "runs/a/timing.res", TIMING_A)?;
    write_file(
        dir.path(),
        "slice.csv",
        "\"Points:0\",\"p\"\n1.0,3.5\n2.0,4.5\n",
    )?;

    let yaml = format!(
        "database: {db}
sources:
  - table: timing
    dialect: timing
    patterns: [\"{root}/runs/*/timing.res\"]
    types: {{ revision: TEXT }}
  - table: slice
    dialect: csv
    patterns: [\"{root}/slice.csv\"]
",
        db = dir.path().join("config.duckdb").display(),
        root = dir.path().display(),
    );
    let config_path = write_file(dir.path(), "gleaner.yaml", &yaml)?;

    let config = GleanerConfig::load(&config_path)?;
    let mut conn = config.ingest()?;
    assert_eq!(row_count(&conn, "timing")?, 2);
    assert_eq!(row_count(&conn, "slice")?, 2);

    // Sources append on every run
    let report = config.sources[1].ingest(&mut conn)?;
    assert_eq!(report.files, 1);
    assert_eq!(report.columns, vec!["Points_0", "p"]);
    assert_eq!(row_count(&conn, "slice")?, 4);
    Ok(())
}
