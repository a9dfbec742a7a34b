//! Command-layer tests against temporary archives.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use clap::Parser;
use ostrich::cli::{Cli, execute};
use ostrich_core::StoreError;
use std::fs;
use std::path::Path;
use tempfile::{TempDir, tempdir};

async fn run(args: &[&str]) -> Result<String, StoreError> {
    let mut argv = vec!["ostrich"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    let mut out = Vec::new();
    execute(cli, &mut out).await?;
    Ok(String::from_utf8(out).unwrap())
}

fn path(p: &Path) -> &str {
    p.to_str().unwrap()
}

/// Archive with a snapshot of three triples and one patch.
async fn archive() -> (TempDir, String) {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("archive");
    let v0 = dir.path().join("v0.txt");
    let v1 = dir.path().join("v1.txt");
    fs::write(
        &v0,
        "+ <http://ex.org/a> <http://ex.org/p> <http://ex.org/b> .\n\
         + <http://ex.org/a> <http://ex.org/p> \"one\"^^<http://ex.org/t> .\n\
         + <http://ex.org/c> <http://ex.org/q> <http://ex.org/a> .\n",
    )
    .unwrap();
    fs::write(
        &v1,
        "# second version\n\
         - <http://ex.org/a> <http://ex.org/p> <http://ex.org/b> .\n\
         + <http://ex.org/a> <http://ex.org/p> <http://ex.org/d> .\n",
    )
    .unwrap();

    let out = run(&["append", path(&archive), "-f", path(&v0)]).await.unwrap();
    assert_eq!(out.trim(), "Appended 3 elements as version 0");
    let out = run(&["append", path(&archive), "-f", path(&v1), "-V", "1"])
        .await
        .unwrap();
    assert_eq!(out.trim(), "Appended 2 elements as version 1");
    let archive = archive.to_str().unwrap().to_string();
    (dir, archive)
}

#[tokio::test]
async fn vm_prints_total_and_ntriples() {
    let (_dir, archive) = archive().await;
    let out = run(&["vm", &archive, "<http://ex.org/a> ?p ?o", "-v", "0"])
        .await
        .unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "# Total matches: 2");
    assert_eq!(lines.len(), 3);
    assert!(lines.contains(&"<http://ex.org/a> <http://ex.org/p> <http://ex.org/b> ."));
    assert!(lines.contains(&"<http://ex.org/a> <http://ex.org/p> \"one\"^^<http://ex.org/t> ."));
}

#[tokio::test]
async fn vm_latest_with_literal_object() {
    let (_dir, archive) = archive().await;
    let out = run(&["vm", &archive, "?s ?p \"one\"^^<http://ex.org/t>"])
        .await
        .unwrap();
    assert!(out.starts_with("# Total matches: 1\n"));

    let out = run(&["vm", &archive, "?s ?p <http://ex.org/b>"]).await.unwrap();
    assert_eq!(out, "# Total matches: 0\n");
}

#[tokio::test]
async fn unknown_term_reports_estimate() {
    let (_dir, archive) = archive().await;
    let out = run(&["vm", &archive, "<http://ex.org/nope> ?p ?o"]).await.unwrap();
    assert_eq!(out, "# Total matches: 0 (estimated)\n");
}

#[tokio::test]
async fn dm_prints_signed_triples() {
    let (_dir, archive) = archive().await;
    let out = run(&["dm", &archive, "?s ?p ?o", "-s", "0", "-e", "1"]).await.unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "# Total matches: 2");
    assert!(lines.contains(&"- <http://ex.org/a> <http://ex.org/p> <http://ex.org/b>"));
    assert!(lines.contains(&"+ <http://ex.org/a> <http://ex.org/p> <http://ex.org/d>"));
}

#[tokio::test]
async fn v_prints_version_lists() {
    let (_dir, archive) = archive().await;
    let out = run(&["v", &archive, "?s ?p <http://ex.org/b>"]).await.unwrap();
    assert_eq!(
        out,
        "# Total matches: 1\n<http://ex.org/a> <http://ex.org/p> <http://ex.org/b>\n    >> [0]\n"
    );
}

#[tokio::test]
async fn json_output_is_parseable() {
    let (_dir, archive) = archive().await;
    let out = run(&["--json", "v", &archive, "<http://ex.org/c> ?p ?o"]).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["total_count"], 1);
    assert_eq!(value["has_exact_count"], true);
    assert_eq!(value["items"][0]["triple"]["subject"], "http://ex.org/c");
    assert_eq!(value["items"][0]["versions"], serde_json::json!([0, 1]));

    let out = run(&["metadata", &archive, "--json"]).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["metadata"]["max_version"], 1);
    assert_eq!(value["metadata"]["latest_triples"], 3);
    assert_eq!(value["metadata"]["distinct_triples"]["total_count"], 4);
}

#[tokio::test]
async fn metadata_text() {
    let (_dir, archive) = archive().await;
    let out = run(&["metadata", &archive]).await.unwrap();
    assert!(out.contains("  Versions: 1\n"));
    assert!(out.contains("  Unique triples: 4\n"));
    assert!(out.contains("  Triples in last version: 3\n"));
    assert!(out.contains("  v1: +1 -1 = 3 triples"));
}

#[tokio::test]
async fn errors_surface_as_store_errors() {
    let (dir, archive) = archive().await;
    assert!(matches!(
        run(&["vm", &archive, "?s ?p ?o", "-v", "7"]).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        run(&["dm", &archive, "?s ?p ?o", "-s", "1", "-e", "1"]).await,
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        run(&["vm", &archive, "?s ?p"]).await,
        Err(StoreError::InvalidArgument(_))
    ));
    let missing = dir.path().join("missing");
    assert!(matches!(
        run(&["metadata", path(&missing)]).await,
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(!missing.exists());

    let patch = dir.path().join("again.txt");
    fs::write(&patch, "+ <http://ex.org/x> <http://ex.org/p> <http://ex.org/y> .\n").unwrap();
    assert!(matches!(
        run(&["append", &archive, "-f", path(&patch), "-V", "1"]).await,
        Err(StoreError::Conflict(_))
    ));
}

#[tokio::test]
async fn ingest_then_resume() {
    let data = tempdir().unwrap();
    fs::create_dir_all(data.path().join("0")).unwrap();
    fs::write(
        data.path().join("0").join("data.nt.additions.txt"),
        "<http://ex.org/s> <http://ex.org/p> <http://ex.org/o> .\n",
    )
    .unwrap();
    fs::create_dir_all(data.path().join("1")).unwrap();
    fs::write(
        data.path().join("1").join("data.nt.deletions.txt"),
        "<http://ex.org/s> <http://ex.org/p> <http://ex.org/o> .\n",
    )
    .unwrap();

    let dir = tempdir().unwrap();
    let archive = dir.path().join("archive");
    let out = run(&["ingest", path(&archive), path(data.path())]).await.unwrap();
    assert!(out.contains("version 0: 1 elements"));
    assert!(out.contains("version 1: 1 elements"));

    let out = run(&["ingest", path(&archive), path(data.path())]).await.unwrap();
    assert!(out.contains("version 0: already stored (1 elements), skipped"));
    assert!(out.contains("version 1: already stored (1 elements), skipped"));
}

#[tokio::test]
async fn config_file_overrides_and_flags() {
    let (dir, archive) = archive().await;
    let config = dir.path().join("ostrich.toml");
    fs::write(&config, "[store]\nexact_count_limit = 1\n").unwrap();

    let out = run(&[
        "--config",
        path(&config),
        "vm",
        &archive,
        "<http://ex.org/a> ?p ?o",
        "-l",
        "1",
    ])
    .await
    .unwrap();
    assert!(out.starts_with("# Total matches: "));
    assert!(out.lines().next().unwrap().ends_with("(estimated)"));

    let out = run(&[
        "--config",
        path(&config),
        "--exact-count-limit",
        "100",
        "vm",
        &archive,
        "<http://ex.org/a> ?p ?o",
        "-l",
        "1",
    ])
    .await
    .unwrap();
    assert!(out.starts_with("# Total matches: 2\n"));

    fs::write(&config, "[store]\npage_size = 0\n").unwrap();
    assert!(matches!(
        run(&["--config", path(&config), "metadata", &archive]).await,
        Err(StoreError::InvalidArgument(_))
    ));
}
