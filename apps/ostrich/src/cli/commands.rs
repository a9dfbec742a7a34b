//! # CLI Command Implementations
//!
//! Each command opens the archive, runs one operation on the blocking pool
//! and writes the outcome to the given writer. Query commands are cancelled
//! cooperatively on Ctrl-C.

use super::Page;
use ostrich_core::formats::{format_term, parse_term};
use ostrich_core::{
    CancelHandle, Ingestor, OstrichStore, PatchElement, SearchResult, StoreError, StoreOptions, TermTriple,
    TriplePattern, Version, parse_delta_line,
};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// HELPERS
// =============================================================================

fn io_err(e: std::io::Error) -> StoreError {
    StoreError::StorageFailure(format!("Cannot write output: {}", e))
}

fn join_err(e: tokio::task::JoinError) -> StoreError {
    StoreError::StorageFailure(format!("Worker task failed: {}", e))
}

fn json_err(e: serde_json::Error) -> StoreError {
    StoreError::Serialization(e.to_string())
}

fn open_store(
    archive: &Path,
    mut options: StoreOptions,
    read_only: bool,
) -> Result<Arc<OstrichStore>, StoreError> {
    options.read_only = read_only;
    Ok(Arc::new(OstrichStore::open(archive, options)?))
}

/// Run `work` on the blocking pool.
async fn blocking<T, F>(store: &Arc<OstrichStore>, work: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&OstrichStore) -> Result<T, StoreError> + Send + 'static,
{
    let worker = Arc::clone(store);
    tokio::task::spawn_blocking(move || work(&worker))
        .await
        .map_err(join_err)?
}

/// Run a query on the blocking pool, cancelling it on Ctrl-C.
async fn run_query<T, F>(store: &Arc<OstrichStore>, query: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&OstrichStore, &CancelHandle) -> Result<T, StoreError> + Send + 'static,
{
    let cancel = CancelHandle::new();
    let worker = Arc::clone(store);
    let token = cancel.clone();
    let mut task = tokio::task::spawn_blocking(move || query(&worker, &token));

    tokio::select! {
        joined = &mut task => joined.map_err(join_err)?,
        signal = tokio::signal::ctrl_c() => {
            if signal.is_ok() {
                tracing::warn!("interrupted, cancelling query");
                cancel.cancel();
            }
            task.await.map_err(join_err)?
        }
    }
}

/// Parse a command-line pattern: subject and predicate are single tokens,
/// the object is the rest of the line so literals may contain spaces.
///
/// An empty pattern matches everything.
pub fn parse_pattern(query: &str) -> Result<TriplePattern, StoreError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(TriplePattern::any());
    }
    let (subject, rest) = split_token(query);
    let (predicate, object) = split_token(rest);
    if predicate.is_empty() || object.is_empty() {
        return Err(StoreError::InvalidArgument(format!(
            "pattern '{}' needs three terms",
            query
        )));
    }
    Ok(TriplePattern {
        subject: pattern_term(subject),
        predicate: pattern_term(predicate),
        object: pattern_term(object),
    })
}

fn split_token(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn pattern_term(token: &str) -> Option<String> {
    if token.starts_with('?') {
        None
    } else {
        Some(parse_term(token))
    }
}

fn write_total<T, W: Write>(result: &SearchResult<T>, out: &mut W) -> Result<(), StoreError> {
    writeln!(
        out,
        "# Total matches: {}{}",
        result.total_count,
        if result.has_exact_count { "" } else { " (estimated)" }
    )
    .map_err(io_err)
}

fn write_json<T: serde::Serialize, W: Write>(value: &T, out: &mut W) -> Result<(), StoreError> {
    let text = serde_json::to_string_pretty(value).map_err(json_err)?;
    writeln!(out, "{}", text).map_err(io_err)
}

fn plain_triple(triple: &TermTriple) -> String {
    format!(
        "{} {} {}",
        format_term(&triple.subject),
        format_term(&triple.predicate),
        format_term(&triple.object)
    )
}

// =============================================================================
// QUERY COMMANDS
// =============================================================================

/// Query one version.
pub async fn cmd_vm<W: Write>(
    archive: &Path,
    options: StoreOptions,
    json_mode: bool,
    pattern: &str,
    version: Option<Version>,
    page: Page,
    out: &mut W,
) -> Result<(), StoreError> {
    let pattern = parse_pattern(pattern)?;
    let store = open_store(archive, options, true)?;
    let result = run_query(&store, move |s, cancel| {
        s.search_version_materialized_with_cancel(&pattern, page.offset, page.limit, version, cancel)
    })
    .await?;

    if json_mode {
        return write_json(&result, out);
    }
    write_total(&result, out)?;
    for triple in &result.items {
        writeln!(out, "{} .", plain_triple(triple)).map_err(io_err)?;
    }
    Ok(())
}

/// Query the changes between two versions.
pub async fn cmd_dm<W: Write>(
    archive: &Path,
    options: StoreOptions,
    json_mode: bool,
    pattern: &str,
    start: Version,
    end: Option<Version>,
    page: Page,
    out: &mut W,
) -> Result<(), StoreError> {
    let pattern = parse_pattern(pattern)?;
    let store = open_store(archive, options, true)?;
    let result = run_query(&store, move |s, cancel| {
        s.search_delta_materialized_with_cancel(&pattern, page.offset, page.limit, start, end, cancel)
    })
    .await?;

    if json_mode {
        return write_json(&result, out);
    }
    write_total(&result, out)?;
    for delta in &result.items {
        let sign = if delta.addition { '+' } else { '-' };
        writeln!(out, "{} {}", sign, plain_triple(&delta.triple)).map_err(io_err)?;
    }
    Ok(())
}

/// Query every version of each matching triple.
pub async fn cmd_v<W: Write>(
    archive: &Path,
    options: StoreOptions,
    json_mode: bool,
    pattern: &str,
    page: Page,
    out: &mut W,
) -> Result<(), StoreError> {
    let pattern = parse_pattern(pattern)?;
    let store = open_store(archive, options, true)?;
    let result = run_query(&store, move |s, cancel| {
        s.search_version_with_cancel(&pattern, page.offset, page.limit, cancel)
    })
    .await?;

    if json_mode {
        return write_json(&result, out);
    }
    write_total(&result, out)?;
    for entry in &result.items {
        let versions = serde_json::to_string(&entry.versions).map_err(json_err)?;
        writeln!(out, "{}", plain_triple(&entry.triple)).map_err(io_err)?;
        writeln!(out, "    >> {}", versions).map_err(io_err)?;
    }
    Ok(())
}

// =============================================================================
// METADATA COMMAND
// =============================================================================

/// Show archive statistics.
pub async fn cmd_metadata<W: Write>(
    archive: &Path,
    options: StoreOptions,
    json_mode: bool,
    out: &mut W,
) -> Result<(), StoreError> {
    let store = open_store(archive, options, true)?;
    let metadata = blocking(&store, |s| s.metadata()).await?;

    if json_mode {
        let output = serde_json::json!({
            "archive": archive.to_string_lossy(),
            "metadata": metadata,
        });
        return write_json(&output, out);
    }

    let estimated = if metadata.distinct_triples.has_exact_count {
        ""
    } else {
        " (estimated)"
    };
    let dict = metadata.dictionary;
    writeln!(out, "OSTRICH store: {}", archive.display()).map_err(io_err)?;
    writeln!(out, "  Versions: {}", metadata.max_version).map_err(io_err)?;
    writeln!(
        out,
        "  Unique triples: {}{}",
        metadata.distinct_triples.total_count, estimated
    )
    .map_err(io_err)?;
    writeln!(out, "  Triples in snapshot: {}", metadata.snapshot_triples).map_err(io_err)?;
    writeln!(out, "  Triples in last version: {}", metadata.latest_triples).map_err(io_err)?;
    writeln!(
        out,
        "  Dictionary: {} shared, {} subjects, {} predicates, {} objects, {} added by patches",
        dict.shared, dict.subjects, dict.predicates, dict.objects, dict.patch_terms
    )
    .map_err(io_err)?;
    for (version, stats) in metadata.versions.iter().enumerate() {
        writeln!(
            out,
            "  v{}: +{} -{} = {} triples, {} new terms",
            version, stats.additions, stats.deletions, stats.live_triples, stats.new_terms
        )
        .map_err(io_err)?;
    }
    Ok(())
}

// =============================================================================
// WRITE COMMANDS
// =============================================================================

/// Read a patch file of `+`/`-` prefixed N-Triples lines.
pub fn read_patch_file(path: &Path) -> Result<Vec<PatchElement>, StoreError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        StoreError::InvalidArgument(format!("Cannot read '{}': {}", path.display(), e))
    })?;
    let mut elements = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if let Some(element) = parse_delta_line(line, index + 1)? {
            elements.push(element);
        }
    }
    Ok(elements)
}

/// Append a patch file as one version.
pub async fn cmd_append<W: Write>(
    archive: &Path,
    options: StoreOptions,
    json_mode: bool,
    file: &Path,
    version: Option<Version>,
    out: &mut W,
) -> Result<(), StoreError> {
    let elements = read_patch_file(file)?;
    let store = open_store(archive, options, false)?;
    let (inserted, committed) = blocking(&store, move |s| {
        let inserted = s.append(elements, version)?;
        Ok((inserted, s.max_version()?))
    })
    .await?;

    if json_mode {
        let output = serde_json::json!({
            "version": committed,
            "elements": inserted,
        });
        return write_json(&output, out);
    }
    writeln!(out, "Appended {} elements as version {}", inserted, committed).map_err(io_err)
}

/// Import a directory of version sub-directories.
pub async fn cmd_ingest<W: Write>(
    archive: &Path,
    options: StoreOptions,
    json_mode: bool,
    dir: &Path,
    out: &mut W,
) -> Result<(), StoreError> {
    let store = open_store(archive, options, false)?;
    let dir = dir.to_path_buf();
    let report = blocking(&store, move |s| Ingestor::ingest_directory(s, &dir)).await?;

    if json_mode {
        let versions: Vec<serde_json::Value> = report
            .versions
            .iter()
            .map(|v| {
                serde_json::json!({
                    "version": v.version,
                    "elements": v.elements,
                    "skipped": v.skipped,
                    "duration_ms": v.duration.as_millis() as u64,
                })
            })
            .collect();
        return write_json(&serde_json::json!({ "versions": versions }), out);
    }
    for v in &report.versions {
        if v.skipped {
            writeln!(
                out,
                "version {}: already stored ({} elements), skipped",
                v.version, v.elements
            )
            .map_err(io_err)?;
        } else {
            writeln!(
                out,
                "version {}: {} elements in {} ms",
                v.version,
                v.elements,
                v.duration.as_millis()
            )
            .map_err(io_err)?;
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_with_variables_and_brackets() {
        let pattern = parse_pattern("?s <http://ex.org/p> ?o").expect("parse");
        assert_eq!(pattern.subject, None);
        assert_eq!(pattern.predicate.as_deref(), Some("http://ex.org/p"));
        assert_eq!(pattern.object, None);
    }

    #[test]
    fn pattern_object_keeps_spaces_and_unbrackets_datatype() {
        let pattern = parse_pattern("a  b   \"two words\"^^<http://ex.org/t>").expect("parse");
        assert_eq!(pattern.subject.as_deref(), Some("a"));
        assert_eq!(pattern.predicate.as_deref(), Some("b"));
        assert_eq!(
            pattern.object.as_deref(),
            Some("\"two words\"^^http://ex.org/t")
        );
    }

    #[test]
    fn empty_pattern_is_wildcard_and_short_pattern_fails() {
        assert!(parse_pattern("   ").expect("parse").is_wildcard());
        assert!(matches!(
            parse_pattern("a b"),
            Err(StoreError::InvalidArgument(_))
        ));
    }
}
