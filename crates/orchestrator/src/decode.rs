//! Engine result decoding.
//!
//! External engines are loosely coupled: some print JSON to stdout, some
//! drop result files into a directory. Decoding tries each strategy in a
//! fixed order and takes the first that yields items. An engine that exits
//! zero but produces nothing decodable is a failed job.

use serde_json::Value;
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;

/// Top-level keys an engine payload may nest its item list under
pub const RESULT_KEYS: &[&str] = &["pages", "posts", "products", "threads", "items"];

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("engine produced no decodable output")]
    NoDecodableOutput,
    #[error("failed to read results directory {dir}")]
    ResultsDirUnreadable {
        dir: String,
        #[source]
        source: std::io::Error,
    },
}

/// Flatten one decoded payload into items.
///
/// Arrays are item lists as-is; objects are searched for a known list key,
/// and otherwise count as a single item. Scalars decode to nothing.
pub fn items_from_payload(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Object(map) => {
            for key in RESULT_KEYS {
                if let Some(Value::Array(items)) = map.get(*key) {
                    return items.clone();
                }
            }
            vec![Value::Object(map)]
        }
        _ => Vec::new(),
    }
}

/// Decode stdout: a single JSON document first, then JSON-lines.
pub fn decode_stdout(stdout: &str) -> Option<Vec<Value>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(payload) = serde_json::from_str::<Value>(trimmed) {
        let items = items_from_payload(payload);
        if !items.is_empty() {
            return Some(items);
        }
    }

    let mut items = Vec::new();
    for line in trimmed.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Ok(payload) = serde_json::from_str::<Value>(line) {
            items.extend(items_from_payload(payload));
        }
    }

    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Decode the newest .json file in the results directory, if any.
pub fn decode_results_dir(dir: &Path) -> Result<Option<Vec<Value>>, DecodeError> {
    if !dir.exists() {
        return Ok(None);
    }

    let entries = std::fs::read_dir(dir).map_err(|source| DecodeError::ResultsDirUnreadable {
        dir: dir.display().to_string(),
        source,
    })?;

    let mut newest: Option<(SystemTime, std::path::PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
            newest = Some((modified, path));
        }
    }

    let (_, path) = match newest {
        Some(n) => n,
        None => return Ok(None),
    };

    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Result file unreadable");
            return Ok(None);
        }
    };
    let payload = match serde_json::from_str::<Value>(&content) {
        Ok(p) => p,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Result file is not JSON");
            return Ok(None);
        }
    };

    debug!(path = %path.display(), "Decoded result file");
    let items = items_from_payload(payload);
    if items.is_empty() {
        Ok(None)
    } else {
        Ok(Some(items))
    }
}

/// Decode an engine's output: stdout first, then the results directory.
pub fn decode_output(stdout: &str, results_dir: &Path) -> Result<Vec<Value>, DecodeError> {
    if let Some(items) = decode_stdout(stdout) {
        debug!(items = items.len(), "Decoded items from stdout");
        return Ok(items);
    }

    if let Some(items) = decode_results_dir(results_dir)? {
        debug!(items = items.len(), "Decoded items from results directory");
        return Ok(items);
    }

    Err(DecodeError::NoDecodableOutput)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_payload_array() {
        let items = items_from_payload(json!([{"url": "a"}, {"url": "b"}]));
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_payload_nested_under_known_key() {
        for key in RESULT_KEYS {
            let items = items_from_payload(json!({ *key: [{"url": "a"}] }));
            assert_eq!(items.len(), 1, "key {}", key);
        }
    }

    #[test]
    fn test_payload_bare_object_is_single_item() {
        let items = items_from_payload(json!({"url": "a", "title": "t"}));
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_payload_scalar_is_nothing() {
        assert!(items_from_payload(json!("done")).is_empty());
        assert!(items_from_payload(json!(42)).is_empty());
    }

    #[test]
    fn test_decode_stdout_json_lines() {
        let stdout = "{\"url\": \"a\"}\nnot json\n{\"url\": \"b\"}\n";
        let items = decode_stdout(stdout).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_decode_stdout_single_document() {
        let items = decode_stdout(r#"{"pages": [{"url": "a"}, {"url": "b"}]}"#).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_decode_stdout_garbage_is_none() {
        assert!(decode_stdout("").is_none());
        assert!(decode_stdout("progress: 50%\ndone\n").is_none());
    }

    #[test]
    fn test_decode_results_dir_picks_newest() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("old.json"), r#"[{"url": "old"}]"#)?;
        // Filesystem mtime resolution can be coarse
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(dir.path().join("new.json"), r#"[{"url": "new"}]"#)?;
        std::fs::write(dir.path().join("notes.txt"), "ignored")?;

        let items = decode_results_dir(dir.path())?.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["url"], "new");
        Ok(())
    }

    #[test]
    fn test_decode_output_order_and_failure() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("r.json"), r#"[{"url": "file"}]"#)?;

        // stdout wins when both are decodable
        let items = decode_output(r#"[{"url": "stdout"}]"#, dir.path())?;
        assert_eq!(items[0]["url"], "stdout");

        // falls through to the results dir
        let items = decode_output("no json here", dir.path())?;
        assert_eq!(items[0]["url"], "file");

        // nothing decodable anywhere
        let empty = TempDir::new()?;
        let err = decode_output("", empty.path()).unwrap_err();
        assert!(matches!(err, DecodeError::NoDecodableOutput));
        Ok(())
    }
}
