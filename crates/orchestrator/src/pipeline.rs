//! Post-processing pipeline for decoded engine items.
//!
//! Three stages: validate (drop non-object items, fail on an empty batch),
//! dedupe by URL and title, then summarize content quality. The pipeline
//! never mutates item payloads; engines own their own schemas.

use anyhow::Result;
use serde_json::Value;
use shared::QualitySummary;
use std::collections::HashSet;
use tracing::debug;

/// Fields checked, in order, for an item's body text
const CONTENT_FIELDS: &[&str] = &["content", "text", "body"];

/// Fields checked, in order, for an item's URL
const URL_FIELDS: &[&str] = &["url", "link", "source_url"];

fn first_str<'a>(item: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields.iter().find_map(|f| item.get(*f).and_then(|v| v.as_str()))
}

/// Validate, dedupe, and summarize one batch of items.
pub fn process(items: Vec<Value>) -> Result<(Vec<Value>, QualitySummary)> {
    let valid: Vec<Value> = items.into_iter().filter(|i| i.is_object()).collect();
    if valid.is_empty() {
        anyhow::bail!("No valid items after validation");
    }
    let items_before_dedup = valid.len();

    // Dedupe on (url, title); items without either field are kept as-is
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut deduped = Vec::new();
    for item in valid {
        let url = first_str(&item, URL_FIELDS).unwrap_or_default().to_string();
        let title = first_str(&item, &["title"])
            .unwrap_or_default()
            .to_lowercase();

        if url.is_empty() && title.is_empty() {
            deduped.push(item);
            continue;
        }
        if seen.insert((url, title)) {
            deduped.push(item);
        }
    }

    let mut with_content = 0usize;
    let mut total_length = 0usize;
    for item in &deduped {
        let length = first_str(item, CONTENT_FIELDS).map(|c| c.len()).unwrap_or(0);
        if length > 0 {
            with_content += 1;
        }
        total_length += length;
    }

    let quality = QualitySummary {
        quality_score: with_content as f64 / deduped.len() as f64,
        average_content_length: total_length as f64 / deduped.len() as f64,
        items_before_dedup,
    };

    debug!(
        before = items_before_dedup,
        after = deduped.len(),
        quality = quality.quality_score,
        "Post-processing complete"
    );

    Ok((deduped, quality))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_batch_fails() {
        assert!(process(Vec::new()).is_err());
        assert!(process(vec![json!("scalar"), json!(5)]).is_err());
    }

    #[test]
    fn test_dedupe_by_url_and_title() {
        let items = vec![
            json!({"url": "https://e.com/a", "title": "A", "content": "x"}),
            json!({"url": "https://e.com/a", "title": "a", "content": "y"}),
            json!({"url": "https://e.com/b", "title": "A", "content": "z"}),
        ];
        let (deduped, quality) = process(items).unwrap();
        // Same URL + case-insensitive same title collapses
        assert_eq!(deduped.len(), 2);
        assert_eq!(quality.items_before_dedup, 3);
    }

    #[test]
    fn test_items_without_identity_are_kept() {
        let items = vec![json!({"payload": 1}), json!({"payload": 2})];
        let (deduped, _) = process(items).unwrap();
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn test_quality_summary() {
        let items = vec![
            json!({"url": "a", "title": "1", "content": "0123456789"}),
            json!({"url": "b", "title": "2", "content": ""}),
            json!({"url": "c", "title": "3", "text": "01234"}),
            json!({"url": "d", "title": "4"}),
        ];
        let (_, quality) = process(items).unwrap();
        assert!((quality.quality_score - 0.5).abs() < 1e-9);
        assert!((quality.average_content_length - 15.0 / 4.0).abs() < 1e-9);
    }
}
