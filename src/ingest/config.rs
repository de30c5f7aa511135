// src/ingest/config.rs
//! Query-key list loading (topics / ticker symbols).
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

/// Load keys from a file. Supports TOML (`keys = [...]`) or a JSON array.
pub fn load_keys_from(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading query keys from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_keys(&content, ext.as_str())
}

/// Comma-separated list, e.g. `QUERY_KEYS="bitcoin, nasdaq"`.
pub fn parse_key_list(s: &str) -> Vec<String> {
    clean_list(s.split(',').map(str::to_string))
}

fn parse_keys(s: &str, hint_ext: &str) -> Result<Vec<String>> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("keys");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported query key file format"))
}

fn parse_toml(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct TomlKeys {
        keys: Vec<String>,
    }
    let v: TomlKeys = toml::from_str(s)?;
    Ok(clean_list(v.keys))
}

fn parse_json(s: &str) -> Result<Vec<String>> {
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim, drop empties, drop duplicates; first occurrence wins so the
/// configured fetch order is kept.
fn clean_list<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|k| k == t) {
            out.push(t.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_trim_and_formats_work() {
        let toml = r#"keys = [" bitcoin ", "", "nasdaq", "bitcoin"]"#;
        let json = r#"["PETR4", "  VALE3  ", ""]"#;
        assert_eq!(
            parse_toml(toml).unwrap(),
            vec!["bitcoin".to_string(), "nasdaq".to_string()]
        );
        assert_eq!(
            parse_json(json).unwrap(),
            vec!["PETR4".to_string(), "VALE3".to_string()]
        );
    }

    #[test]
    fn comma_list_keeps_order() {
        assert_eq!(
            parse_key_list("dow jones, S&P 500,,dow jones , inflation"),
            vec![
                "dow jones".to_string(),
                "S&P 500".to_string(),
                "inflation".to_string()
            ]
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_keys("not a list", "txt").is_err());
    }
}
