//! Minimal persistent cookie jar.
//!
//! One `name=value` pair per line; attributes are not retained. Malformed
//! lines are ignored on read so a hand-edited or partially written jar never
//! breaks a transfer.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Reads the jar at `path` into `name=value` pairs ready to join into a
/// `Cookie` header. A missing jar is an empty jar.
pub(crate) fn load(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read cookie file {}", path.display()))?;
    Ok(text
        .lines()
        .filter_map(parse_line)
        .map(|(name, value)| format!("{name}={value}"))
        .collect())
}

/// Merges `Set-Cookie` response values over the existing jar at `path` and
/// rewrites it. Later cookies win on name collision.
pub(crate) fn store(path: &Path, set_cookies: &[String]) -> Result<()> {
    let mut jar: BTreeMap<String, String> = BTreeMap::new();
    if path.exists() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read cookie jar {}", path.display()))?;
        for line in text.lines() {
            if let Some((name, value)) = parse_line(line) {
                jar.insert(name, value);
            }
        }
    }
    for raw in set_cookies {
        // Only the leading name=value pair matters; attributes are dropped.
        let pair = raw.split(';').next().unwrap_or_default();
        if let Some((name, value)) = pair.split_once('=') {
            jar.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
    let mut text = String::new();
    for (name, value) in &jar {
        text.push_str(name);
        text.push('=');
        text.push_str(value);
        text.push('\n');
    }
    fs::write(path, text).with_context(|| format!("failed to write cookie jar {}", path.display()))
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (name, value) = line.split_once('=')?;
    Some((name.trim().to_string(), value.trim().to_string()))
}
