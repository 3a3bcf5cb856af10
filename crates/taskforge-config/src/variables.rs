//! Flat `KEY=VALUE` variable files used for `{name}` interpolation.

use std::collections::HashMap;
use std::path::Path;

/// Parse a variable file's contents into a flat key-value map.
///
/// Each line is split on the first `=`. Lines without an `=`, or whose
/// key is empty after trimming, are dropped with a warning. Later
/// duplicate keys overwrite earlier ones. Empty values are allowed.
pub fn parse(contents: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in contents.split('\n') {
        let Some((key, value)) = line.split_once('=') else {
            if !line.trim().is_empty() {
                tracing::warn!(line, "invalid variable entry, missing '='");
            }
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() {
            tracing::warn!(line, "invalid variable entry, empty key");
            continue;
        }
        vars.insert(key.to_string(), value.to_string());
    }
    vars
}

/// Load a variable file from disk. Returns an empty map if the file
/// is missing or unreadable; never errors.
pub fn load(path: impl AsRef<Path>) -> HashMap<String, String> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(contents) => parse(&contents),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "could not read variable file");
            HashMap::new()
        }
    }
}

/// Serialize a variable map as `KEY=VALUE\n` lines. Iteration order
/// is whatever the map's own iteration order happens to be.
pub fn serialize(vars: &HashMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in vars {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Write a variable map to disk as `KEY=VALUE` lines, creating the
/// file if needed and truncating any existing contents.
pub fn save(vars: &HashMap<String, String>, path: impl AsRef<Path>) -> std::io::Result<()> {
    std::fs::write(path, serialize(vars))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_first_equals_only() {
        let vars = parse("URL=https://host/a=b\n");
        assert_eq!(vars.get("URL").unwrap(), "https://host/a=b");
    }

    #[test]
    fn parse_trims_whitespace() {
        let vars = parse("  KEY  =  value  \n");
        assert_eq!(vars.get("KEY").unwrap(), "value");
    }

    #[test]
    fn parse_drops_lines_without_equals() {
        let vars = parse("no equals here\nKEY=value\n");
        assert_eq!(vars.len(), 1);
        assert!(vars.contains_key("KEY"));
    }

    #[test]
    fn parse_drops_empty_keys() {
        let vars = parse("=value\nKEY=value2\n");
        assert_eq!(vars.len(), 1);
        assert!(vars.contains_key("KEY"));
    }

    #[test]
    fn parse_allows_empty_values() {
        let vars = parse("KEY=\n");
        assert_eq!(vars.get("KEY").unwrap(), "");
    }

    #[test]
    fn parse_later_duplicate_overwrites_earlier() {
        let vars = parse("KEY=first\nKEY=second\n");
        assert_eq!(vars.get("KEY").unwrap(), "second");
    }

    #[test]
    fn load_missing_file_returns_empty_map() {
        let vars = load("/nonexistent/path/that/does/not/exist.properties");
        assert!(vars.is_empty());
    }

    #[test]
    fn round_trip_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vars.properties");

        let mut original = HashMap::new();
        original.insert("HOST".to_string(), "localhost".to_string());
        original.insert("PORT".to_string(), "8080".to_string());

        save(&original, &path).unwrap();
        let loaded = load(&path);

        assert_eq!(loaded, original);
    }
}
