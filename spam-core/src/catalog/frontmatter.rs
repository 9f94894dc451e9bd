//! Frontmatter header parsing
//!
//! Component definitions start with a small `key: value` block fenced by
//! `---` lines. Only flat string values are understood; anything else in the
//! block is skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

const DELIMITER: &str = "---";

static KEY_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w[\w\-]*)\s*:\s*(.+)$").expect("valid frontmatter regex"));

/// Parsed frontmatter fields.
///
/// `description` is always present, defaulting to an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frontmatter {
    fields: BTreeMap<String, String>,
}

impl Default for Frontmatter {
    fn default() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("description".to_string(), String::new());
        Self { fields }
    }
}

impl Frontmatter {
    /// Parse frontmatter from file text. Never fails.
    pub fn parse(text: &str) -> Self {
        let mut fm = Self::default();

        let Some(rest) = text.strip_prefix(DELIMITER) else {
            return fm;
        };
        let Some(end) = rest.find(DELIMITER) else {
            return fm;
        };

        for line in rest[..end].trim().lines() {
            let Some(caps) = KEY_VALUE.captures(line) else {
                continue;
            };
            let key = caps[1].trim().to_string();
            let value = unquote(caps[2].trim()).to_string();
            fm.fields.insert(key, value);
        }

        fm
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Non-empty value for `key`, if any.
    pub fn non_empty(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).map(str::to_string)
    }
}

/// Read and parse a file's frontmatter; unreadable files yield the default.
pub fn read_frontmatter(path: &Path) -> Frontmatter {
    match std::fs::read(path) {
        Ok(bytes) => Frontmatter::parse(&String::from_utf8_lossy(&bytes)),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Unreadable definition file");
            Frontmatter::default()
        }
    }
}

/// Strip one layer of matching surrounding quotes.
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_flat_block() {
        let text = "---\nname: deploy\ndescription: \"Ship it\"\nmodel: 'haiku'\n---\n# Body\n";
        let fm = Frontmatter::parse(text);

        assert_eq!(fm.get("name"), Some("deploy"));
        assert_eq!(fm.get("description").unwrap_or_default(), "Ship it");
        assert_eq!(fm.get("model"), Some("haiku"));
    }

    #[test]
    fn test_missing_opening_delimiter() {
        let fm = Frontmatter::parse("# Title\n---\ndescription: nope\n---\n");
        assert_eq!(fm, Frontmatter::default());
        assert_eq!(fm.get("description").unwrap_or_default(), "");
    }

    #[test]
    fn test_unterminated_block() {
        let fm = Frontmatter::parse("---\ndescription: never closed\n");
        assert_eq!(fm, Frontmatter::default());
    }

    #[test]
    fn test_skips_malformed_lines() {
        let text = "---\n- list item\nallowed-tools: Bash, Read\n: orphan\nempty:\n---\n";
        let fm = Frontmatter::parse(text);

        assert_eq!(fm.get("allowed-tools"), Some("Bash, Read"));
        assert_eq!(fm.get("empty"), None);
        assert_eq!(fm.fields.len(), 2);
    }

    #[test]
    fn test_unquotes_single_layer_only() {
        let fm = Frontmatter::parse("---\ndescription: \"'nested'\"\n---\n");
        assert_eq!(fm.get("description").unwrap_or_default(), "'nested'");

        let fm = Frontmatter::parse("---\ndescription: \"unbalanced\n---\n");
        assert_eq!(fm.get("description").unwrap_or_default(), "\"unbalanced");
    }

    #[test]
    fn test_read_missing_file() {
        let fm = read_frontmatter(Path::new("/nonexistent/SKILL.md"));
        assert_eq!(fm.get("description").unwrap_or_default(), "");
    }
}
