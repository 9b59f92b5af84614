use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Inline locator such as `[para 12]`, `[paras 3-4]`, `[p 2]`, `[p. 2]`, `[pp. 1–3]`, `[page 7]`
static SOURCE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*(?:paras?|paragraphs?|pp?|pages?)\.?\s*\d+").expect("valid regex")
});

/// Identity key for a name: case-insensitive, whitespace collapsed
pub fn normalize_key(name: &str) -> String {
    WHITESPACE
        .replace_all(name.trim(), " ")
        .to_lowercase()
}

/// True when `text` carries an inline `[para n]`/`[p n]` style locator
pub fn has_source_marker(text: &str) -> bool {
    SOURCE_MARKER.is_match(text)
}

pub struct EntityNormalizer {
    /// Maps normalized name -> first-seen spelling
    aliases: HashMap<String, String>,
}

impl EntityNormalizer {
    pub fn new() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Remember `name`; returns false if an equivalent name was already seen
    pub fn insert(&mut self, name: &str) -> bool {
        let key = normalize_key(name);
        if self.aliases.contains_key(&key) {
            return false;
        }
        self.aliases.insert(key, name.trim().to_string());
        true
    }
}

impl Default for EntityNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop later duplicates (by normalized key) and blank entries, keeping first-seen
/// order and spelling. Returns the number of entries removed.
pub fn dedup_by_key(items: &mut Vec<String>) -> usize {
    let before = items.len();
    let mut normalizer = EntityNormalizer::new();
    items.retain(|item| !item.trim().is_empty() && normalizer.insert(item));
    before - items.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_key("Kwame  Anokye"), "kwame anokye");
        assert_eq!(normalize_key("  KWAME\tAnokye \n"), "kwame anokye");
    }

    #[test]
    fn test_alias_resolution() {
        let mut normalizer = EntityNormalizer::new();

        assert!(normalizer.insert("Acheamfour Group Ltd"));
        assert!(!normalizer.insert("ACHEAMFOUR  group ltd"));
        assert!(normalizer.insert("Acheamfour Holdings"));
    }

    #[test]
    fn dedup_keeps_first_spelling_and_order() {
        let mut names = vec![
            "Pwamang JSC".to_string(),
            "Anokye".to_string(),
            "pwamang  jsc".to_string(),
            " ".to_string(),
            "ANOKYE".to_string(),
            "Lands Commission".to_string(),
        ];
        let removed = dedup_by_key(&mut names);

        assert_eq!(removed, 3);
        assert_eq!(names, vec!["Pwamang JSC", "Anokye", "Lands Commission"]);
    }

    #[test]
    fn source_markers() {
        assert!(has_source_marker("The land was sold [para 3]"));
        assert!(has_source_marker("Quoted at [p. 12]"));
        assert!(has_source_marker("See [pp. 1–3]"));
        assert!(has_source_marker("[Paras 4-6] discuss estoppel"));
        assert!(!has_source_marker("The land was sold"));
        assert!(!has_source_marker("[para/page]"));
    }
}
