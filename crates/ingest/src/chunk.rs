use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the chunk within its document, starting at 0
    pub ordinal: usize,
    pub text: String,
    /// Text with the heading trail prepended, used for prompting
    pub contextualized: String,
    pub pages: Option<String>,
}

impl Chunk {
    pub fn new(ordinal: usize, text: String, headings: &[String], pages: Option<String>) -> Self {
        let contextualized = Self::contextualize(headings, &text);

        Self {
            ordinal,
            text,
            contextualized,
            pages,
        }
    }

    /// Page/paragraph locator, or a synthetic `chunk-{i}` when the source had no page metadata
    pub fn locator(&self) -> String {
        match self.pages.as_deref() {
            Some(pages) if !pages.trim().is_empty() => pages.to_string(),
            _ => format!("chunk-{}", self.ordinal),
        }
    }

    fn contextualize(headings: &[String], text: &str) -> String {
        if headings.is_empty() {
            return text.to_string();
        }
        format!("{}\n{}", headings.join("\n"), text)
    }

    /// Estimate token count (rough: 1.3 tokens per word)
    pub fn estimated_tokens(&self) -> usize {
        let word_count = self.contextualized.split_whitespace().count();
        (word_count as f64 * 1.3) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_falls_back_to_ordinal() {
        let chunk = Chunk::new(7, "text".to_string(), &[], None);
        assert_eq!(chunk.locator(), "chunk-7");

        let blank = Chunk::new(2, "text".to_string(), &[], Some("  ".to_string()));
        assert_eq!(blank.locator(), "chunk-2");

        let paged = Chunk::new(0, "text".to_string(), &[], Some("pp. 1–3".to_string()));
        assert_eq!(paged.locator(), "pp. 1–3");
    }

    #[test]
    fn contextualized_text_carries_headings() {
        let headings = vec!["JUDGMENT".to_string(), "Background".to_string()];
        let chunk = Chunk::new(0, "The appellant sued.".to_string(), &headings, None);

        assert_eq!(chunk.contextualized, "JUDGMENT\nBackground\nThe appellant sued.");
        assert_eq!(chunk.text, "The appellant sued.");
    }
}
