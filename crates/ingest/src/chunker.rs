use crate::chunk::Chunk;
use serde::{Deserialize, Serialize};

/// Form feed, emitted between pages by PDF text extraction
pub const PAGE_BREAK: char = '\u{000C}';

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    pub target_tokens_min: usize,
    pub target_tokens_max: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_tokens_min: 300,
            target_tokens_max: 900,
        }
    }
}

#[derive(Debug, Clone)]
struct Paragraph {
    text: String,
    page: usize,
    headings: Vec<String>,
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split a document into ordered chunks. Paragraph boundaries are never broken;
    /// a heading change closes the current chunk once it holds at least the minimum size.
    pub fn chunk_text(&self, text: &str) -> Vec<Chunk> {
        let paragraphs = self.split_by_paragraphs(text);
        let paged = text.contains(PAGE_BREAK);

        let mut chunks = Vec::new();
        let mut buffer: Vec<Paragraph> = Vec::new();
        let mut buffer_tokens = 0;

        for para in paragraphs {
            let para_tokens = self.estimate_tokens(&para.text);
            let heading_changed = buffer
                .first()
                .is_some_and(|first| first.headings != para.headings);

            let overflow = buffer_tokens + para_tokens > self.config.target_tokens_max;
            let section_end = heading_changed && buffer_tokens >= self.config.target_tokens_min;

            if !buffer.is_empty() && (overflow || section_end) {
                chunks.push(Self::flush(chunks.len(), &buffer, paged));
                buffer.clear();
                buffer_tokens = 0;
            }

            buffer_tokens += para_tokens;
            buffer.push(para);
        }

        if !buffer.is_empty() {
            chunks.push(Self::flush(chunks.len(), &buffer, paged));
        }

        chunks
    }

    fn flush(ordinal: usize, buffer: &[Paragraph], paged: bool) -> Chunk {
        let text = buffer
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let pages = if paged {
            let first = buffer.first().map(|p| p.page).unwrap_or(1);
            let last = buffer.last().map(|p| p.page).unwrap_or(first);
            Some(page_label(first, last))
        } else {
            None
        };

        let headings = buffer
            .first()
            .map(|p| p.headings.clone())
            .unwrap_or_default();

        Chunk::new(ordinal, text, &headings, pages)
    }

    fn split_by_paragraphs(&self, text: &str) -> Vec<Paragraph> {
        let mut paragraphs = Vec::new();
        // (level, title) of the headings currently in effect
        let mut trail: Vec<(usize, String)> = Vec::new();

        for (page_idx, page) in text.split(PAGE_BREAK).enumerate() {
            let page_no = page_idx + 1;
            let mut current = String::new();

            for line in page.lines() {
                let trimmed = line.trim();

                if trimmed.is_empty() {
                    Self::push_paragraph(&mut paragraphs, &mut current, page_no, &trail);
                    continue;
                }

                if let Some((level, title)) = parse_heading(trimmed) {
                    Self::push_paragraph(&mut paragraphs, &mut current, page_no, &trail);
                    trail.retain(|(l, _)| *l < level);
                    trail.push((level, title.to_string()));
                    continue;
                }

                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(trimmed);
            }

            Self::push_paragraph(&mut paragraphs, &mut current, page_no, &trail);
        }

        paragraphs
    }

    fn push_paragraph(
        paragraphs: &mut Vec<Paragraph>,
        current: &mut String,
        page: usize,
        trail: &[(usize, String)],
    ) {
        if current.trim().is_empty() {
            current.clear();
            return;
        }
        paragraphs.push(Paragraph {
            text: std::mem::take(current),
            page,
            headings: trail.iter().map(|(_, t)| t.clone()).collect(),
        });
    }

    fn estimate_tokens(&self, text: &str) -> usize {
        let word_count = text.split_whitespace().count();
        (word_count as f64 * 1.3) as usize
    }
}

/// Markdown-style heading: one or more `#` followed by a title
fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 {
        return None;
    }
    let title = line[level..].trim();
    if title.is_empty() {
        return None;
    }
    Some((level, title))
}

fn page_label(first: usize, last: usize) -> String {
    if first == last {
        format!("p. {}", first)
    } else {
        format!("pp. {}–{}", first, last)
    }
}
