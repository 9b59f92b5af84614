//! Prompt builders for every LLM call in the pipeline.
//!
//! All builders are pure: the same arguments always produce the same bytes,
//! which is what lets responses be cached by prompt hash.

/// Maximum list length every schema asks for
pub const MAX_LIST_ITEMS: usize = 20;

/// Exact answer the question-answering prompt asks for when the case data is silent
pub const NOT_FOUND_ANSWER: &str = "Not found in the provided case data.";

/// Render a value as a JSON string literal so ids containing quotes stay valid JSON
fn json_literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

pub fn build_chunk_extraction_prompt(data: &str, case_id: &str, pages: &str) -> String {
    format!(
        r#"You are a judicial law clerk. Extract only what is present in the text. If unknown, use null or [].
Quote and cite paragraph/page numbers whenever you can. Never invent facts.

Output strict JSON with this schema:
{{
  "case_id": {case_id},
  "pages": {pages},
  "chunk_summary": "3–5 sentence summary of this chunk only.",
  "facts": ["short fact … [para x]"],
  "procedural_history": ["event … [para/page]"],
  "issues": ["legal question …"],
  "holdings": ["answer to issue …"],
  "rules": ["statute/case rule …"],
  "reasoning": ["court’s reasoning …"],
  "orders": ["order/disposition …"],
  "parties": {{"plaintiffs": [], "defendants": [], "judges": []}},
  "citations": ["case/statute citation …"],
  "entities": ["person/org/place …"],
  "timeline": [{{"date":"YYYY-MM-DD","event":"…","source":"[para/page]"}}],
  "quotes": [{{"text":"exact quote", "source":"[para/page]"}}],
  "confidence": 0.0
}}

Constraints:
- Be extractive; prefer quotes with [para n] or [p n].
- Keep lists concise (<= {max} items). No commentary outside JSON.

Text:
{data}"#,
        case_id = json_literal(case_id),
        pages = json_literal(pages),
        max = MAX_LIST_ITEMS,
        data = data.trim(),
    )
}

pub fn build_case_synthesis_prompt(extracted_chunks_json: &str, case_id: &str) -> String {
    format!(
        r#"You are preparing a law-report entry. Merge multiple per-chunk JSON records for the same case.

Produce a single strict JSON object with:
{{
  "case_id": {case_id},
  "headnote": "150–250 words; who/what/why/how/holding; neutral; no fluff.",
  "parties": {{"plaintiffs": [], "defendants": [], "judges": []}},
  "facts": ["…"],
  "procedural_history": ["…"],
  "issues": ["…"],
  "holdings": ["…"],
  "rules": ["…"],
  "reasoning": ["…"],
  "orders": ["…"],
  "citations": ["…"],
  "entities": ["…"],
  "timeline": [{{"date":"YYYY-MM-DD","event":"…","source":"[para/page]"}}],
  "key_quotes": [{{"text":"…","source":"[para/page]"}}],
  "disposition": "e.g., appeal dismissed; costs …",
  "summary_irac": {{
    "issue": ["…"], "rule": ["…"], "analysis": ["…"], "conclusion": ["…"]
  }}
}}

Requirements:
- Deduplicate and reconcile names; sort timeline chronologically (YYYY-MM-DD, unknown dates last).
- Keep only facts present in the chunks; include sources like [para n] or page ranges.
- Keep lists concise (<= {max} items). No extra commentary outside JSON.

Chunks:
{chunks}"#,
        case_id = json_literal(case_id),
        max = MAX_LIST_ITEMS,
        chunks = extracted_chunks_json.trim(),
    )
}

pub fn build_qa_prompt(structured_case_json: &str, n: usize) -> String {
    format!(
        r#"Create {n} diverse, short Q&A pairs strictly grounded in the structured case JSON.
Mix: facts, procedure, issues, holdings, rules, orders, timeline. Include a [source] like [para n] when possible.

Output strict JSON array:
[{{"question":"…","answer":"…","source":"[para/page]"}}]

Case:
{case}"#,
        n = n,
        case = structured_case_json.trim(),
    )
}

pub fn build_answer_prompt(question: &str, structured_case_json: &str) -> String {
    format!(
        r#"You are a judicial law clerk. Answer the question strictly from the structured case JSON.
If the answer is not present, reply exactly: "{not_found}"

Include supporting quotes with [para/page] when available.

Output strict JSON:
{{
  "answer": "...",
  "support": ["exact quote … [para/page]"],
  "fields_consulted": ["facts","issues","holdings","rules","procedural_history","timeline","orders","citations","parties","key_quotes"],
  "confidence": 0.0
}}

Case:
{case}

Question:
{question}"#,
        not_found = NOT_FOUND_ANSWER,
        case = structured_case_json.trim(),
        question = question.trim(),
    )
}

/// Question/answer pairs about one chunk, for context-prefixed instruction data
pub fn build_chunk_qa_prompt(data: &str, n: usize) -> String {
    format!(
        r#"Generate {n} question and answer pairs from the judgment excerpt below.
Each answer must be stated in the excerpt itself. Prefer the parties, facts, dates, issues and orders it mentions.
Keep questions self-contained and answers short.

Output strict JSON:
{{"generated":[{{"question":"…","answer":"…"}}]}}

Text:
{text}"#,
        n = n,
        text = data.trim(),
    )
}

/// Single-pass headnote + IRAC, for judgments that fit one context window
pub fn build_full_case_summary_prompt(text: &str, target_words: usize) -> String {
    format!(
        r#"Summarize the following judgment into a {target_words}-word headnote plus IRAC sections.
Use only what the judgment states. No commentary outside JSON.
Output JSON:
{{
  "headnote": "…",
  "irac": {{"issue":["…"],"rule":["…"],"analysis":["…"],"conclusion":["…"]}}
}}
Text:
{text}"#,
        target_words = target_words,
        text = text.trim(),
    )
}

pub fn build_retry_prompt(invalid_json: &str) -> String {
    format!(
        r#"The following JSON is invalid:

{}

Fix this JSON. Keep every field and value, change only what is needed to make it parse.
Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON."#,
        invalid_json.trim()
    )
}
