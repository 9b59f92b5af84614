use serde::{Deserialize, Deserializer, Serialize};

/// Models are told to use `null` for unknown values; treat it as the empty value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parties {
    #[serde(default, deserialize_with = "null_as_default")]
    pub plaintiffs: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub defendants: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub judges: Vec<String>,
}

impl Parties {
    pub fn is_empty(&self) -> bool {
        self.plaintiffs.is_empty() && self.defendants.is_empty() && self.judges.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// ISO `YYYY-MM-DD`, or whatever the model could recover
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub event: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
}

/// Structured record for a single chunk of a judgment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkExtraction {
    pub case_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pages: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chunk_summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub facts: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub procedural_history: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub holdings: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rules: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reasoning: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub orders: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parties: Parties,
    #[serde(default, deserialize_with = "null_as_default")]
    pub citations: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entities: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timeline: Vec<TimelineEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub quotes: Vec<Quote>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence: f64,
}

impl ChunkExtraction {
    /// The extractive statement lists, by field name
    pub fn statement_lists(&self) -> [(&'static str, &Vec<String>); 7] {
        [
            ("facts", &self.facts),
            ("procedural_history", &self.procedural_history),
            ("issues", &self.issues),
            ("holdings", &self.holdings),
            ("rules", &self.rules),
            ("reasoning", &self.reasoning),
            ("orders", &self.orders),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Irac {
    #[serde(default, deserialize_with = "null_as_default")]
    pub issue: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rule: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub analysis: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conclusion: Vec<String>,
}

impl Irac {
    pub fn is_empty(&self) -> bool {
        self.issue.is_empty()
            && self.rule.is_empty()
            && self.analysis.is_empty()
            && self.conclusion.is_empty()
    }
}

/// Canonical record for a whole case, merged from all chunk extractions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub headnote: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parties: Parties,
    #[serde(default, deserialize_with = "null_as_default")]
    pub facts: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub procedural_history: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub holdings: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rules: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reasoning: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub orders: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub citations: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entities: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timeline: Vec<TimelineEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_quotes: Vec<Quote>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub disposition: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary_irac: Irac,
}

impl CaseRecord {
    /// The extractive statement lists, by field name
    pub fn statement_lists(&self) -> [(&'static str, &Vec<String>); 8] {
        [
            ("facts", &self.facts),
            ("procedural_history", &self.procedural_history),
            ("issues", &self.issues),
            ("holdings", &self.holdings),
            ("rules", &self.rules),
            ("reasoning", &self.reasoning),
            ("orders", &self.orders),
            ("citations", &self.citations),
        ]
    }

    pub fn statement_lists_mut(&mut self) -> [(&'static str, &mut Vec<String>); 8] {
        [
            ("facts", &mut self.facts),
            ("procedural_history", &mut self.procedural_history),
            ("issues", &mut self.issues),
            ("holdings", &mut self.holdings),
            ("rules", &mut self.rules),
            ("reasoning", &mut self.reasoning),
            ("orders", &mut self.orders),
            ("citations", &mut self.citations),
        ]
    }

    /// True when the record carries nothing a question could be answered from
    pub fn is_empty(&self) -> bool {
        self.headnote.trim().is_empty()
            && self.disposition.trim().is_empty()
            && self.parties.is_empty()
            && self.entities.is_empty()
            && self.timeline.is_empty()
            && self.key_quotes.is_empty()
            && self.summary_irac.is_empty()
            && self.statement_lists().iter().all(|(_, list)| list.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    /// Locator such as `[para 12]`, empty when not locatable
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
}

/// Model response for per-chunk Q&A generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPairs {
    #[serde(default, deserialize_with = "null_as_default")]
    pub generated: Vec<QaPair>,
}

/// Q&A pairs generated from one chunk, kept with the text they came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkQa {
    pub chunk: usize,
    #[serde(default)]
    pub pages: String,
    /// Chunk text with its heading trail, as shown to the model
    pub context: String,
    pub generated: Vec<QaPair>,
}

/// Question prefixed with the passage it is asked about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionPair {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseAnswer {
    pub answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub support: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields_consulted: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence: f64,
}

/// Headnote plus IRAC for a judgment summarized in a single pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub headnote: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub irac: Irac,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub instruction: String,
    pub input: String,
    pub output: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode;
    use serde::de::DeserializeOwned;

    /// Serialize, wrap the way models fence their output, and decode back
    fn through_fenced_decode<T: Serialize + DeserializeOwned>(value: &T) -> T {
        let json = serde_json::to_string_pretty(value).unwrap();
        decode(&format!("```json\n{json}\n```")).unwrap()
    }

    fn sample_case() -> CaseRecord {
        CaseRecord {
            case_id: "J4/03/2024".to_string(),
            headnote: "Appeal concerning title to land at Kwabenya — dismissed.".to_string(),
            parties: Parties {
                plaintiffs: vec!["Acheamfour Group Ltd".to_string()],
                defendants: vec!["Anokye".to_string()],
                judges: vec!["Pwamang JSC".to_string()],
            },
            facts: vec!["The land was acquired in 2004 [para 3]".to_string()],
            timeline: vec![TimelineEntry {
                date: "2024-12-04".to_string(),
                event: "Judgment delivered".to_string(),
                source: "[p 1]".to_string(),
            }],
            key_quotes: vec![Quote {
                text: "A party who asserts must prove — «onus probandi».".to_string(),
                source: "[para 20]".to_string(),
            }],
            disposition: "Appeal dismissed".to_string(),
            summary_irac: Irac {
                issue: vec!["Who holds title?".to_string()],
                ..Irac::default()
            },
            ..CaseRecord::default()
        }
    }

    #[test]
    fn case_record_round_trips_with_unicode() {
        let case = sample_case();
        let json = serde_json::to_string(&case).unwrap();
        let back: CaseRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, case);
    }

    #[test]
    fn chunk_extraction_round_trips() {
        let extraction = ChunkExtraction {
            case_id: "c1".to_string(),
            pages: "pp. 1–3".to_string(),
            chunk_summary: "Summary.".to_string(),
            holdings: vec!["The appeal fails [para 40]".to_string()],
            quotes: vec![Quote {
                text: "exact".to_string(),
                source: "[p 2]".to_string(),
            }],
            confidence: 0.85,
            ..ChunkExtraction::default()
        };
        let json = serde_json::to_string(&extraction).unwrap();
        let back: ChunkExtraction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, extraction);
    }

    #[test]
    fn qa_pairs_round_trip_through_decode() {
        let pairs = vec![
            QaPair {
                question: "Who bore the burden of proof — «onus probandi»?".to_string(),
                answer: "The plaintiff, who asserted title.".to_string(),
                source: "[para 20]".to_string(),
            },
            QaPair {
                question: "Où se trouve le terrain?".to_string(),
                answer: "Kwabenya, Accra".to_string(),
                source: String::new(),
            },
        ];
        assert_eq!(through_fenced_decode(&pairs), pairs);
    }

    #[test]
    fn case_answer_round_trips_through_decode() {
        let answer = CaseAnswer {
            answer: "The appeal was dismissed — costs of GH₵ 20,000 awarded.".to_string(),
            support: vec!["orders[0]: Appeal dismissed [p. 12]".to_string()],
            fields_consulted: vec!["orders".to_string(), "disposition".to_string()],
            confidence: 0.75,
        };
        assert_eq!(through_fenced_decode(&answer), answer);
    }

    #[test]
    fn case_summary_round_trips_through_decode() {
        let summary = CaseSummary {
            headnote: "Land dispute at Kwabenya; the Supreme Court affirmed — «res judicata».".to_string(),
            irac: Irac {
                issue: vec!["Whether the plea of estoppel applied".to_string()],
                rule: vec!["Estoppel per rem judicatam".to_string()],
                analysis: vec!["The earlier suit concerned the same land.".to_string()],
                conclusion: vec!["Appeal dismissed".to_string()],
            },
        };
        assert_eq!(through_fenced_decode(&summary), summary);
    }

    #[test]
    fn training_record_round_trips_through_decode() {
        let record = TrainingRecord {
            instruction: "Extract structured data from the judgment excerpt.".to_string(),
            input: "Facts\nThe plaintiff — Ms. Ama Serwaa — bought land in 2004.".to_string(),
            output: r#"{"case_id":"c1","facts":["Land bought in 2004 [para 3]"]}"#.to_string(),
        };
        assert_eq!(through_fenced_decode(&record), record);
    }

    #[test]
    fn generated_pairs_tolerate_missing_sources() {
        let decoded: GeneratedPairs = decode(
            r#"{"generated": [{"question": "Where is the land?", "answer": "Kwabenya"}]}"#,
        )
        .unwrap();
        assert_eq!(decoded.generated.len(), 1);
        assert_eq!(decoded.generated[0].source, "");

        let empty: GeneratedPairs = decode(r#"{"generated": null}"#).unwrap();
        assert!(empty.generated.is_empty());
    }

    #[test]
    fn nulls_decode_as_empty_values() {
        let json = r#"{
            "case_id": "c1",
            "pages": null,
            "facts": null,
            "parties": {"plaintiffs": null, "defendants": ["B"], "judges": []},
            "timeline": [{"date": null, "event": "Filed", "source": null}],
            "confidence": null
        }"#;
        let extraction: ChunkExtraction = serde_json::from_str(json).unwrap();

        assert!(extraction.pages.is_empty());
        assert!(extraction.facts.is_empty());
        assert!(extraction.parties.plaintiffs.is_empty());
        assert_eq!(extraction.parties.defendants, vec!["B"]);
        assert_eq!(extraction.timeline[0].date, "");
        assert_eq!(extraction.confidence, 0.0);
    }

    #[test]
    fn mistyped_list_is_rejected() {
        let json = r#"{"case_id": "c1", "facts": "not a list"}"#;
        assert!(serde_json::from_str::<ChunkExtraction>(json).is_err());
    }

    #[test]
    fn missing_case_id_is_rejected() {
        assert!(serde_json::from_str::<CaseRecord>(r#"{"headnote": "x"}"#).is_err());
    }

    #[test]
    fn empty_case_detection() {
        let empty = CaseRecord {
            case_id: "c1".to_string(),
            ..CaseRecord::default()
        };
        assert!(empty.is_empty());
        assert!(!sample_case().is_empty());
    }
}
