//! Prompt template with `{context}` and `{question}` slots.
//!
//! `{{` and `}}` stand for literal braces. Substitution happens in a single
//! pass, so text inserted into one slot is never re-scanned for placeholders.

use crate::error::ConfigError;
use crate::models::SearchHit;
use regex::{Captures, Regex};

pub const CONTEXT_SLOT: &str = "context";
pub const QUESTION_SLOT: &str = "question";
pub const CONTEXT_SEPARATOR: &str = "\n\n";

const PLACEHOLDER_PATTERN: &str = r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}";

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    source: String,
    placeholders: Regex,
}

impl PartialEq for PromptTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for PromptTemplate {}

impl PromptTemplate {
    pub fn parse(source: impl Into<String>) -> Result<Self, ConfigError> {
        let source = source.into();
        let placeholders = Regex::new(PLACEHOLDER_PATTERN)?;
        let mut seen_context = false;
        let mut seen_question = false;

        for capture in placeholders.captures_iter(&source) {
            let Some(name) = capture.get(1).map(|m| m.as_str()) else {
                continue;
            };
            match name {
                CONTEXT_SLOT => seen_context = true,
                QUESTION_SLOT => seen_question = true,
                other => return Err(ConfigError::UnknownPlaceholder(other.to_string())),
            }
        }

        if !seen_context {
            return Err(ConfigError::MissingPlaceholder(CONTEXT_SLOT.to_string()));
        }
        if !seen_question {
            return Err(ConfigError::MissingPlaceholder(QUESTION_SLOT.to_string()));
        }

        Ok(Self {
            source,
            placeholders,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn render(&self, context: &[SearchHit], question: &str) -> String {
        let context = join_context(context);
        self.fill(&context, question)
    }

    pub fn fill(&self, context: &str, question: &str) -> String {
        self.placeholders
            .replace_all(&self.source, |capture: &Captures<'_>| {
                match capture.get(1).map(|m| m.as_str()) {
                    Some(CONTEXT_SLOT) => context.to_string(),
                    Some(QUESTION_SLOT) => question.to_string(),
                    Some(other) => format!("{{{other}}}"),
                    None if &capture[0] == "{{" => "{".to_string(),
                    None => "}".to_string(),
                }
            })
            .into_owned()
    }
}

pub fn join_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn hit(text: &str) -> SearchHit {
        SearchHit {
            chunk: Chunk {
                chunk_id: text.to_string(),
                document_id: "doc".to_string(),
                source_path: "/tmp/doc.pdf".to_string(),
                page: 1,
                chunk_index: 0,
                text: text.to_string(),
            },
            score: 1.0,
        }
    }

    #[test]
    fn render_substitutes_both_slots() {
        let template =
            PromptTemplate::parse("Answer from context.\n#Context:\n{context}\n#Question:\n{question}")
                .expect("template parses");

        let prompt = template.render(&[hit("A"), hit("B")], "Q?");

        assert!(prompt.contains("A\n\nB"));
        assert!(prompt.contains("Q?"));
        assert!(!prompt.contains("{context}"));
        assert!(!prompt.contains("{question}"));
    }

    #[test]
    fn missing_slots_are_config_errors() {
        assert!(matches!(
            PromptTemplate::parse("only {question}"),
            Err(ConfigError::MissingPlaceholder(name)) if name == "context"
        ));
        assert!(matches!(
            PromptTemplate::parse("only {context}"),
            Err(ConfigError::MissingPlaceholder(name)) if name == "question"
        ));
    }

    #[test]
    fn unknown_slot_is_a_config_error() {
        assert!(matches!(
            PromptTemplate::parse("{context} {question} {language}"),
            Err(ConfigError::UnknownPlaceholder(name)) if name == "language"
        ));
    }

    #[test]
    fn escaped_braces_become_literals() {
        let template =
            PromptTemplate::parse("Reply as {{\"answer\": ...}}\n{context}\n{question}").unwrap();
        assert_eq!(
            template.fill("ctx", "q"),
            "Reply as {\"answer\": ...}\nctx\nq"
        );
    }

    #[test]
    fn inserted_text_is_not_rescanned() {
        let template = PromptTemplate::parse("{context}|{question}").unwrap();
        assert_eq!(
            template.fill("see {question}", "what is {context}?"),
            "see {question}|what is {context}?"
        );
    }

    #[test]
    fn cloned_template_fills_identically() {
        let template = PromptTemplate::parse("{context} / {question}").unwrap();
        let copy = template.clone();
        assert_eq!(copy, template);
        assert_eq!(copy.fill("ctx", "q"), template.fill("ctx", "q"));
        assert_ne!(copy, PromptTemplate::parse("{question} / {context}").unwrap());
    }

    #[test]
    fn context_order_is_preserved() {
        assert_eq!(join_context(&[hit("second"), hit("first")]), "second\n\nfirst");
        assert_eq!(join_context(&[]), "");
    }
}
