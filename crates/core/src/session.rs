use crate::models::{Answer, Role, Turn};
use crate::orchestrator::QaPipeline;
use crate::PipelineError;
use chrono::Utc;
use std::sync::Arc;

pub const GREETING: &str =
    "Hello! Ask anything about the loaded documents and I will answer from their contents.";

/// Ordered, append-only list of conversation turns.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn push(&mut self, role: Role, content: impl Into<String>) -> &Turn {
        self.turns.push(Turn {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        let last = self.turns.len() - 1;
        &self.turns[last]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// One user's conversation against a shared pipeline handle.
#[derive(Debug, Default)]
pub struct ChatSession {
    pipeline: Option<Arc<QaPipeline>>,
    transcript: Transcript,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Attaches a built pipeline and greets the user. Re-attaching replaces the handle without a second greeting.
    pub fn attach(&mut self, pipeline: Arc<QaPipeline>) {
        let first = self.pipeline.is_none();
        self.pipeline = Some(pipeline);
        if first {
            self.transcript.push(Role::Assistant, GREETING);
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn clear(&mut self) {
        self.transcript.clear();
    }

    /// Records the question, asks the pipeline and records the answer.
    ///
    /// On failure the question stays in the transcript and no answer turn is added.
    pub async fn ask(&mut self, question: &str) -> Result<Answer, PipelineError> {
        let pipeline = self.pipeline.clone().ok_or(PipelineError::NotReady)?;

        self.transcript.push(Role::User, question);
        let answer = pipeline.ask_with_sources(question).await?;
        self.transcript.push(Role::Assistant, answer.text.clone());

        Ok(answer)
    }
}
