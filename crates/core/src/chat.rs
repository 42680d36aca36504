use crate::error::ChatError;
use crate::followups::{filter_candidates, parse_suggestions};
use crate::models::{ChatMessage, PipelineState, Role};
use crate::retriever::Retriever;
use crate::traits::{LanguageModel, TokenStream};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are the assistant for a personal website. \
    Answer questions about the site owner and their work. \
    Do not answer unrelated or inappropriate questions. \
    If context is provided and immediately relevant to the question, \
    use it to inform your answer.";

const FOLLOWUP_INSTRUCTION: &str = "Suggest 1 or 2 very short follow-up questions \
    (3 to 5 words max each). Be concise and respond only in text without markdown. \
    Reply with NONE if no useful follow-up exists.";

/// The fixed two-stage conversation pipeline: retrieve, then generate.
/// No branching, no retries; each request owns its own state.
pub struct ChatPipeline {
    retriever: Retriever,
    model: Arc<dyn LanguageModel>,
    system_prompt: String,
}

impl ChatPipeline {
    pub fn new(retriever: Retriever, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            retriever,
            model,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// The text the retrieval query is built from: the most recent user
    /// turn, or the last turn regardless of role when no user turn exists.
    fn current_question(history: &[ChatMessage]) -> Result<&str, ChatError> {
        let last = history.last().ok_or(ChatError::EmptyHistory)?;
        let question = history
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .unwrap_or(last);
        Ok(&question.content)
    }

    /// Retrieve stage: embed the current question and fetch grounding
    /// context. An empty context is a normal outcome.
    pub async fn retrieve_stage(&self, history: &[ChatMessage]) -> Result<String, ChatError> {
        let question = Self::current_question(history)?;
        let context = self.retriever.retrieve(question).await?;
        debug!(
            question_len = question.len(),
            context_len = context.len(),
            "retrieve stage complete"
        );
        Ok(context)
    }

    /// Reconstructs the model input: system instruction first, the history
    /// in original order, then the grounding context as a final user message
    /// labeled apart from conversation content. Empty context adds nothing.
    pub fn build_messages(&self, history: &[ChatMessage], context: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(history.iter().cloned());
        if !context.is_empty() {
            messages.push(ChatMessage::user(format!("Relevant context:\n{context}")));
        }
        messages
    }

    /// Runs both stages and buffers the whole answer.
    pub async fn answer(&self, history: &[ChatMessage]) -> Result<String, ChatError> {
        Ok(self.run(history).await?.answer)
    }

    /// Runs the pipeline and returns the per-request state after the
    /// terminal generate stage.
    pub async fn run(&self, history: &[ChatMessage]) -> Result<PipelineState, ChatError> {
        let mut state = PipelineState {
            history: history.to_vec(),
            ..PipelineState::default()
        };
        state.context = self.retrieve_stage(&state.history).await?;
        let messages = self.build_messages(&state.history, &state.context);
        state.answer = self.model.invoke(&messages).await?;
        Ok(state)
    }

    /// Runs both stages, delivering the answer as a lazy fragment stream.
    /// Dropping the stream early cancels the model request without error.
    pub async fn answer_stream(&self, history: &[ChatMessage]) -> Result<TokenStream, ChatError> {
        let context = self.retrieve_stage(history).await?;
        let messages = self.build_messages(history, &context);
        self.model.stream(&messages).await
    }

    /// Asks the model for follow-up candidates and filters out anything the
    /// user already asked. No candidates is a normal, empty result.
    pub async fn suggest_followups(
        &self,
        history: &[ChatMessage],
    ) -> Result<Vec<String>, ChatError> {
        if history.is_empty() {
            return Err(ChatError::EmptyHistory);
        }

        let mut messages = self.build_messages(history, "");
        messages.push(ChatMessage::user(FOLLOWUP_INSTRUCTION));
        let response = self.model.invoke(&messages).await?;

        let candidates = parse_suggestions(&response);
        let previous: Vec<String> = history
            .iter()
            .filter(|message| message.role == Role::User)
            .map(|message| message.content.clone())
            .collect();

        Ok(filter_candidates(candidates, &previous))
    }
}
