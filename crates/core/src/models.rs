use serde::{Deserialize, Serialize};

/// Where a document came from. The prefix keeps record ids from different
/// loaders disjoint even when chunk texts collide.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Web,
    Github,
    Pdf,
    File,
}

impl SourceKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            SourceKind::Web => "web",
            SourceKind::Github => "github",
            SourceKind::Pdf => "pdf",
            SourceKind::File => "file",
        }
    }
}

/// Raw fetched text plus its source identifier. Transient: produced by a
/// fetcher and consumed immediately by the chunker.
#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub source: String,
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub sequence_no: u64,
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RecordMetadata {
    pub text: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// One hit from a top-k similarity query, ordered by descending score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<RecordMetadata>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Per-request state threaded through the retrieve and generate stages.
/// Owned by one in-flight request, never shared.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub history: Vec<ChatMessage>,
    pub context: String,
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let message = ChatMessage::user("hello");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn index_match_tolerates_missing_metadata() {
        let parsed: IndexMatch = serde_json::from_str(r#"{"id": "web-abc"}"#).unwrap();
        assert_eq!(parsed.id, "web-abc");
        assert_eq!(parsed.score, 0.0);
        assert!(parsed.metadata.is_none());
    }
}
