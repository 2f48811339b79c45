//! Turn domain types.
//!
//! A turn is one role-tagged message. Turns flow through the whole system:
//! history stores them, the context assembler orders them, and a provider
//! adapter reshapes them into its wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (prompt rules, conversation summaries)
    System,
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

impl Role {
    /// Lowercase wire name shared by OpenAI-style APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Speaker label used when turns are rendered as a transcript.
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open range of history positions a summary stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySpan {
    pub start: usize,
    pub end: usize,
}

impl SummarySpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of turns covered.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a turn is, beyond its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnKind {
    /// An ordinary message.
    #[default]
    Plain,
    /// A synthesized summary replacing the history turns in `span`.
    Summary { span: SummarySpan },
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Plain message or conversation summary
    #[serde(default)]
    pub kind: TurnKind,

    /// When the turn entered history (unset for assembled prompt turns)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Turn {
    /// Create a plain turn with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            kind: TurnKind::Plain,
            timestamp: None,
        }
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a system-role summary turn covering `span`.
    pub fn summary(content: impl Into<String>, span: SummarySpan) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            kind: TurnKind::Summary { span },
            timestamp: None,
        }
    }

    /// Stamp the turn with the current time.
    pub fn stamped(mut self) -> Self {
        self.timestamp = Some(Utc::now());
        self
    }

    pub fn is_summary(&self) -> bool {
        matches!(self.kind, TurnKind::Summary { .. })
    }

    /// The span this turn summarizes, if it is a summary.
    pub fn summary_span(&self) -> Option<SummarySpan> {
        match self.kind {
            TurnKind::Summary { span } => Some(span),
            TurnKind::Plain => None,
        }
    }

    /// Render as `Speaker: content`.
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.role.label(), self.content)
    }
}
