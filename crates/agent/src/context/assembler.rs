//! Context assembly: fitting one question into the model's token budget.
//!
//! Builds `[system, summary?, recent turns…, user]` and, while the prompt is
//! over budget, walks a fixed degradation ladder:
//!
//! 1. Reject a query that alone exceeds `question_threshold` of the budget
//! 2. Baseline: summary of the horizon window plus recent turns verbatim
//! 3. Token check
//! 4. Small histories: shrink the retrieved context
//! 5. Long histories: summarize everything older than the recent turns
//! 6. Re-summarize the same window with half the token hint
//! 7. Shrink the summary text itself
//! 8. Give up with [`AssemblyError::HistoryTooLong`]
//!
//! # Determinism
//!
//! With a deterministic summarizer, identical inputs and history always
//! produce identical messages. Assembly never mutates history.

use std::sync::Arc;

use ragchat_config::{ConfigError, MemoryConfig};
use ragchat_core::message::{Role, SummarySpan, Turn};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::history::HistoryStore;
use crate::context::summarizer::Summarizer;
use crate::context::token::TokenCounter;

// ── Constants ─────────────────────────────────────────────────────────────

/// How far back (in turns) the baseline summary reaches.
pub const HISTORY_HORIZON: usize = 15;
/// Histories shorter than this may have their retrieved context shrunk.
pub const SMALL_HISTORY: usize = 10;
/// Tokens kept free when shrinking the context.
pub const CONTEXT_SAFETY_BUFFER: usize = 100;
/// Below this many tokens a shrunk context is not worth sending.
pub const MIN_USEFUL_CONTEXT: usize = 100;
/// Tokens kept free when shrinking the summary.
pub const SUMMARY_SAFETY_BUFFER: usize = 50;
/// Below this many tokens a shrunk summary is not worth keeping.
pub const MIN_SUMMARY_TOKENS: usize = 100;
/// Shrinking never cuts the context below this many characters.
pub const CONTEXT_FLOOR_CHARS: usize = 100;
/// Shrinking never cuts the summary below this many characters.
pub const SUMMARY_FLOOR_CHARS: usize = 200;
/// Upper bound on shrink iterations.
pub const MAX_SHRINK_ITERATIONS: usize = 32;
/// Smallest token hint handed to the summarizer.
const MIN_SUMMARY_HINT: usize = 50;

pub const SUMMARY_HEADER: &str = "Previous conversation summary:\n";
pub const CONTEXT_TRUNCATION_MARKER: &str = "\n[Context truncated due to length]";
pub const SUMMARY_TRUNCATION_MARKER: &str = "\n[Summary truncated due to length]";

// ── Types ─────────────────────────────────────────────────────────────────

/// Token budget for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetConfig {
    pub token_limit: usize,
    pub recent_messages_limit: usize,
    pub summarize_threshold: f64,
    pub question_threshold: f64,
}

impl BudgetConfig {
    /// Validated budget: `token_limit > 0` and
    /// `0 < question_threshold < summarize_threshold <= 1`.
    pub fn new(
        token_limit: usize,
        recent_messages_limit: usize,
        summarize_threshold: f64,
        question_threshold: f64,
    ) -> Result<Self, ConfigError> {
        Self::from_memory_config(&MemoryConfig {
            token_limit,
            recent_messages_limit,
            summarize_threshold,
            question_threshold,
        })
    }

    pub fn from_memory_config(config: &MemoryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            token_limit: config.token_limit,
            recent_messages_limit: config.recent_messages_limit,
            summarize_threshold: config.summarize_threshold,
            question_threshold: config.question_threshold,
        })
    }

    /// Largest query, in tokens, that is accepted.
    pub fn max_query_tokens(&self) -> f64 {
        self.token_limit as f64 * self.question_threshold
    }

    /// History size above which the baseline summary covers all older turns.
    pub fn summarize_tokens(&self) -> f64 {
        self.token_limit as f64 * self.summarize_threshold
    }

    /// Token target handed to the summarizer.
    pub fn summary_hint(&self) -> usize {
        let hint = (self.token_limit as f64 * (1.0 - self.summarize_threshold)).round() as usize;
        hint.max(MIN_SUMMARY_HINT)
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        let m = MemoryConfig::default();
        Self {
            token_limit: m.token_limit,
            recent_messages_limit: m.recent_messages_limit,
            summarize_threshold: m.summarize_threshold,
            question_threshold: m.question_threshold,
        }
    }
}

/// One degradation applied while fitting the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum DegradationStep {
    /// Retrieved context shrunk.
    ContextTruncated { from_tokens: usize, to_tokens: usize },
    /// Summary widened to every turn older than the recent window.
    DeepSummary { span: SummarySpan },
    /// Summary regenerated with a halved token hint.
    AggressiveSummary { span: SummarySpan },
    /// Summary text shrunk.
    SummaryTruncated { from_tokens: usize, to_tokens: usize },
}

/// Detailed metadata about the assembly process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Total tokens in the assembled prompt.
    pub total_tokens: usize,
    /// Configured token budget.
    pub budget: usize,
    /// Budget utilization percentage (0.0–100.0).
    pub utilization_pct: f32,
    /// Degradations applied, in order.
    pub steps: Vec<DegradationStep>,
}

/// A prompt that fits the budget, ready for an LLM call.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub messages: Vec<Turn>,
    pub metadata: AssemblyMetadata,
}

impl AssembledPrompt {
    /// The summary turn, if the prompt carries one.
    pub fn summary(&self) -> Option<&Turn> {
        self.messages.iter().find(|t| t.is_summary())
    }
}

/// Errors from context assembly.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyError {
    /// The question alone is over `question_threshold` of the budget.
    QueryTooLong { query_tokens: usize, max_tokens: usize },
    /// Nothing left to degrade and the prompt is still over budget.
    HistoryTooLong { total_tokens: usize, budget: usize },
}

impl std::fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QueryTooLong {
                query_tokens,
                max_tokens,
            } => write!(
                f,
                "Your question is too long ({} tokens; the limit is {} tokens). Please ask a shorter question.",
                query_tokens, max_tokens
            ),
            Self::HistoryTooLong {
                total_tokens,
                budget,
            } => write!(
                f,
                "The conversation is too long to continue ({} tokens against a budget of {}). Please clear the chat history (start a new conversation) and try again.",
                total_tokens, budget
            ),
        }
    }
}

impl std::error::Error for AssemblyError {}

// ── Truncation policy ─────────────────────────────────────────────────────

/// Shrink `text` to at most `target_tokens`, keeping a prefix plus `marker`.
///
/// Each round keeps `min(0.9, target / current)` of the characters kept so
/// far, never fewer than `floor_chars`, for at most
/// [`MAX_SHRINK_ITERATIONS`] rounds. The prefix is always taken from the
/// original text, so markers never stack.
pub fn shrink_to_fit(
    counter: &TokenCounter,
    text: &str,
    target_tokens: usize,
    floor_chars: usize,
    marker: &str,
) -> String {
    let mut current = text.to_string();
    let mut current_tokens = counter.count(&current);
    let mut kept = text.chars().count();

    for _ in 0..MAX_SHRINK_ITERATIONS {
        if current_tokens <= target_tokens || kept <= floor_chars {
            break;
        }
        let ratio = (target_tokens as f64 / current_tokens as f64).min(0.9);
        let next = ((kept as f64 * ratio) as usize).max(floor_chars);
        if next >= kept {
            break;
        }
        kept = next;
        current = format!("{}{}", char_prefix(text, kept), marker);
        current_tokens = counter.count(&current);
    }

    current
}

fn char_prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// The user turn: retrieved context, question, and the refusal reminder.
pub fn render_user_turn(context: &str, query: &str) -> String {
    format!(
        "Context:\n{context}\n\nQuestion: {query}\n\nRemember: If the answer is not fully contained in the context, reply ONLY with 'I don't have enough information to answer this question.'"
    )
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// Owns one session's history and fits each new question into the budget.
pub struct ContextAssembler {
    budget: BudgetConfig,
    counter: TokenCounter,
    summarizer: Arc<dyn Summarizer>,
    history: HistoryStore,
}

impl ContextAssembler {
    pub fn new(budget: BudgetConfig, counter: TokenCounter, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            budget,
            history: HistoryStore::new(counter.clone()),
            counter,
            summarizer,
        }
    }

    pub fn budget(&self) -> &BudgetConfig {
        &self.budget
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Record a completed round trip: one user turn, one assistant turn.
    pub fn add_exchange(&mut self, query: impl Into<String>, answer: impl Into<String>) {
        self.history.append(Role::User, query);
        self.history.append(Role::Assistant, answer);
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Build the prompt for `query`, degrading until it fits the budget.
    pub async fn prepare_context(
        &self,
        query: &str,
        system_prompt: &str,
        retrieved_context: &str,
    ) -> Result<AssembledPrompt, AssemblyError> {
        let limit = self.budget.token_limit;

        // ── 1. Oversized query ──
        let query_tokens = self.counter.count(query);
        if query_tokens as f64 > self.budget.max_query_tokens() {
            debug!(query_tokens, max = self.budget.max_query_tokens(), "Query rejected as too long");
            return Err(AssemblyError::QueryTooLong {
                query_tokens,
                max_tokens: self.budget.max_query_tokens().floor() as usize,
            });
        }

        let len = self.history.len();
        let recent = self.budget.recent_messages_limit.min(len);
        let older_end = len - recent;
        let history_tokens = self.history.total_tokens();
        let context_tokens = self.counter.count(retrieved_context);

        debug!(
            query_tokens,
            system_tokens = self.counter.count(system_prompt),
            context_tokens,
            history_turns = len,
            history_tokens,
            "Assembling context"
        );

        // ── 2. Baseline ──
        let preemptive = history_tokens as f64 > self.budget.summarize_tokens();
        let baseline_start = if preemptive {
            0
        } else {
            len.saturating_sub(HISTORY_HORIZON)
        };

        let mut steps = Vec::new();
        let mut messages = vec![Turn::system(system_prompt)];
        if older_end > baseline_start {
            let summary = self
                .summary_turn(baseline_start, older_end, self.budget.summary_hint())
                .await;
            messages.push(summary);
        }
        messages.extend(self.history.recent(recent).iter().cloned());
        messages.push(Turn::user(render_user_turn(retrieved_context, query)));

        // ── 3. Token check ──
        let mut total = self.counter.count_turns(&messages);
        if total <= limit {
            return Ok(self.finish(messages, steps));
        }
        debug!(total, limit, "Prompt over budget, degrading");

        // ── 4. Shrink context (small histories only) ──
        if len < SMALL_HISTORY {
            let others = total.saturating_sub(context_tokens);
            let max_context = limit as i64 - others as i64 - CONTEXT_SAFETY_BUFFER as i64;
            if max_context > MIN_USEFUL_CONTEXT as i64 {
                let shrunk = shrink_to_fit(
                    &self.counter,
                    retrieved_context,
                    max_context as usize,
                    CONTEXT_FLOOR_CHARS,
                    CONTEXT_TRUNCATION_MARKER,
                );
                if shrunk != retrieved_context {
                    let to_tokens = self.counter.count(&shrunk);
                    if let Some(user) = messages.last_mut() {
                        *user = Turn::user(render_user_turn(&shrunk, query));
                    }
                    steps.push(DegradationStep::ContextTruncated {
                        from_tokens: context_tokens,
                        to_tokens,
                    });
                    total = self.counter.count_turns(&messages);
                    if total <= limit {
                        return Ok(self.finish(messages, steps));
                    }
                }
            }
        }

        // ── 5. Deep summary ──
        if len > HISTORY_HORIZON && older_end > 0 {
            let span = SummarySpan::new(0, older_end);
            let current = messages.iter().find_map(Turn::summary_span);
            if current != Some(span) {
                let summary = self
                    .summary_turn(0, older_end, self.budget.summary_hint())
                    .await;
                place_summary(&mut messages, summary);
                steps.push(DegradationStep::DeepSummary { span });
                total = self.counter.count_turns(&messages);
                if total <= limit {
                    return Ok(self.finish(messages, steps));
                }
            }
        }

        // ── 6. Aggressive summary ──
        if older_end > 0 {
            let span = SummarySpan::new(0, older_end);
            let hint = (self.budget.summary_hint() / 2).max(1);
            let summary = self.summary_turn(0, older_end, hint).await;
            place_summary(&mut messages, summary);
            steps.push(DegradationStep::AggressiveSummary { span });
            total = self.counter.count_turns(&messages);
            if total <= limit {
                return Ok(self.finish(messages, steps));
            }
        }

        // ── 7. Shrink the summary ──
        if let Some(summary) = messages.iter_mut().find(|t| t.is_summary()) {
            let excess = total - limit;
            let summary_tokens = self.counter.count(&summary.content);
            let target = summary_tokens as i64 - excess as i64 - SUMMARY_SAFETY_BUFFER as i64;
            if target > MIN_SUMMARY_TOKENS as i64 {
                let shrunk = shrink_to_fit(
                    &self.counter,
                    &summary.content,
                    target as usize,
                    SUMMARY_FLOOR_CHARS,
                    SUMMARY_TRUNCATION_MARKER,
                );
                if shrunk != summary.content {
                    let to_tokens = self.counter.count(&shrunk);
                    summary.content = shrunk;
                    steps.push(DegradationStep::SummaryTruncated {
                        from_tokens: summary_tokens,
                        to_tokens,
                    });
                    total = self.counter.count_turns(&messages);
                    if total <= limit {
                        return Ok(self.finish(messages, steps));
                    }
                }
            }
        }

        // ── 8. Refuse ──
        debug!(total, limit, ?steps, "Prompt still over budget after degradation");
        Err(AssemblyError::HistoryTooLong {
            total_tokens: total,
            budget: limit,
        })
    }

    async fn summary_turn(&self, start: usize, end: usize, hint: usize) -> Turn {
        let text = self
            .summarizer
            .summarize(self.history.range(start, end), hint)
            .await;
        Turn::summary(format!("{SUMMARY_HEADER}{text}"), SummarySpan::new(start, end))
    }

    fn finish(&self, messages: Vec<Turn>, steps: Vec<DegradationStep>) -> AssembledPrompt {
        let total_tokens = self.counter.count_turns(&messages);
        let budget = self.budget.token_limit;
        debug!(total_tokens, budget, turns = messages.len(), "Final prompt assembled");
        AssembledPrompt {
            messages,
            metadata: AssemblyMetadata {
                total_tokens,
                budget,
                utilization_pct: (total_tokens as f32 / budget as f32) * 100.0,
                steps,
            },
        }
    }
}

/// Replace the existing summary turn, or insert one right after the system prompt.
fn place_summary(messages: &mut Vec<Turn>, summary: Turn) {
    match messages.iter().position(Turn::is_summary) {
        Some(i) => messages[i] = summary,
        None => messages.insert(1, summary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::summarizer::{DeterministicSummarizer, LlmSummarizer};
    use crate::test_helpers::{resolved, FailingProvider};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const SYSTEM: &str = "You are a retrieval-only assistant."; // 35 chars → 9 tokens

    /// Returns `hint` tokens of text and records every call.
    #[derive(Default)]
    struct SizedSummarizer {
        calls: Mutex<Vec<(usize, usize)>>,
    }

    #[async_trait]
    impl Summarizer for SizedSummarizer {
        async fn summarize(&self, turns: &[Turn], max_tokens_hint: usize) -> String {
            self.calls.lock().unwrap().push((turns.len(), max_tokens_hint));
            "s".repeat(max_tokens_hint * 4)
        }
    }

    /// Ignores the hint and always returns a long summary.
    struct VerboseSummarizer;

    #[async_trait]
    impl Summarizer for VerboseSummarizer {
        async fn summarize(&self, _turns: &[Turn], _hint: usize) -> String {
            "w".repeat(2000)
        }
    }

    fn budget(limit: usize, recent: usize, s: f64, q: f64) -> BudgetConfig {
        BudgetConfig::new(limit, recent, s, q).unwrap()
    }

    fn assembler(budget: BudgetConfig, summarizer: Arc<dyn Summarizer>) -> ContextAssembler {
        ContextAssembler::new(budget, TokenCounter::heuristic(), summarizer)
    }

    /// `pairs` exchanges of 40-char turns (10 tokens each).
    fn fill(a: &mut ContextAssembler, pairs: usize) {
        for i in 0..pairs {
            a.add_exchange(format!("{:<40}", format!("question {i}")), format!("{:<40}", format!("answer {i}")));
        }
    }

    fn summary_count(prompt: &AssembledPrompt) -> usize {
        prompt.messages.iter().filter(|t| t.is_summary()).count()
    }

    #[test]
    fn budget_validation() {
        assert!(BudgetConfig::new(100, 3, 0.7, 0.2).is_ok());
        assert!(BudgetConfig::new(0, 3, 0.7, 0.2).is_err());
        assert!(BudgetConfig::new(100, 3, 0.2, 0.7).is_err());
        assert!(BudgetConfig::new(100, 3, 1.2, 0.2).is_err());
        assert!(BudgetConfig::new(100, 3, 0.7, 0.0).is_err());
    }

    #[test]
    fn summary_hint_rounds_and_floors() {
        assert_eq!(budget(1000, 3, 0.8, 0.2).summary_hint(), 200);
        assert_eq!(budget(100, 3, 0.7, 0.2).summary_hint(), MIN_SUMMARY_HINT);
    }

    #[tokio::test]
    async fn query_over_threshold_rejected() {
        let a = assembler(budget(100, 3, 0.7, 0.2), Arc::new(DeterministicSummarizer));
        let err = a
            .prepare_context(&"q".repeat(100), "sys", "ctx") // 25 tokens > 20
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AssemblyError::QueryTooLong {
                query_tokens: 25,
                max_tokens: 20
            }
        );
        assert!(err.to_string().contains("too long"));
        assert!(a.history().is_empty());
    }

    #[tokio::test]
    async fn query_under_threshold_proceeds() {
        let a = assembler(budget(100, 3, 0.7, 0.2), Arc::new(DeterministicSummarizer));
        let prompt = a
            .prepare_context(&"q".repeat(60), "sys", "ctx") // 15 tokens ≤ 20
            .await
            .unwrap();
        assert!(prompt.metadata.total_tokens <= 100);
    }

    #[tokio::test]
    async fn oversized_query_rejected_regardless_of_history() {
        let mut a = assembler(budget(1000, 3, 0.7, 0.2), Arc::new(DeterministicSummarizer));
        fill(&mut a, 6);
        let before = a.history().turns().to_vec();
        let err = a.prepare_context(&"q".repeat(804), SYSTEM, "").await.unwrap_err(); // 201 > 200
        assert!(matches!(err, AssemblyError::QueryTooLong { .. }));
        assert_eq!(a.history().turns(), before.as_slice());
    }

    #[tokio::test]
    async fn empty_history_yields_system_and_user() {
        let a = assembler(BudgetConfig::default(), Arc::new(DeterministicSummarizer));
        let prompt = a
            .prepare_context("What is Rust?", SYSTEM, "[Source: rust.md] Rust is a language.")
            .await
            .unwrap();

        assert_eq!(prompt.messages.len(), 2);
        assert_eq!(prompt.messages[0].role, Role::System);
        assert_eq!(prompt.messages[0].content, SYSTEM);
        assert_eq!(prompt.messages[1].role, Role::User);
        assert!(prompt.messages[1].content.starts_with("Context:\n[Source: rust.md]"));
        assert!(prompt.messages[1].content.contains("\n\nQuestion: What is Rust?\n\nRemember:"));
        assert!(prompt.summary().is_none());
        assert!(prompt.metadata.steps.is_empty());
    }

    #[tokio::test]
    async fn short_history_is_all_verbatim() {
        let mut a = assembler(BudgetConfig::default(), Arc::new(DeterministicSummarizer));
        a.add_exchange("hi", "hello");
        let prompt = a.prepare_context("next?", SYSTEM, "ctx").await.unwrap();
        // recent limit 3 covers both turns, so no summary.
        assert_eq!(prompt.messages.len(), 4);
        assert_eq!(prompt.messages[1].content, "hi");
        assert_eq!(prompt.messages[2].content, "hello");
        assert!(prompt.summary().is_none());
    }

    #[tokio::test]
    async fn baseline_summary_covers_horizon_window() {
        let summarizer = Arc::new(SizedSummarizer::default());
        let mut a = assembler(budget(8000, 3, 0.7, 0.2), summarizer.clone());
        fill(&mut a, 10); // 20 turns, 200 tokens

        let prompt = a.prepare_context("q", SYSTEM, "ctx").await.unwrap();
        let summary = prompt.summary().unwrap();
        assert_eq!(summary.summary_span(), Some(SummarySpan::new(5, 17)));
        assert!(summary.content.starts_with(SUMMARY_HEADER));
        assert_eq!(summary_count(&prompt), 1);
        assert_eq!(summarizer.calls.lock().unwrap().as_slice(), &[(12, 2400)]);
    }

    #[tokio::test]
    async fn heavy_history_summarizes_all_older_turns_up_front() {
        let summarizer = Arc::new(SizedSummarizer::default());
        // 200 history tokens > 300 * 0.5
        let mut a = assembler(budget(300, 3, 0.5, 0.1), summarizer.clone());
        fill(&mut a, 10);

        let prompt = a.prepare_context("q", SYSTEM, "ctx").await.unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(prompt.summary().unwrap().summary_span(), Some(SummarySpan::new(0, 17)));
    }

    #[tokio::test]
    async fn twenty_turns_over_budget_keep_one_summary_and_three_recent() {
        let summarizer = Arc::new(SizedSummarizer::default());
        let mut a = assembler(budget(1000, 3, 0.8, 0.2), summarizer.clone());
        fill(&mut a, 10); // 20 turns

        // Baseline ≈ 9 + 208 + 30 + 795 tokens, over the 1000 budget.
        let context = "c".repeat(3000);
        let prompt = a
            .prepare_context("What is ownership?", SYSTEM, &context)
            .await
            .unwrap();

        assert!(prompt.metadata.total_tokens <= 1000);
        assert_eq!(summary_count(&prompt), 1);
        assert_eq!(prompt.messages.len(), 6);
        assert_eq!(prompt.messages[1].summary_span(), Some(SummarySpan::new(0, 17)));

        let recent = a.history().recent(3);
        assert_eq!(&prompt.messages[2..5], recent);
        assert_eq!(prompt.messages[5].role, Role::User);

        let span = SummarySpan::new(0, 17);
        assert_eq!(
            prompt.metadata.steps,
            vec![
                DegradationStep::DeepSummary { span },
                DegradationStep::AggressiveSummary { span },
            ]
        );
        // Baseline, deep, then aggressive with half the hint.
        let calls = summarizer.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(12, 200), (17, 200), (17, 100)]);
    }

    #[tokio::test]
    async fn small_history_shrinks_context() {
        let a = assembler(budget(500, 3, 0.7, 0.2), Arc::new(DeterministicSummarizer));
        let context = "word ".repeat(2000); // 2500 tokens
        let prompt = a.prepare_context("What?", SYSTEM, &context).await.unwrap();

        assert!(prompt.metadata.total_tokens <= 500);
        let user = &prompt.messages.last().unwrap().content;
        assert!(user.contains("[Context truncated due to length]"));
        assert_eq!(user.matches("[Context truncated due to length]").count(), 1);
        assert!(user.contains("Question: What?"));
        assert!(matches!(
            prompt.metadata.steps.as_slice(),
            [DegradationStep::ContextTruncated { from_tokens: 2500, .. }]
        ));
    }

    #[tokio::test]
    async fn summary_is_truncated_as_last_resort() {
        let mut a = assembler(budget(400, 3, 0.8, 0.2), Arc::new(VerboseSummarizer));
        fill(&mut a, 10);

        let prompt = a.prepare_context("q", SYSTEM, "ctx").await.unwrap();
        assert!(prompt.metadata.total_tokens <= 400);
        let summary = prompt.summary().unwrap();
        assert!(summary.content.starts_with(SUMMARY_HEADER));
        assert!(summary.content.ends_with(SUMMARY_TRUNCATION_MARKER));
        assert!(matches!(
            prompt.metadata.steps.last(),
            Some(DegradationStep::SummaryTruncated { .. })
        ));
        assert_eq!(summary_count(&prompt), 1);
    }

    #[tokio::test]
    async fn oversized_recent_turns_are_refused() {
        let mut a = assembler(budget(500, 3, 0.7, 0.2), Arc::new(DeterministicSummarizer));
        a.add_exchange("a".repeat(1000), "b".repeat(1000));
        a.add_exchange("c".repeat(1000), "d".repeat(1000));

        let err = a.prepare_context("q", SYSTEM, "ctx").await.unwrap_err();
        assert!(matches!(err, AssemblyError::HistoryTooLong { budget: 500, .. }));
        assert!(err.to_string().contains("clear"));
        assert_eq!(a.history().len(), 4);
    }

    #[tokio::test]
    async fn oversized_system_prompt_is_refused() {
        let a = assembler(budget(500, 3, 0.7, 0.2), Arc::new(DeterministicSummarizer));
        let err = a.prepare_context("q", &"s".repeat(2400), "ctx").await.unwrap_err();
        assert!(matches!(err, AssemblyError::HistoryTooLong { .. }));
    }

    #[tokio::test]
    async fn prepare_is_idempotent_and_read_only() {
        let mut a = assembler(budget(1000, 3, 0.8, 0.2), Arc::new(DeterministicSummarizer));
        fill(&mut a, 10);
        let before = a.history().turns().to_vec();
        let context = "c".repeat(3000);

        let first = a.prepare_context("q", SYSTEM, &context).await;
        let second = a.prepare_context("q", SYSTEM, &context).await;
        assert_eq!(first, second);
        assert_eq!(a.history().turns(), before.as_slice());
    }

    #[tokio::test]
    async fn add_exchange_appends_two_turns_and_clear_resets() {
        let mut a = assembler(BudgetConfig::default(), Arc::new(DeterministicSummarizer));
        a.add_exchange("q1", "a1");
        assert_eq!(a.history().len(), 2);
        assert_eq!(a.history().turns()[0].role, Role::User);
        assert_eq!(a.history().turns()[1].role, Role::Assistant);

        a.add_exchange("q2", "a2");
        assert_eq!(a.history().len(), 4);

        a.clear();
        assert!(a.history().recent(3).is_empty());
        assert!(a.history().range(0, 10).is_empty());
        assert_eq!(a.history().total_tokens(), 0);
    }

    #[tokio::test]
    async fn failing_summarizer_still_assembles() {
        let summarizer = Arc::new(LlmSummarizer::new(resolved(Arc::new(FailingProvider::network()))));
        let mut a = assembler(BudgetConfig::default(), summarizer);
        fill(&mut a, 4);

        let prompt = a.prepare_context("q", SYSTEM, "ctx").await.unwrap();
        let summary = prompt.summary().unwrap();
        assert!(summary.content.len() > SUMMARY_HEADER.len());
        assert!(summary.content.contains("User: question 0"));
    }

    #[test]
    fn shrink_leaves_fitting_text_alone() {
        let counter = TokenCounter::heuristic();
        assert_eq!(shrink_to_fit(&counter, "short", 10, 100, CONTEXT_TRUNCATION_MARKER), "short");
    }

    #[test]
    fn shrink_hits_target_with_single_marker() {
        let counter = TokenCounter::heuristic();
        let text = "abcd".repeat(500); // 500 tokens
        let out = shrink_to_fit(&counter, &text, 120, 100, SUMMARY_TRUNCATION_MARKER);
        assert!(counter.count(&out) <= 120);
        assert!(out.ends_with(SUMMARY_TRUNCATION_MARKER));
        assert_eq!(out.matches("[Summary truncated").count(), 1);
    }

    #[test]
    fn shrink_stops_at_floor() {
        let counter = TokenCounter::heuristic();
        let text = "x".repeat(1000);
        let out = shrink_to_fit(&counter, &text, 0, 200, CONTEXT_TRUNCATION_MARKER);
        assert_eq!(out, format!("{}{}", "x".repeat(200), CONTEXT_TRUNCATION_MARKER));
    }

    #[test]
    fn shrink_is_char_boundary_safe() {
        let counter = TokenCounter::heuristic();
        let text = "żółw ".repeat(400);
        let out = shrink_to_fit(&counter, &text, 50, 20, CONTEXT_TRUNCATION_MARKER);
        assert!(out.ends_with(CONTEXT_TRUNCATION_MARKER));
        assert!(counter.count(&out) <= 50);
    }

    #[test]
    fn user_turn_template() {
        assert_eq!(
            render_user_turn("C", "Q"),
            "Context:\nC\n\nQuestion: Q\n\nRemember: If the answer is not fully contained in the context, reply ONLY with 'I don't have enough information to answer this question.'"
        );
    }
}
