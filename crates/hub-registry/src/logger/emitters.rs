//! Typed emitters over [`EventLogger::emit`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use hub_core::CorrelationId;
use hub_core::constants::TOOL_PAYLOAD_MAX_CHARS;

use super::EventLogger;
use crate::entry::{Fields, LogLevel, truncate_chars};
use crate::errors::Result;

/// Optional context recorded with a decision.
#[derive(Clone, Debug, Default)]
pub struct Decision {
    /// Why this option was chosen.
    pub rationale: Option<String>,
    /// Options that were considered and rejected.
    pub alternatives: Vec<String>,
    /// Thinking budget spent on the decision.
    pub thinking_budget: Option<u64>,
    /// Additional caller fields.
    pub extra: Fields,
}

impl Decision {
    /// A decision with a rationale.
    #[must_use]
    pub fn because(rationale: impl Into<String>) -> Self {
        Self {
            rationale: Some(rationale.into()),
            ..Self::default()
        }
    }
}

/// Optional context recorded when a child agent is spawned.
#[derive(Clone, Debug, Default)]
pub struct Spawn {
    /// Task handed to the child.
    pub task: Option<String>,
    /// What prompted extended thinking, if anything.
    pub thinking_trigger: Option<String>,
    /// Additional caller fields.
    pub extra: Fields,
}

/// Optional context recorded with a handoff.
#[derive(Clone, Debug, Default)]
pub struct Handoff {
    /// Decisions the receiving agent must honor.
    pub critical_decisions: Vec<String>,
    /// Questions left unresolved.
    pub open_questions: Vec<String>,
    /// Files the receiver should read first.
    pub files_to_review: Vec<String>,
    /// Size of the handoff summary.
    pub summary_tokens: Option<u64>,
    /// Additional caller fields.
    pub extra: Fields,
}

/// How serious an escalation is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Work cannot proceed without input.
    #[default]
    Blocked,
    /// The agent is unsure how to proceed.
    Uncertain,
    /// A security concern; logged at `error`.
    Security,
}

impl Severity {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Uncertain => "uncertain",
            Self::Security => "security",
        }
    }

    fn level(self) -> LogLevel {
        match self {
            Self::Security => LogLevel::Error,
            Self::Blocked | Self::Uncertain => LogLevel::Warn,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn put(fields: &mut Fields, key: &str, value: Value) {
    let _ = fields.insert(key.to_string(), value);
}

fn put_list(fields: &mut Fields, key: &str, values: Vec<String>) {
    if !values.is_empty() {
        put(fields, key, json!(values));
    }
}

fn put_opt<T: Serialize>(fields: &mut Fields, key: &str, value: Option<T>) {
    if let Some(value) = value {
        put(fields, key, json!(value));
    }
}

/// Named fields take their positions first; caller extras follow.
fn with_extra(mut fields: Fields, extra: Fields) -> Fields {
    for (key, value) in extra {
        let _ = fields.entry(key).or_insert(value);
    }
    fields
}

impl EventLogger {
    /// `task.started` at info.
    pub fn task_started(&mut self, description: &str, fields: Fields) -> Result<CorrelationId> {
        self.emit(LogLevel::Info, "task.started", description, None, fields)
    }

    /// `task.completed` at info.
    pub fn task_completed(&mut self, description: &str, fields: Fields) -> Result<CorrelationId> {
        self.emit(LogLevel::Info, "task.completed", description, None, fields)
    }

    /// `decision.made` at info. Empty context fields are omitted.
    pub fn decision_made(&mut self, decision: &str, context: Decision) -> Result<CorrelationId> {
        let mut fields = Fields::new();
        put_opt(&mut fields, "rationale", context.rationale.filter(|r| !r.is_empty()));
        put_list(&mut fields, "alternatives", context.alternatives);
        put_opt(&mut fields, "thinking_budget", context.thinking_budget.filter(|b| *b > 0));
        let fields = with_extra(fields, context.extra);
        self.emit(LogLevel::Info, "decision.made", decision, None, fields)
    }

    /// `agent.spawned` at info.
    pub fn agent_spawned(&mut self, child: &str, context: Spawn) -> Result<CorrelationId> {
        let mut fields = Fields::new();
        put(&mut fields, "child_aid", json!(child));
        put_opt(&mut fields, "task", context.task.filter(|t| !t.is_empty()));
        put_opt(
            &mut fields,
            "thinking_trigger",
            context.thinking_trigger.filter(|t| !t.is_empty()),
        );
        let fields = with_extra(fields, context.extra);
        self.emit(LogLevel::Info, "agent.spawned", &format!("Spawned {child}"), None, fields)
    }

    /// `handoff.initiated` at info.
    pub fn handoff(&mut self, target: &str, context: Handoff) -> Result<CorrelationId> {
        let mut fields = Fields::new();
        put(&mut fields, "target_aid", json!(target));
        put_list(&mut fields, "critical_decisions", context.critical_decisions);
        put_list(&mut fields, "open_questions", context.open_questions);
        put_list(&mut fields, "files_to_review", context.files_to_review);
        put_opt(&mut fields, "summary_tokens", context.summary_tokens.filter(|t| *t > 0));
        let fields = with_extra(fields, context.extra);
        self.emit(
            LogLevel::Info,
            "handoff.initiated",
            &format!("Handoff to {target}"),
            None,
            fields,
        )
    }

    /// `escalation.raised`, at error for [`Severity::Security`] and warn
    /// otherwise.
    pub fn escalation(
        &mut self,
        reason: &str,
        severity: Severity,
        context: Option<&str>,
    ) -> Result<CorrelationId> {
        let mut fields = Fields::new();
        put(&mut fields, "severity", json!(severity.as_str()));
        put_opt(&mut fields, "context", context.filter(|c| !c.is_empty()));
        self.emit(severity.level(), "escalation.raised", reason, None, fields)
    }

    /// `hook.pre_tool` at debug. The input is stringified and capped.
    pub fn pre_tool(&mut self, tool_name: &str, input: impl fmt::Display) -> Result<CorrelationId> {
        let mut fields = Fields::new();
        put(&mut fields, "tool_name", json!(tool_name));
        put(
            &mut fields,
            "tool_input",
            json!(truncate_chars(&input.to_string(), TOOL_PAYLOAD_MAX_CHARS)),
        );
        self.emit(
            LogLevel::Debug,
            "hook.pre_tool",
            &format!("Executing {tool_name}"),
            None,
            fields,
        )
    }

    /// `hook.post_tool` at debug. The result is stringified and capped.
    pub fn post_tool(
        &mut self,
        tool_name: &str,
        result: impl fmt::Display,
        duration_ms: Option<u64>,
    ) -> Result<CorrelationId> {
        let mut fields = Fields::new();
        put(&mut fields, "tool_name", json!(tool_name));
        put(
            &mut fields,
            "tool_result",
            json!(truncate_chars(&result.to_string(), TOOL_PAYLOAD_MAX_CHARS)),
        );
        put_opt(&mut fields, "duration_ms", duration_ms);
        self.emit(
            LogLevel::Debug,
            "hook.post_tool",
            &format!("Completed {tool_name}"),
            None,
            fields,
        )
    }

    /// `context.compacted` at info.
    pub fn context_compacted(
        &mut self,
        tokens_before: u64,
        tokens_after: u64,
        preserved_decisions: Vec<String>,
    ) -> Result<CorrelationId> {
        let saved = i64::try_from(tokens_before)
            .unwrap_or(i64::MAX)
            .saturating_sub(i64::try_from(tokens_after).unwrap_or(i64::MAX));
        let mut fields = Fields::new();
        put(&mut fields, "tokens_before", json!(tokens_before));
        put(&mut fields, "tokens_after", json!(tokens_after));
        put(&mut fields, "tokens_saved", json!(saved));
        put(&mut fields, "preserved_decisions", json!(preserved_decisions));
        self.emit(
            LogLevel::Info,
            "context.compacted",
            &format!("Compacted context: {tokens_before} → {tokens_after}"),
            None,
            fields,
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
