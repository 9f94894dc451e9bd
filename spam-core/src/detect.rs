//! Hook event detection
//!
//! Maps one hook payload to at most one [`Activation`]. Checks run in a fixed
//! order and the first match wins:
//!
//! 1. Skill tool call naming a skill
//! 2. Prompt submission containing a command's `/<name>` pattern
//! 3. Bash command string containing a command's companion script path

use crate::catalog::CatalogSnapshot;
use crate::error::Result;
use crate::types::{Activation, ComponentKind, DetectionMethod};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Tool name the host uses when invoking a skill.
pub const SKILL_TOOL: &str = "Skill";
/// Tool name for shell commands.
pub const BASH_TOOL: &str = "Bash";
/// Hook event fired when the user submits a prompt.
pub const PROMPT_SUBMIT_EVENT: &str = "UserPromptSubmit";

/// JSON payload the host passes to a hook on stdin.
///
/// Every field is optional. Fields with unexpected types are read as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HookEvent {
    #[serde(default, deserialize_with = "lenient_string")]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Value,
    #[serde(default, deserialize_with = "lenient_string")]
    pub hook_event_name: Option<String>,
    /// Older payloads carry the event name as `type`
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub record_type: Option<String>,
    /// Bare string or `{"text": ...}`
    #[serde(default)]
    pub prompt: Value,
    /// Event name given on the command line, not part of the payload
    #[serde(skip)]
    pub event_override: Option<String>,
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

impl HookEvent {
    /// Parse a payload. Valid JSON that is not an object yields an empty event.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Attach the event name passed on the command line.
    pub fn with_event_override(mut self, event: impl Into<String>) -> Self {
        self.event_override = Some(event.into());
        self
    }

    /// Whether any of the event name sources says this is a prompt submission.
    pub fn is_prompt_submit(&self) -> bool {
        [&self.hook_event_name, &self.record_type, &self.event_override]
            .into_iter()
            .flatten()
            .any(|name| name == PROMPT_SUBMIT_EVENT)
    }

    fn tool_is(&self, name: &str) -> bool {
        self.tool_name.as_deref() == Some(name)
    }

    fn tool_input_str(&self, key: &str) -> Option<&str> {
        self.tool_input.get(key).and_then(Value::as_str)
    }

    /// Submitted prompt text, or empty when absent or malformed.
    pub fn prompt_text(&self) -> &str {
        match &self.prompt {
            Value::String(text) => text.as_str(),
            Value::Object(map) => map.get("text").and_then(Value::as_str).unwrap_or_default(),
            _ => "",
        }
    }
}

/// Detect the activation a hook event represents, if any.
pub fn detect(event: &HookEvent, catalog: &CatalogSnapshot) -> Option<Activation> {
    if event.tool_is(SKILL_TOOL) {
        if let Some(skill) = event.tool_input_str("skill").filter(|s| !s.is_empty()) {
            return Some(Activation::new(skill, ComponentKind::Skill, DetectionMethod::ToolCall));
        }
    }

    if event.is_prompt_submit() {
        let text = event.prompt_text();
        let matched = catalog.commands.iter().find(|cmd| {
            cmd.activation_pattern
                .as_deref()
                .is_some_and(|pattern| !pattern.is_empty() && text.contains(pattern))
        });
        if let Some(cmd) = matched {
            return Some(Activation::new(
                cmd.name.clone(),
                ComponentKind::Command,
                DetectionMethod::PromptMatch,
            ));
        }
    }

    if event.tool_is(BASH_TOOL) {
        let command = event.tool_input_str("command").unwrap_or_default();
        let matched = catalog.commands.iter().find(|cmd| {
            cmd.script_path
                .as_deref()
                .map(|p| p.to_string_lossy())
                .is_some_and(|script| !script.is_empty() && command.contains(script.as_ref()))
        });
        if let Some(cmd) = matched {
            return Some(Activation::new(
                cmd.name.clone(),
                ComponentKind::Command,
                DetectionMethod::BashMatch,
            ));
        }
    }

    None
}
