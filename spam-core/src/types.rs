//! Core domain types for spam
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Component** | A skill or command the host can invoke |
//! | **Source** | Where a component was installed: `user`, `project`, or `plugin:<name>` |
//! | **Scope** | Installation scopes a plugin source was registered under |
//! | **Activation** | One detected invocation of a component |
//! | **Detection method** | How an activation was observed (hook tool call, prompt, bash, transcript) |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================
// Component
// ============================================

/// Kind of component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// A directory holding `SKILL.md`, invoked through the Skill tool
    Skill,
    /// A markdown command file, invoked as `/<name>`
    Command,
}

impl ComponentKind {
    /// Returns the identifier used in database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Skill => "skill",
            ComponentKind::Command => "command",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ComponentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skill" => Ok(ComponentKind::Skill),
            "command" => Ok(ComponentKind::Command),
            _ => Err(format!("unknown component type: {}", s)),
        }
    }
}

/// Lifecycle stage inferred from where a command file lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Active,
    Passive,
    Dev,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Active => "active",
            Lifecycle::Passive => "passive",
            Lifecycle::Dev => "dev",
        }
    }

    /// Map the first directory segment beneath a commands root to a lifecycle.
    ///
    /// Unknown segments fall back to [`Lifecycle::Active`].
    pub fn from_segment(segment: &str) -> Self {
        match segment {
            "active" | "act" => Lifecycle::Active,
            "_dev" => Lifecycle::Dev,
            "passive" => Lifecycle::Passive,
            _ => Lifecycle::Active,
        }
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A discovered skill or command.
///
/// Identity is `(name, source)`. The same name may appear once per source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    /// Set from the snapshot list on load; older snapshots omit it
    #[serde(default = "default_kind")]
    pub kind: ComponentKind,
    /// `user`, `project`, or `plugin:<name>`
    pub source: String,
    /// Comma-joined installation scopes (may be empty)
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Resolved path of the defining markdown file
    #[serde(default)]
    pub definition_path: PathBuf,
    /// Literal substring expected in prompts, `/<name>` (commands only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_pattern: Option<String>,
    /// Companion script next to a symlinked command's target (commands only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_path: Option<PathBuf>,
}

fn default_kind() -> ComponentKind {
    ComponentKind::Skill
}

impl Component {
    /// The `(name, source)` identity key.
    pub fn key(&self) -> (&str, &str) {
        (&self.name, &self.source)
    }
}

// ============================================
// Activations
// ============================================

/// How an activation was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// The dedicated Skill tool named the skill
    ToolCall,
    /// A submitted prompt contained a command's activation pattern
    PromptMatch,
    /// A Bash command string contained a command's script path
    BashMatch,
    /// Backfilled from a session transcript
    Transcript,
}

impl DetectionMethod {
    /// Returns the identifier used in database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::ToolCall => "tool_call",
            DetectionMethod::PromptMatch => "prompt_match",
            DetectionMethod::BashMatch => "bash_match",
            DetectionMethod::Transcript => "transcript",
        }
    }
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DetectionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tool_call" => Ok(DetectionMethod::ToolCall),
            "prompt_match" => Ok(DetectionMethod::PromptMatch),
            "bash_match" => Ok(DetectionMethod::BashMatch),
            "transcript" => Ok(DetectionMethod::Transcript),
            _ => Err(format!("unknown detection method: {}", s)),
        }
    }
}

/// A detected activation, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activation {
    pub name: String,
    pub kind: ComponentKind,
    pub method: DetectionMethod,
}

impl Activation {
    pub fn new(name: impl Into<String>, kind: ComponentKind, method: DetectionMethod) -> Self {
        Self {
            name: name.into(),
            kind,
            method,
        }
    }
}

/// A persisted activation row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationRecord {
    /// Surrogate key assigned by the store
    pub id: i64,
    pub component_name: String,
    pub component_type: ComponentKind,
    pub detection_method: DetectionMethod,
    pub invoked_at: DateTime<Utc>,
}

// ============================================
// Usage
// ============================================

/// Activation counts over the reporting horizons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageCounts {
    /// Records whose UTC date is today's UTC date
    pub today: i64,
    /// Last 7 days
    pub weekly: i64,
    /// Last 30 days
    pub monthly: i64,
    /// Last 365 days
    pub yearly: i64,
    pub all_time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_from_segment() {
        assert_eq!(Lifecycle::from_segment("active"), Lifecycle::Active);
        assert_eq!(Lifecycle::from_segment("act"), Lifecycle::Active);
        assert_eq!(Lifecycle::from_segment("_dev"), Lifecycle::Dev);
        assert_eq!(Lifecycle::from_segment("passive"), Lifecycle::Passive);
        assert_eq!(Lifecycle::from_segment("archive"), Lifecycle::Active);
    }

    #[test]
    fn test_detection_method_round_trips_storage_names() {
        for method in [
            DetectionMethod::ToolCall,
            DetectionMethod::PromptMatch,
            DetectionMethod::BashMatch,
            DetectionMethod::Transcript,
        ] {
            assert_eq!(method.as_str().parse::<DetectionMethod>(), Ok(method));
        }
        assert!("hook".parse::<DetectionMethod>().is_err());
    }

    #[test]
    fn test_component_deserializes_without_newer_fields() {
        let json = r#"{"name": "deploy", "source": "user", "activation_pattern": "/deploy"}"#;
        let component: Component = serde_json::from_str(json).unwrap();

        assert_eq!(component.name, "deploy");
        assert_eq!(component.lifecycle, Lifecycle::Active);
        assert_eq!(component.scope, "");
        assert!(component.script_path.is_none());
    }
}
