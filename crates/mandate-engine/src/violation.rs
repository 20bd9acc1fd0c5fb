//! Error design for rule enforcement.
//!
//! A single [`EnforcementError`] covers the engine's failure vocabulary:
//! rejected attachments (configuration mistakes), rule violations (class or
//! instance scope, with a caller-chosen [`ViolationKind`]), fail-fast
//! dispatch on unregistered types, and action side effects whose own errors
//! propagate untranslated. Every variant maps to a stable machine-readable
//! code via [`error_code`].
//!
//! The engine never converts a rule failure into a boolean outside the
//! probe adapter, and never catches an action's failure.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Whether an entry is dispatched against a type itself or against
/// constructed instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Class,
    Instance,
}

impl Scope {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Instance => "instance",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ViolationKind
// ---------------------------------------------------------------------------

/// Caller-chosen classification of a rule violation.
///
/// `Structural` is the conventional default for class-scope rules (the
/// declared shape of the type is wrong), `Value` for instance-scope rules
/// (the constructed value is out of bounds). `Custom` carries a
/// caller-supplied label for anything else.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Structural,
    Value,
    Custom(String),
}

impl ViolationKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Structural => "structural",
            Self::Value => "value",
            Self::Custom(label) => label,
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EnforcementError
// ---------------------------------------------------------------------------

/// Errors produced by attachment, registration, and dispatch.
#[derive(Debug, Error)]
pub enum EnforcementError {
    /// Attachment requested against a type that is not registered for
    /// enforcement. A rule attached to a non-participating type could
    /// never be dispatched, so this is rejected at attachment time.
    #[error("cannot attach `{predicate}` to {type_name}: type is not registered for enforcement")]
    AttachmentRejected {
        type_name: String,
        predicate: String,
    },

    /// A rule predicate returned `false` for its subject.
    #[error("{}", rule_violation_message(.kind, .scope, .type_name, .declared_on, .predicate, .explanation))]
    RuleViolation {
        kind: ViolationKind,
        scope: Scope,
        /// The subject's runtime type name.
        type_name: String,
        /// The ancestor key the entry was attached under.
        declared_on: String,
        /// The predicate's declared name.
        predicate: String,
        explanation: String,
    },

    /// Dispatch invoked on a subject whose runtime type was never
    /// registered. A programming error, not a data condition.
    #[error("dispatch on {type_name}, which is not registered for enforcement")]
    NotHooked { type_name: String },

    /// An action side effect failed. The effect's own error is the
    /// source, propagated without translation.
    #[error("action `{predicate}` on {type_name} instance failed")]
    ActionFailed {
        type_name: String,
        predicate: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

fn rule_violation_message(
    kind: &ViolationKind,
    scope: &Scope,
    type_name: &str,
    declared_on: &str,
    predicate: &str,
    explanation: &str,
) -> String {
    let mut msg = String::new();
    if !explanation.is_empty() {
        msg.push_str(explanation);
        msg.push(' ');
    }
    msg.push_str(&format!(
        "{type_name} fails {scope} rule `{predicate}` ({kind} violation"
    ));
    if declared_on != type_name {
        msg.push_str(&format!(", declared on {declared_on}"));
    }
    msg.push(')');
    msg
}

/// Stable machine-readable code for an error, suitable for logs and
/// structured events.
pub fn error_code(err: &EnforcementError) -> &'static str {
    match err {
        EnforcementError::AttachmentRejected { .. } => "ENF_ATTACHMENT_REJECTED",
        EnforcementError::RuleViolation { scope, .. } => match scope {
            Scope::Class => "ENF_CLASS_RULE_VIOLATION",
            Scope::Instance => "ENF_INSTANCE_RULE_VIOLATION",
        },
        EnforcementError::NotHooked { .. } => "ENF_NOT_HOOKED",
        EnforcementError::ActionFailed { .. } => "ENF_ACTION_FAILED",
    }
}
