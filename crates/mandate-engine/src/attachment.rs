//! Attachment layer: predicate wrappers, rule entries, and the declarative
//! attach operations.
//!
//! A caller attaches a predicate to a registered type name as either a
//! rule (purpose [`Purpose::Rule`]: a `false` result fails the dispatch)
//! or an action (purpose [`Purpose::Action`]: a `false` result triggers a
//! side effect on the instance). Entries are deduplicated by a
//! content-hash fingerprint over (purpose, declared predicate name,
//! configuration description), so re-attaching an identical configuration
//! is a no-op while two differently-configured attachments of the same
//! underlying function remain distinct.
//!
//! Class rules run once immediately at attachment time against the
//! declaring type's record, so a structurally invalid type fails at the
//! point it is declared rather than at first use.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::attr_value::AttrTable;
use crate::registry::Registry;
use crate::subject::{Declared, Enforced, TypeRecord};
use crate::violation::{EnforcementError, Scope, ViolationKind};

// ---------------------------------------------------------------------------
// Purpose
// ---------------------------------------------------------------------------

/// What a `false` predicate result means for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// Failing the predicate fails the dispatch.
    Rule,
    /// Failing the predicate triggers a side effect on the instance.
    Action,
}

impl Purpose {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Action => "action",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Predicate wrappers
// ---------------------------------------------------------------------------

/// A named, configured predicate over a type's declaration.
///
/// Evaluated against the declaring type's [`TypeRecord`] and its
/// declaration-time attribute table. Must be side-effect-free; a subject
/// the predicate cannot interrogate evaluates to `false`, never an error.
#[derive(Clone)]
pub struct ClassPredicate {
    name: String,
    config: String,
    eval: Arc<dyn Fn(&TypeRecord, &AttrTable) -> bool + Send + Sync>,
}

impl ClassPredicate {
    pub fn new(
        name: impl Into<String>,
        config: impl Into<String>,
        eval: impl Fn(&TypeRecord, &AttrTable) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            config: config.into(),
            eval: Arc::new(eval),
        }
    }

    /// The predicate's declared name, used in violation messages and
    /// fingerprints.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description of the closed-over configuration, used for entry
    /// identity.
    pub fn config(&self) -> &str {
        &self.config
    }

    pub fn evaluate(&self, record: &TypeRecord, attrs: &AttrTable) -> bool {
        (self.eval)(record, attrs)
    }
}

impl fmt::Debug for ClassPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassPredicate")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A named, configured predicate over a constructed instance.
///
/// Dispatch hands the subject over as `&dyn Enforced`; typed predicates
/// built with [`InstancePredicate::typed`] recover the concrete type by
/// downcast, falling back to ancestor projection so a predicate attached
/// to a base type evaluates against the embedded base of a subtype
/// instance. An unresolvable subject evaluates to `false`.
#[derive(Clone)]
pub struct InstancePredicate {
    name: String,
    config: String,
    eval: Arc<dyn Fn(&dyn Enforced) -> bool + Send + Sync>,
}

impl InstancePredicate {
    pub fn new(
        name: impl Into<String>,
        config: impl Into<String>,
        eval: impl Fn(&dyn Enforced) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            config: config.into(),
            eval: Arc::new(eval),
        }
    }

    /// Build a predicate over a concrete participating type.
    ///
    /// The subject is resolved by downcast first, then through
    /// [`Enforced::base_view`] under `T`'s registered name, recursively,
    /// so the same predicate works on `T` instances and on instances of
    /// any subtype that embeds a `T`.
    pub fn typed<T: Enforced + Declared>(
        name: impl Into<String>,
        config: impl Into<String>,
        check: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, config, move |subject| {
            match resolve_subject::<T>(subject) {
                Some(value) => check(value),
                None => false,
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &str {
        &self.config
    }

    pub fn evaluate(&self, subject: &dyn Enforced) -> bool {
        (self.eval)(subject)
    }
}

impl fmt::Debug for InstancePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstancePredicate")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn resolve_subject<T: Enforced + Declared>(subject: &dyn Enforced) -> Option<&T> {
    if let Some(value) = subject.as_any().downcast_ref::<T>() {
        return Some(value);
    }
    let view = subject.base_view(T::TYPE_NAME)?;
    resolve_subject::<T>(view)
}

// ---------------------------------------------------------------------------
// SideEffect
// ---------------------------------------------------------------------------

/// The callback an action entry invokes when its predicate fails.
///
/// Receives the instance (never the type). Its `Ok` value is discarded;
/// its error propagates unwrapped as the source of
/// [`EnforcementError::ActionFailed`].
#[derive(Clone)]
pub struct SideEffect {
    name: String,
    run: Arc<dyn Fn(&dyn Enforced) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync>,
}

impl SideEffect {
    pub fn new(
        name: impl Into<String>,
        run: impl Fn(&dyn Enforced) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            run: Arc::new(run),
        }
    }

    /// An effect that cannot fail.
    pub fn infallible(
        name: impl Into<String>,
        run: impl Fn(&dyn Enforced) + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, move |subject| {
            run(subject);
            Ok(())
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invoke(
        &self,
        subject: &dyn Enforced,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (self.run)(subject)
    }
}

impl fmt::Debug for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SideEffect")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EntryFingerprint — content-hash identity
// ---------------------------------------------------------------------------

/// Identity of an entry: SHA-256 over (purpose, declared predicate name,
/// configuration description).
///
/// Identity is by enclosing metadata, not by value equality of the
/// closures themselves: two attachments with distinct configuration are
/// distinct entries even when they wrap the same underlying function,
/// and re-attaching an identical configuration dedupes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryFingerprint([u8; 32]);

impl EntryFingerprint {
    pub fn compute(purpose: Purpose, name: &str, config: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(purpose.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(config.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for byte in &self.0 {
            s.push_str(&format!("{byte:02x}"));
        }
        s
    }
}

impl fmt::Display for EntryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry:{}", self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// A class-scope entry. Always purpose [`Purpose::Rule`]: a side effect
/// takes an instance, never a type, so class-scope actions do not exist.
#[derive(Debug, Clone)]
pub struct ClassEntry {
    predicate: ClassPredicate,
    kind: ViolationKind,
    explanation: String,
    fingerprint: EntryFingerprint,
}

impl ClassEntry {
    pub fn rule(
        predicate: ClassPredicate,
        kind: ViolationKind,
        explanation: impl Into<String>,
    ) -> Self {
        let fingerprint =
            EntryFingerprint::compute(Purpose::Rule, predicate.name(), predicate.config());
        Self {
            predicate,
            kind,
            explanation: explanation.into(),
            fingerprint,
        }
    }

    pub fn predicate(&self) -> &ClassPredicate {
        &self.predicate
    }

    pub fn kind(&self) -> &ViolationKind {
        &self.kind
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn fingerprint(&self) -> EntryFingerprint {
        self.fingerprint
    }

    /// Check the predicate against a record; `Err` carries the entry's
    /// violation kind and explanation.
    pub fn check(&self, record: &TypeRecord) -> Result<(), EnforcementError> {
        if self.predicate.evaluate(record, &record.attrs) {
            Ok(())
        } else {
            Err(EnforcementError::RuleViolation {
                kind: self.kind.clone(),
                scope: Scope::Class,
                type_name: record.name.clone(),
                declared_on: record.name.clone(),
                predicate: self.predicate.name().to_string(),
                explanation: self.explanation.clone(),
            })
        }
    }

    pub fn summary(&self, declared_on: &str) -> EntrySummary {
        EntrySummary {
            declared_on: declared_on.to_string(),
            predicate: self.predicate.name().to_string(),
            config: self.predicate.config().to_string(),
            purpose: Purpose::Rule,
            scope: Scope::Class,
            explanation: Some(self.explanation.clone()).filter(|e| !e.is_empty()),
            fingerprint: self.fingerprint.to_hex(),
        }
    }
}

/// What an instance entry does when its predicate fails.
#[derive(Debug, Clone)]
enum FailureResponse {
    Raise {
        kind: ViolationKind,
        explanation: String,
    },
    Trigger {
        effect: SideEffect,
    },
}

/// An instance-scope entry: a rule that raises on failure, or an action
/// that triggers a side effect on failure.
#[derive(Debug, Clone)]
pub struct InstanceEntry {
    predicate: InstancePredicate,
    response: FailureResponse,
    fingerprint: EntryFingerprint,
}

impl InstanceEntry {
    pub fn rule(
        predicate: InstancePredicate,
        kind: ViolationKind,
        explanation: impl Into<String>,
    ) -> Self {
        let fingerprint =
            EntryFingerprint::compute(Purpose::Rule, predicate.name(), predicate.config());
        Self {
            predicate,
            response: FailureResponse::Raise {
                kind,
                explanation: explanation.into(),
            },
            fingerprint,
        }
    }

    pub fn action(predicate: InstancePredicate, effect: SideEffect) -> Self {
        let fingerprint =
            EntryFingerprint::compute(Purpose::Action, predicate.name(), predicate.config());
        Self {
            predicate,
            response: FailureResponse::Trigger { effect },
            fingerprint,
        }
    }

    pub fn predicate(&self) -> &InstancePredicate {
        &self.predicate
    }

    pub fn purpose(&self) -> Purpose {
        match self.response {
            FailureResponse::Raise { .. } => Purpose::Rule,
            FailureResponse::Trigger { .. } => Purpose::Action,
        }
    }

    pub fn fingerprint(&self) -> EntryFingerprint {
        self.fingerprint
    }

    /// Evaluate against a subject; on a failing rule, `declared_on` is the
    /// ancestor key the entry was found under.
    pub fn check(
        &self,
        subject: &dyn Enforced,
        declared_on: &str,
    ) -> Result<(), EnforcementError> {
        if self.predicate.evaluate(subject) {
            return Ok(());
        }
        match &self.response {
            FailureResponse::Raise { kind, explanation } => {
                Err(EnforcementError::RuleViolation {
                    kind: kind.clone(),
                    scope: Scope::Instance,
                    type_name: subject.type_name().to_string(),
                    declared_on: declared_on.to_string(),
                    predicate: self.predicate.name().to_string(),
                    explanation: explanation.clone(),
                })
            }
            FailureResponse::Trigger { effect } => {
                effect
                    .invoke(subject)
                    .map_err(|source| EnforcementError::ActionFailed {
                        type_name: subject.type_name().to_string(),
                        predicate: self.predicate.name().to_string(),
                        source,
                    })
            }
        }
    }

    pub fn summary(&self, declared_on: &str) -> EntrySummary {
        let explanation = match &self.response {
            FailureResponse::Raise { explanation, .. } if !explanation.is_empty() => {
                Some(explanation.clone())
            }
            _ => None,
        };
        EntrySummary {
            declared_on: declared_on.to_string(),
            predicate: self.predicate.name().to_string(),
            config: self.predicate.config().to_string(),
            purpose: self.purpose(),
            scope: Scope::Instance,
            explanation,
            fingerprint: self.fingerprint.to_hex(),
        }
    }
}

// ---------------------------------------------------------------------------
// EntrySummary — inspection record
// ---------------------------------------------------------------------------

/// Read-only description of a registered entry, for diagnostics export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    /// The type name the entry is keyed under.
    pub declared_on: String,
    pub predicate: String,
    pub config: String,
    pub purpose: Purpose,
    pub scope: Scope,
    pub explanation: Option<String>,
    /// Hex form of the entry fingerprint.
    pub fingerprint: String,
}

// ---------------------------------------------------------------------------
// Attach operations
// ---------------------------------------------------------------------------

/// Attach a class-scope rule to a registered type.
///
/// The entry is inserted, then immediately checked against the type's
/// record, so a structurally invalid type fails here rather than at
/// first use. Attaching to an unregistered name is a configuration
/// error ([`EnforcementError::AttachmentRejected`]).
pub fn attach_class_rule(
    registry: &mut Registry,
    type_name: &str,
    predicate: ClassPredicate,
    kind: ViolationKind,
    explanation: impl Into<String>,
) -> Result<(), EnforcementError> {
    require_hooked(registry, type_name, predicate.name())?;
    let entry = ClassEntry::rule(predicate, kind, explanation);
    registry.insert_class_entry(type_name, entry.clone());
    registry.check_class_entry(type_name, &entry)
}

/// Attach an instance-scope rule to a registered type. Checked on every
/// admitted instance of the type and of any subtype whose ancestor
/// closure contains it; nothing runs at attachment time.
pub fn attach_instance_rule(
    registry: &mut Registry,
    type_name: &str,
    predicate: InstancePredicate,
    kind: ViolationKind,
    explanation: impl Into<String>,
) -> Result<(), EnforcementError> {
    require_hooked(registry, type_name, predicate.name())?;
    let entry = InstanceEntry::rule(predicate, kind, explanation);
    registry.insert_instance_entry(type_name, entry);
    Ok(())
}

/// Attach an instance-scope action: when the predicate fails on an
/// admitted or re-checked instance, the side effect runs with that
/// instance instead of the dispatch failing.
pub fn attach_instance_action(
    registry: &mut Registry,
    type_name: &str,
    predicate: InstancePredicate,
    effect: SideEffect,
) -> Result<(), EnforcementError> {
    require_hooked(registry, type_name, predicate.name())?;
    let entry = InstanceEntry::action(predicate, effect);
    registry.insert_instance_entry(type_name, entry);
    Ok(())
}

fn require_hooked(
    registry: &mut Registry,
    type_name: &str,
    predicate: &str,
) -> Result<(), EnforcementError> {
    if registry.is_hooked(type_name) {
        return Ok(());
    }
    let err = EnforcementError::AttachmentRejected {
        type_name: type_name.to_string(),
        predicate: predicate.to_string(),
    };
    registry.note_rejected_attachment(type_name, predicate, &err);
    Err(err)
}
