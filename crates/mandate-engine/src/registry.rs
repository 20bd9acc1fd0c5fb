//! Rule/action registry: keyed stores, dispatch, audit events, probe.
//!
//! The registry holds three maps: the hooked-type table (name to
//! [`TypeRecord`]) and the two entry stores (class scope and instance
//! scope, each name to a fingerprint-keyed entry set). Stores are
//! append-only with set semantics: inserting an entry whose fingerprint
//! is already present is a no-op.
//!
//! Class-scope dispatch runs entries under the exact declaring name
//! against that type's record. Instance-scope dispatch walks the
//! subject's runtime type name and then its hooked ancestors —
//! breadth-first over declared bases, full transitive closure,
//! deduplicated — so a rule attached to a base fires for every subtype
//! and a diamond contributes each ancestor once. Dispatch on a subject
//! whose runtime type was never hooked fails fast with
//! [`EnforcementError::NotHooked`].
//!
//! Mutating operations append structured [`EnforcementEvent`] records
//! with deterministic tick timestamps. Dispatch is a pure read and
//! records nothing, which keeps it shareable under a read lock.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attachment::{ClassEntry, EntryFingerprint, EntrySummary, InstanceEntry, Purpose};
use crate::subject::{Enforced, TypeRecord};
use crate::violation::{error_code, EnforcementError, Scope};

// ---------------------------------------------------------------------------
// Tick — deterministic timestamp
// ---------------------------------------------------------------------------

/// Monotonic logical tick. Not wall-clock time; the registry advances it
/// once per recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tick(pub u64);

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EnforcementEvent — structured audit events
// ---------------------------------------------------------------------------

/// Type of registry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EnforcementEventType {
    TypeHooked,
    TypeRedefined,
    ClassRuleAttached,
    InstanceRuleAttached,
    InstanceActionAttached,
    AttachmentRejected,
}

impl fmt::Display for EnforcementEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TypeHooked => "type_hooked",
            Self::TypeRedefined => "type_redefined",
            Self::ClassRuleAttached => "class_rule_attached",
            Self::InstanceRuleAttached => "instance_rule_attached",
            Self::InstanceActionAttached => "instance_action_attached",
            Self::AttachmentRejected => "attachment_rejected",
        };
        f.write_str(name)
    }
}

/// Outcome of a registry operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventOutcome {
    Success,
    Denied,
    Error,
}

impl fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Denied => "denied",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Structured event emitted by mutating registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementEvent {
    pub event_type: EnforcementEventType,
    /// Component that emitted the event.
    pub component: String,
    pub outcome: EventOutcome,
    /// Type name the operation targeted.
    pub type_name: String,
    /// Predicate name, if the operation involved one.
    pub predicate: Option<String>,
    /// Stable error code, if the operation failed.
    pub error_code: Option<String>,
    pub timestamp: Tick,
}

const COMPONENT: &str = "mandate-registry";

// ---------------------------------------------------------------------------
// ProbeResult — revert-to-boolean adapter output
// ---------------------------------------------------------------------------

/// One rule predicate's outcome under the probe adapter: `passed` instead
/// of raised. Diagnostic only; never use the probe for enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// The ancestor key the entry is attached under.
    pub declared_on: String,
    pub predicate: String,
    /// Hex form of the entry fingerprint.
    pub fingerprint: String,
    pub passed: bool,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The process-lifetime store of hooked types and their entries.
///
/// An owned value with no global instance; callers pass it explicitly or
/// share one behind [`crate::shared::SharedRegistry`]. Growth is
/// monotonic: types and entries are never removed.
#[derive(Debug, Default)]
pub struct Registry {
    types: BTreeMap<String, TypeRecord>,
    class_entries: BTreeMap<String, BTreeMap<EntryFingerprint, ClassEntry>>,
    instance_entries: BTreeMap<String, BTreeMap<EntryFingerprint, InstanceEntry>>,
    events: Vec<EnforcementEvent>,
    clock: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_tick(&mut self) -> Tick {
        self.clock += 1;
        Tick(self.clock)
    }

    fn record(
        &mut self,
        event_type: EnforcementEventType,
        outcome: EventOutcome,
        type_name: &str,
        predicate: Option<&str>,
        code: Option<&'static str>,
    ) {
        let timestamp = self.next_tick();
        self.events.push(EnforcementEvent {
            event_type,
            component: COMPONENT.to_string(),
            outcome,
            type_name: type_name.to_string(),
            predicate: predicate.map(str::to_string),
            error_code: code.map(str::to_string),
            timestamp,
        });
    }

    // -- hooked-type table --------------------------------------------------

    /// Hook a type into the enforcement system, or redefine it.
    ///
    /// Redefinition replaces the record and re-runs every class rule
    /// already keyed under the name against the new record. On failure
    /// the error propagates and the record stays replaced: the caller's
    /// registration call failed, so the type must not be used, but the
    /// registry does not roll back.
    pub fn hook_type(&mut self, record: TypeRecord) -> Result<(), EnforcementError> {
        let name = record.name.clone();
        let redefinition = self.types.contains_key(&name);
        self.types.insert(name.clone(), record);
        let event_type = if redefinition {
            EnforcementEventType::TypeRedefined
        } else {
            EnforcementEventType::TypeHooked
        };
        if redefinition {
            if let Err(err) = self.dispatch_class(&name, Purpose::Rule) {
                self.record(
                    event_type,
                    EventOutcome::Error,
                    &name,
                    None,
                    Some(error_code(&err)),
                );
                return Err(err);
            }
        }
        self.record(event_type, EventOutcome::Success, &name, None, None);
        Ok(())
    }

    pub fn is_hooked(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn type_record(&self, name: &str) -> Option<&TypeRecord> {
        self.types.get(name)
    }

    /// Names of all hooked types, in lexicographic order.
    pub fn hooked_types(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    // -- entry stores -------------------------------------------------------

    /// Insert a class-scope entry; returns whether it was newly inserted.
    ///
    /// Store-level operation with no participation pre-check; the
    /// declarative surface is [`crate::attachment::attach_class_rule`].
    pub fn insert_class_entry(&mut self, key: &str, entry: ClassEntry) -> bool {
        let fingerprint = entry.fingerprint();
        let predicate = entry.predicate().name().to_string();
        let slot = self.class_entries.entry(key.to_string()).or_default();
        if slot.contains_key(&fingerprint) {
            return false;
        }
        slot.insert(fingerprint, entry);
        self.record(
            EnforcementEventType::ClassRuleAttached,
            EventOutcome::Success,
            key,
            Some(&predicate),
            None,
        );
        true
    }

    /// Insert an instance-scope entry; returns whether it was newly
    /// inserted.
    pub fn insert_instance_entry(&mut self, key: &str, entry: InstanceEntry) -> bool {
        let fingerprint = entry.fingerprint();
        let predicate = entry.predicate().name().to_string();
        let event_type = match entry.purpose() {
            Purpose::Rule => EnforcementEventType::InstanceRuleAttached,
            Purpose::Action => EnforcementEventType::InstanceActionAttached,
        };
        let slot = self.instance_entries.entry(key.to_string()).or_default();
        if slot.contains_key(&fingerprint) {
            return false;
        }
        slot.insert(fingerprint, entry);
        self.record(event_type, EventOutcome::Success, key, Some(&predicate), None);
        true
    }

    /// Record a rejected attachment in the audit log. Called by the
    /// attachment layer when the participation pre-check fails.
    pub(crate) fn note_rejected_attachment(
        &mut self,
        type_name: &str,
        predicate: &str,
        err: &EnforcementError,
    ) {
        self.record(
            EnforcementEventType::AttachmentRejected,
            EventOutcome::Denied,
            type_name,
            Some(predicate),
            Some(error_code(err)),
        );
    }

    // -- dispatch -----------------------------------------------------------

    /// Run a single class entry against the named type's record. Used by
    /// the attachment layer's immediate self-check.
    pub fn check_class_entry(&self, key: &str, entry: &ClassEntry) -> Result<(), EnforcementError> {
        let record = self.types.get(key).ok_or_else(|| EnforcementError::NotHooked {
            type_name: key.to_string(),
        })?;
        entry.check(record)
    }

    /// Run every class entry under the exact declaring name whose purpose
    /// matches.
    ///
    /// Class entries are always rules, so `Purpose::Action` matches
    /// nothing and returns `Ok`.
    pub fn dispatch_class(
        &self,
        type_name: &str,
        purpose: Purpose,
    ) -> Result<(), EnforcementError> {
        let record = self
            .types
            .get(type_name)
            .ok_or_else(|| EnforcementError::NotHooked {
                type_name: type_name.to_string(),
            })?;
        if purpose == Purpose::Action {
            return Ok(());
        }
        if let Some(entries) = self.class_entries.get(type_name) {
            for entry in entries.values() {
                entry.check(record)?;
            }
        }
        Ok(())
    }

    /// Run every matching instance entry for the subject's runtime type
    /// and its hooked ancestors.
    ///
    /// Key order is the subject's own type name first, then ancestors
    /// breadth-first in declared-base order, full transitive closure,
    /// each name visited once. Entry order under a single key is
    /// unspecified.
    pub fn dispatch_instance(
        &self,
        subject: &dyn Enforced,
        purpose: Purpose,
    ) -> Result<(), EnforcementError> {
        let name = subject.type_name();
        if !self.types.contains_key(name) {
            return Err(EnforcementError::NotHooked {
                type_name: name.to_string(),
            });
        }
        for key in self.instance_key_order(name) {
            if let Some(entries) = self.instance_entries.get(&key) {
                for entry in entries.values() {
                    if entry.purpose() == purpose {
                        entry.check(subject, &key)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// The subject's type name followed by every hooked ancestor,
    /// breadth-first over declared bases, deduplicated.
    ///
    /// Traversal only follows hooked names: an unhooked base contributes
    /// no key and its record (hence its own bases) is unknown to the
    /// registry.
    fn instance_key_order(&self, type_name: &str) -> Vec<String> {
        let mut order = Vec::new();
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(type_name.to_string());
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(record) = self.types.get(&name) {
                order.push(name);
                for base in &record.bases {
                    queue.push_back(base.clone());
                }
            }
        }
        order
    }

    // -- inspection ---------------------------------------------------------

    /// Summaries of the entries registered under a name and scope.
    pub fn entries(&self, scope: Scope, name: &str) -> Vec<EntrySummary> {
        match scope {
            Scope::Class => self
                .class_entries
                .get(name)
                .map(|slot| slot.values().map(|e| e.summary(name)).collect())
                .unwrap_or_default(),
            Scope::Instance => self
                .instance_entries
                .get(name)
                .map(|slot| slot.values().map(|e| e.summary(name)).collect())
                .unwrap_or_default(),
        }
    }

    pub fn class_entry_count(&self, name: &str) -> usize {
        self.class_entries.get(name).map_or(0, BTreeMap::len)
    }

    pub fn instance_entry_count(&self, name: &str) -> usize {
        self.instance_entries.get(name).map_or(0, BTreeMap::len)
    }

    // -- probe (revert-to-boolean adapter) ----------------------------------

    /// Evaluate every class rule under a name, reporting pass/fail
    /// booleans instead of failing.
    ///
    /// Diagnostic adapter only: production enforcement goes through
    /// dispatch, which always raises on a rule failure.
    pub fn probe_class(&self, name: &str) -> Vec<ProbeResult> {
        let record = self.types.get(name);
        self.class_entries
            .get(name)
            .map(|slot| {
                slot.values()
                    .map(|entry| ProbeResult {
                        declared_on: name.to_string(),
                        predicate: entry.predicate().name().to_string(),
                        fingerprint: entry.fingerprint().to_hex(),
                        passed: record.is_some_and(|r| entry.check(r).is_ok()),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Evaluate every instance rule applicable to a subject, reporting
    /// pass/fail booleans instead of failing. Actions are not probed;
    /// their side effects must not run from a diagnostic path.
    pub fn probe_instance(&self, subject: &dyn Enforced) -> Vec<ProbeResult> {
        let name = subject.type_name();
        let keys = if self.types.contains_key(name) {
            self.instance_key_order(name)
        } else {
            vec![name.to_string()]
        };
        let mut results = Vec::new();
        for key in keys {
            if let Some(entries) = self.instance_entries.get(&key) {
                for entry in entries.values() {
                    if entry.purpose() != Purpose::Rule {
                        continue;
                    }
                    results.push(ProbeResult {
                        declared_on: key.clone(),
                        predicate: entry.predicate().name().to_string(),
                        fingerprint: entry.fingerprint().to_hex(),
                        passed: entry.predicate().evaluate(subject),
                    });
                }
            }
        }
        results
    }

    // -- audit --------------------------------------------------------------

    /// Access the audit event log.
    pub fn audit_log(&self) -> &[EnforcementEvent] {
        &self.events
    }
}
