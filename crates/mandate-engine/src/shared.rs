//! Thread-safe façade over an owned [`Registry`].
//!
//! The registry itself is a plain owned value; callers who want one
//! process-wide instance share it through [`SharedRegistry`], a
//! reader-writer-locked handle. Registration and attachment (the write
//! path, normally confined to definition/startup time) take the write
//! lock; admission, re-check, probe, and inspection (the read path) take
//! the read lock and can proceed concurrently.
//!
//! Lock poisoning is absorbed: the stores are append-only, so a panicked
//! holder cannot leave them in a state readers would observe as
//! corrupt.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::attachment::{
    attach_class_rule, attach_instance_action, attach_instance_rule, ClassPredicate,
    EntrySummary, InstancePredicate, SideEffect,
};
use crate::lifecycle;
use crate::registry::{EnforcementEvent, ProbeResult, Registry};
use crate::subject::{Declared, Enforced, TypeSpec};
use crate::violation::{EnforcementError, Scope, ViolationKind};

/// Cloneable handle to a shared registry.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<Registry>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // -- write path ---------------------------------------------------------

    pub fn register<T: Declared>(&self) -> Result<(), EnforcementError> {
        lifecycle::register::<T>(&mut self.write())
    }

    pub fn register_spec(&self, spec: TypeSpec) -> Result<(), EnforcementError> {
        lifecycle::register_spec(&mut self.write(), spec)
    }

    pub fn attach_class_rule(
        &self,
        type_name: &str,
        predicate: ClassPredicate,
        kind: ViolationKind,
        explanation: impl Into<String>,
    ) -> Result<(), EnforcementError> {
        attach_class_rule(&mut self.write(), type_name, predicate, kind, explanation)
    }

    pub fn attach_instance_rule(
        &self,
        type_name: &str,
        predicate: InstancePredicate,
        kind: ViolationKind,
        explanation: impl Into<String>,
    ) -> Result<(), EnforcementError> {
        attach_instance_rule(&mut self.write(), type_name, predicate, kind, explanation)
    }

    pub fn attach_instance_action(
        &self,
        type_name: &str,
        predicate: InstancePredicate,
        effect: SideEffect,
    ) -> Result<(), EnforcementError> {
        attach_instance_action(&mut self.write(), type_name, predicate, effect)
    }

    // -- read path ----------------------------------------------------------

    pub fn admit<T: Enforced>(&self, value: T) -> Result<T, EnforcementError> {
        lifecycle::admit(&self.read(), value)
    }

    pub fn recheck<S: Enforced, R>(
        &self,
        subject: &mut S,
        body: impl FnOnce(&mut S) -> R,
    ) -> Result<R, EnforcementError> {
        crate::recheck::recheck(&self.read(), subject, body)
    }

    pub fn recheck_with_actions<S: Enforced, R>(
        &self,
        subject: &mut S,
        body: impl FnOnce(&mut S) -> R,
    ) -> Result<R, EnforcementError> {
        crate::recheck::recheck_with_actions(&self.read(), subject, body)
    }

    pub fn is_hooked(&self, name: &str) -> bool {
        self.read().is_hooked(name)
    }

    pub fn entries(&self, scope: Scope, name: &str) -> Vec<EntrySummary> {
        self.read().entries(scope, name)
    }

    pub fn probe_class(&self, name: &str) -> Vec<ProbeResult> {
        self.read().probe_class(name)
    }

    pub fn probe_instance(&self, subject: &dyn Enforced) -> Vec<ProbeResult> {
        self.read().probe_instance(subject)
    }

    /// Snapshot of the audit event log.
    pub fn audit_log(&self) -> Vec<EnforcementEvent> {
        self.read().audit_log().to_vec()
    }
}
