#![forbid(unsafe_code)]
//! Declarative invariant enforcement: rules and actions attached to
//! types, dispatched automatically at type registration, instance
//! admission, and opt-in method re-check.
//!
//! A participating type implements [`subject::Declared`] and
//! [`subject::Enforced`] and registers itself with a
//! [`registry::Registry`] via [`lifecycle::register`]. Callers then
//! attach entries through the [`attachment`] operations: class rules
//! validate the declaration itself (and run once, immediately, at
//! attachment time), instance rules validate every admitted value across
//! the type's full hooked ancestor chain, and instance actions trigger a
//! side effect instead of failing. A participating constructor ends with
//! [`lifecycle::admit`]; mutations opt into re-validation through
//! [`recheck`].
//!
//! The registry is an explicit value, not a global; share one across
//! threads with [`shared::SharedRegistry`]. Entry identity is a content
//! hash over (purpose, predicate name, configuration), which gives
//! attachment set semantics: identical re-attachment is a no-op,
//! differently-configured attachments of the same function are distinct.

pub mod attachment;
pub mod attr_value;
pub mod lifecycle;
pub mod predicate;
pub mod recheck;
pub mod registry;
pub mod shared;
pub mod subject;
pub mod violation;

pub use attachment::{
    attach_class_rule, attach_instance_action, attach_instance_rule, ClassPredicate,
    EntryFingerprint, EntrySummary, InstancePredicate, Purpose, SideEffect,
};
pub use attr_value::{AttrKind, AttrTable, AttrValue};
pub use lifecycle::{admit, register, register_spec};
pub use predicate::Cmp;
pub use recheck::{recheck, recheck_with_actions};
pub use registry::{ProbeResult, Registry};
pub use shared::SharedRegistry;
pub use subject::{Declared, Enforced, TypeRecord, TypeSpec};
pub use violation::{error_code, EnforcementError, Scope, ViolationKind};
