//! Lifecycle hook: type-construction and instance-construction events.
//!
//! Participation is explicit. A type registers itself once, at
//! definition/startup time, through [`register`] (or [`register_spec`]
//! when the declaration is built dynamically); the registration runs
//! every class rule already keyed under the name, so a failed
//! registration means the type never becomes usable.
//!
//! The instance event is [`admit`]: a participating constructor builds
//! the value and ends with `admit(registry, value)`, which runs the
//! instance rules (the full hooked ancestor chain), then the instance
//! actions, and only then hands the value back. A rule failure
//! short-circuits the actions and the return, so an invalid instance is
//! never observed by the caller and never reaches action side effects.

use crate::attachment::Purpose;
use crate::registry::Registry;
use crate::subject::{Declared, Enforced, TypeRecord, TypeSpec};
use crate::violation::EnforcementError;

/// Type-construction event for a statically declared type.
///
/// Hooks `T`'s declaration into the registry and dispatches its class
/// rules. Propagates any violation; a type whose registration failed
/// must not be used.
pub fn register<T: Declared>(registry: &mut Registry) -> Result<(), EnforcementError> {
    register_spec(registry, T::declaration())
}

/// Type-construction event for a dynamically built declaration.
///
/// Registering a name twice is redefinition: the record is replaced and
/// the name's class rules re-run against the new declaration.
pub fn register_spec(registry: &mut Registry, spec: TypeSpec) -> Result<(), EnforcementError> {
    let name = spec.name.clone();
    registry.hook_type(TypeRecord::from_spec(spec))?;
    registry.dispatch_class(&name, Purpose::Rule)
}

/// Instance-construction event.
///
/// Runs instance rules, then instance actions, in that order, and
/// returns the value only when the rules pass. Call this as the last
/// step of a participating constructor.
pub fn admit<T: Enforced>(registry: &Registry, value: T) -> Result<T, EnforcementError> {
    registry.dispatch_instance(&value, Purpose::Rule)?;
    registry.dispatch_instance(&value, Purpose::Action)?;
    Ok(value)
}
