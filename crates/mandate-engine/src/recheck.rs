//! Method-level re-check hook.
//!
//! Construction-time admission covers the moment an instance is born;
//! these wrappers cover its mutations. A caller opts a specific mutation
//! into re-checking by routing it through [`recheck`] (rules only) or
//! [`recheck_with_actions`] (rules, then actions): the mutation body
//! runs to completion, then the same instance dispatch as admission
//! re-runs.
//!
//! Fail-after-effect semantics: when the post-body rule dispatch fails,
//! the error propagates to the caller but the mutation has already
//! happened. There is no rollback; a caller that needs transactional
//! behavior must snapshot before the body itself.

use crate::attachment::Purpose;
use crate::registry::Registry;
use crate::subject::Enforced;
use crate::violation::EnforcementError;

/// Run a mutation, then re-run the instance rules.
///
/// Returns the body's value when every rule passes.
pub fn recheck<S, R>(
    registry: &Registry,
    subject: &mut S,
    body: impl FnOnce(&mut S) -> R,
) -> Result<R, EnforcementError>
where
    S: Enforced,
{
    let out = body(subject);
    registry.dispatch_instance(&*subject, Purpose::Rule)?;
    Ok(out)
}

/// Run a mutation, re-run the instance rules, then the instance actions.
///
/// The action phase only runs once every rule has passed, matching the
/// admission ordering.
pub fn recheck_with_actions<S, R>(
    registry: &Registry,
    subject: &mut S,
    body: impl FnOnce(&mut S) -> R,
) -> Result<R, EnforcementError>
where
    S: Enforced,
{
    let out = body(subject);
    registry.dispatch_instance(&*subject, Purpose::Rule)?;
    registry.dispatch_instance(&*subject, Purpose::Action)?;
    Ok(out)
}
