#![forbid(unsafe_code)]
//! Integration tests for registry dispatch: ancestor propagation, diamond
//! deduplication, key ordering, idempotent attachment, fail-fast on
//! unregistered types, inspection, and the probe adapter.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mandate_engine::{
    attach_instance_rule, register, registry::Registry, AttrValue, Declared, EnforcementError,
    Enforced, InstancePredicate, Purpose, Scope, TypeSpec, ViolationKind,
};

// ---------------------------------------------------------------------------
// Helpers — a composition-modelled diamond: Join -> {Left, Right} -> Root
// ---------------------------------------------------------------------------

struct Root {
    tag: i64,
}

impl Declared for Root {
    const TYPE_NAME: &'static str = "Root";

    fn declaration() -> TypeSpec {
        TypeSpec::new(Self::TYPE_NAME).attr("tag", AttrValue::Int(0))
    }
}

impl Enforced for Root {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct Left {
    root: Root,
}

impl Declared for Left {
    const TYPE_NAME: &'static str = "Left";

    fn declaration() -> TypeSpec {
        TypeSpec::new(Self::TYPE_NAME).base("Root")
    }
}

impl Enforced for Left {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn base_view(&self, ancestor: &str) -> Option<&dyn Enforced> {
        if ancestor == Root::TYPE_NAME {
            Some(&self.root)
        } else {
            None
        }
    }
}

struct Right {
    root: Root,
}

impl Declared for Right {
    const TYPE_NAME: &'static str = "Right";

    fn declaration() -> TypeSpec {
        TypeSpec::new(Self::TYPE_NAME).base("Root")
    }
}

impl Enforced for Right {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn base_view(&self, ancestor: &str) -> Option<&dyn Enforced> {
        if ancestor == Root::TYPE_NAME {
            Some(&self.root)
        } else {
            None
        }
    }
}

struct Join {
    left: Left,
    right: Right,
}

impl Declared for Join {
    const TYPE_NAME: &'static str = "Join";

    fn declaration() -> TypeSpec {
        TypeSpec::new(Self::TYPE_NAME).base("Left").base("Right")
    }
}

impl Enforced for Join {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn base_view(&self, ancestor: &str) -> Option<&dyn Enforced> {
        match ancestor {
            "Left" => Some(&self.left),
            "Right" => Some(&self.right),
            // diamond: the left lineage wins for the shared root
            _ => self
                .left
                .base_view(ancestor)
                .or_else(|| self.right.base_view(ancestor)),
        }
    }
}

fn join(tag_left: i64, tag_right: i64) -> Join {
    Join {
        left: Left {
            root: Root { tag: tag_left },
        },
        right: Right {
            root: Root { tag: tag_right },
        },
    }
}

fn diamond_registry() -> Registry {
    let mut registry = Registry::new();
    register::<Root>(&mut registry).unwrap();
    register::<Left>(&mut registry).unwrap();
    register::<Right>(&mut registry).unwrap();
    register::<Join>(&mut registry).unwrap();
    registry
}

/// An untyped predicate that records a label each time it runs.
fn tracer(label: &str, trace: &Arc<Mutex<Vec<String>>>) -> InstancePredicate {
    let label = label.to_string();
    let trace = Arc::clone(trace);
    InstancePredicate::new(
        format!("trace_{label}"),
        format!("label={label}"),
        move |_| {
            trace.lock().unwrap().push(label.clone());
            true
        },
    )
}

// ===========================================================================
// 1. Ancestor propagation and ordering
// ===========================================================================

#[test]
fn rule_attached_to_base_fires_for_subtype() {
    let mut registry = diamond_registry();
    attach_instance_rule(
        &mut registry,
        "Root",
        InstancePredicate::typed::<Root>("tag_positive", "", |r| r.tag > 0),
        ViolationKind::Value,
        "tag must be positive",
    )
    .unwrap();

    assert!(registry
        .dispatch_instance(&join(1, 2), Purpose::Rule)
        .is_ok());
    let err = registry
        .dispatch_instance(&join(-1, 2), Purpose::Rule)
        .unwrap_err();
    match err {
        EnforcementError::RuleViolation {
            type_name,
            declared_on,
            scope,
            ..
        } => {
            assert_eq!(type_name, "Join");
            assert_eq!(declared_on, "Root");
            assert_eq!(scope, Scope::Instance);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn dispatch_order_is_self_then_bases_breadth_first() {
    let mut registry = diamond_registry();
    let trace = Arc::new(Mutex::new(Vec::new()));
    for name in ["Root", "Left", "Right", "Join"] {
        attach_instance_rule(
            &mut registry,
            name,
            tracer(name, &trace),
            ViolationKind::Value,
            "",
        )
        .unwrap();
    }

    registry
        .dispatch_instance(&join(1, 1), Purpose::Rule)
        .unwrap();
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["Join", "Left", "Right", "Root"]
    );
}

#[test]
fn diamond_ancestor_contributes_once() {
    let mut registry = diamond_registry();
    let fired = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&fired);
    attach_instance_rule(
        &mut registry,
        "Root",
        InstancePredicate::new("count_root_checks", "", move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            true
        }),
        ViolationKind::Value,
        "",
    )
    .unwrap();

    registry
        .dispatch_instance(&join(1, 1), Purpose::Rule)
        .unwrap();
    // reached through both Left and Right, but keyed once under Root
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn mid_hierarchy_instances_skip_sibling_rules() {
    let mut registry = diamond_registry();
    attach_instance_rule(
        &mut registry,
        "Right",
        InstancePredicate::new("reject_everything", "", |_| false),
        ViolationKind::Value,
        "",
    )
    .unwrap();

    // Left's chain is Left -> Root; the Right rule must not apply
    let left = Left {
        root: Root { tag: 1 },
    };
    assert!(registry.dispatch_instance(&left, Purpose::Rule).is_ok());
    assert!(registry
        .dispatch_instance(&join(1, 1), Purpose::Rule)
        .is_err());
}

// ===========================================================================
// 2. Idempotent attachment
// ===========================================================================

#[test]
fn identical_attachment_dedupes() {
    let mut registry = diamond_registry();
    let fired = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let count = Arc::clone(&fired);
        attach_instance_rule(
            &mut registry,
            "Root",
            InstancePredicate::new("counted", "same-config", move |_| {
                count.fetch_add(1, Ordering::SeqCst);
                true
            }),
            ViolationKind::Value,
            "",
        )
        .unwrap();
    }
    assert_eq!(registry.entries(Scope::Instance, "Root").len(), 1);

    registry
        .dispatch_instance(&Root { tag: 1 }, Purpose::Rule)
        .unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn distinct_configurations_are_distinct_entries() {
    let mut registry = diamond_registry();
    for limit in [10i64, 20] {
        attach_instance_rule(
            &mut registry,
            "Root",
            InstancePredicate::typed::<Root>("tag_below", format!("limit={limit}"), move |r| {
                r.tag < limit
            }),
            ViolationKind::Value,
            "",
        )
        .unwrap();
    }
    assert_eq!(registry.entries(Scope::Instance, "Root").len(), 2);
    assert!(registry
        .dispatch_instance(&Root { tag: 5 }, Purpose::Rule)
        .is_ok());
    // 15 passes limit=20 but fails limit=10
    assert!(registry
        .dispatch_instance(&Root { tag: 15 }, Purpose::Rule)
        .is_err());
}

// ===========================================================================
// 3. Fail-fast on unregistered types
// ===========================================================================

struct Stray;

impl Declared for Stray {
    const TYPE_NAME: &'static str = "Stray";
}

impl Enforced for Stray {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn dispatch_on_unregistered_subject_fails_fast() {
    let registry = diamond_registry();
    let err = registry
        .dispatch_instance(&Stray, Purpose::Rule)
        .unwrap_err();
    match err {
        EnforcementError::NotHooked { type_name } => assert_eq!(type_name, "Stray"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn attachment_to_unregistered_name_is_rejected() {
    let mut registry = Registry::new();
    let err = attach_instance_rule(
        &mut registry,
        "Ghost",
        InstancePredicate::new("p", "", |_| true),
        ViolationKind::Value,
        "",
    )
    .unwrap_err();
    assert!(matches!(err, EnforcementError::AttachmentRejected { .. }));
    assert_eq!(mandate_engine::error_code(&err), "ENF_ATTACHMENT_REJECTED");
    // the rejection shows up in the audit log
    let last = registry.audit_log().last().unwrap();
    assert_eq!(last.error_code.as_deref(), Some("ENF_ATTACHMENT_REJECTED"));
}

// ===========================================================================
// 4. Inspection and probe
// ===========================================================================

#[test]
fn entry_summaries_describe_the_attachment() {
    let mut registry = diamond_registry();
    attach_instance_rule(
        &mut registry,
        "Root",
        InstancePredicate::typed::<Root>("tag_positive", "", |r| r.tag > 0),
        ViolationKind::Value,
        "tag must be positive",
    )
    .unwrap();

    let summaries = registry.entries(Scope::Instance, "Root");
    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert_eq!(summary.declared_on, "Root");
    assert_eq!(summary.predicate, "tag_positive");
    assert_eq!(summary.purpose, Purpose::Rule);
    assert_eq!(summary.scope, Scope::Instance);
    assert_eq!(summary.explanation.as_deref(), Some("tag must be positive"));
    assert_eq!(summary.fingerprint.len(), 64);

    let json = serde_json::to_string(&summaries).unwrap();
    let restored: Vec<mandate_engine::EntrySummary> = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, summaries);
}

#[test]
fn probe_walks_the_chain_and_never_fails() {
    let mut registry = diamond_registry();
    attach_instance_rule(
        &mut registry,
        "Root",
        InstancePredicate::typed::<Root>("tag_positive", "", |r| r.tag > 0),
        ViolationKind::Value,
        "",
    )
    .unwrap();
    attach_instance_rule(
        &mut registry,
        "Join",
        InstancePredicate::new("reject_everything", "", |_| false),
        ViolationKind::Value,
        "",
    )
    .unwrap();

    let results = registry.probe_instance(&join(1, 1));
    assert_eq!(results.len(), 2);
    // chain order: Join's entry first, then Root's
    assert_eq!(results[0].declared_on, "Join");
    assert!(!results[0].passed);
    assert_eq!(results[1].declared_on, "Root");
    assert!(results[1].passed);
}

#[test]
fn probe_reflects_dispatch_verdicts() {
    let mut registry = diamond_registry();
    attach_instance_rule(
        &mut registry,
        "Root",
        InstancePredicate::typed::<Root>("tag_positive", "", |r| r.tag > 0),
        ViolationKind::Value,
        "",
    )
    .unwrap();

    let good = Root { tag: 1 };
    let bad = Root { tag: 0 };
    assert!(registry.probe_instance(&good).iter().all(|r| r.passed));
    assert!(registry.probe_instance(&bad).iter().any(|r| !r.passed));
    assert!(registry.dispatch_instance(&good, Purpose::Rule).is_ok());
    assert!(registry.dispatch_instance(&bad, Purpose::Rule).is_err());
}
