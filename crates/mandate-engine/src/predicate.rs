//! Predicate library over the declaration-time attribute model.
//!
//! Pure builders producing [`ClassPredicate`] values that answer a single
//! structural question about a declared type: does an attribute exist
//! with the expected kind, does it compare against a reference value
//! under a caller-supplied operator, does a list attribute carry minimum
//! per-kind element counts. Lookup goes to the supplied attribute table
//! (the declaration-time fallback), so these work on a type while it is
//! being declared; a predicate that cannot find its attribute returns
//! `false`, never an error.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attachment::ClassPredicate;
use crate::attr_value::{AttrKind, AttrTable, AttrValue};

// ---------------------------------------------------------------------------
// Cmp — comparison operator
// ---------------------------------------------------------------------------

/// Comparison operator applied between an attribute and a reference
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cmp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Cmp {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    /// Whether an observed ordering satisfies this operator.
    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            Self::Lt => ordering == Less,
            Self::Le => ordering != Greater,
            Self::Gt => ordering == Greater,
            Self::Ge => ordering != Less,
            Self::Eq => ordering == Equal,
            Self::Ne => ordering != Equal,
        }
    }
}

impl fmt::Display for Cmp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn lookup<'a>(table: &'a AttrTable, attr: &str) -> Option<&'a AttrValue> {
    table.get(attr)
}

/// The attribute exists and its kind matches the expectation.
///
/// `AttrKind::Float` accepts `Int` (numeric widening).
pub fn attr_of_kind(attr: impl Into<String>, kind: AttrKind) -> ClassPredicate {
    let attr = attr.into();
    let config = format!("attr={attr} kind={kind}");
    ClassPredicate::new("attr_of_kind", config, move |_, attrs| {
        lookup(attrs, &attr).is_some_and(|value| kind.accepts(value.kind()))
    })
}

/// The attribute exists, is kind-compatible with the reference, and the
/// comparison against the reference holds.
///
/// Incomparable values (kind mismatch, or kinds with no ordering) make
/// the predicate `false`, including under `Cmp::Ne`.
pub fn attr_compares(attr: impl Into<String>, cmp: Cmp, reference: AttrValue) -> ClassPredicate {
    let attr = attr.into();
    let config = format!("attr={attr} cmp={cmp} reference={reference}");
    ClassPredicate::new("attr_compares", config, move |_, attrs| {
        let Some(value) = lookup(attrs, &attr) else {
            return false;
        };
        if !reference.kind().accepts(value.kind()) {
            return false;
        }
        value
            .compare(&reference)
            .is_some_and(|ordering| cmp.holds(ordering))
    })
}

/// The attribute is a list containing at least the given number of
/// elements of each kind (multiset comparison).
pub fn list_min_counts(
    attr: impl Into<String>,
    minima: BTreeMap<AttrKind, usize>,
) -> ClassPredicate {
    let attr = attr.into();
    let config = {
        let wanted: Vec<String> = minima
            .iter()
            .map(|(kind, min)| format!("{kind}>={min}"))
            .collect();
        format!("attr={attr} counts[{}]", wanted.join(" "))
    };
    ClassPredicate::new("list_min_counts", config, move |_, attrs| {
        let Some(AttrValue::List(items)) = lookup(attrs, &attr) else {
            return false;
        };
        let mut counts: BTreeMap<AttrKind, usize> = BTreeMap::new();
        for item in items {
            *counts.entry(item.kind()).or_default() += 1;
        }
        minima
            .iter()
            .all(|(kind, min)| counts.get(kind).copied().unwrap_or(0) >= *min)
    })
}
