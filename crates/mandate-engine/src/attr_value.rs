//! Declaration-time attribute model.
//!
//! A registered type carries an [`AttrTable`] describing the attributes it
//! was declared with: fields, methods, nested lists. Class-scope predicates
//! evaluate against this table rather than against a live value, which is
//! what lets a type be validated at the moment it is declared, before any
//! instance exists.
//!
//! `BTreeMap` for deterministic ordering.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute table: attribute name to declared value.
pub type AttrTable = BTreeMap<String, AttrValue>;

// ---------------------------------------------------------------------------
// AttrValue
// ---------------------------------------------------------------------------

/// A declared attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered list of nested values.
    List(Vec<AttrValue>),
    /// A callable attribute. Only its presence is modelled.
    Method,
    /// An attribute whose value is another type, referenced by name.
    TypeRef(String),
}

impl AttrValue {
    pub fn kind(&self) -> AttrKind {
        match self {
            Self::Bool(_) => AttrKind::Bool,
            Self::Int(_) => AttrKind::Int,
            Self::Float(_) => AttrKind::Float,
            Self::Str(_) => AttrKind::Str,
            Self::List(_) => AttrKind::List,
            Self::Method => AttrKind::Method,
            Self::TypeRef(_) => AttrKind::TypeRef,
        }
    }

    /// Ordering between two values, where one exists.
    ///
    /// `Int` and `Float` cross-compare numerically. `Str`, `Bool`, and
    /// `TypeRef` compare within kind. `List` and `Method` values have no
    /// ordering; the comparison yields `None` and a predicate built on it
    /// evaluates to `false`.
    pub fn compare(&self, other: &AttrValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::TypeRef(a), Self::TypeRef(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Method => write!(f, "<method>"),
            Self::TypeRef(name) => write!(f, "<type {name}>"),
        }
    }
}

// ---------------------------------------------------------------------------
// AttrKind
// ---------------------------------------------------------------------------

/// The kind of a declared attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrKind {
    Bool,
    Int,
    Float,
    Str,
    List,
    Method,
    TypeRef,
}

impl AttrKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::List => "list",
            Self::Method => "method",
            Self::TypeRef => "type_ref",
        }
    }

    /// Whether a value of kind `value_kind` satisfies an expectation of
    /// this kind. `Float` accepts `Int` (numeric widening); everything
    /// else requires an exact match.
    pub fn accepts(self, value_kind: AttrKind) -> bool {
        self == value_kind || (self == Self::Float && value_kind == Self::Int)
    }
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
