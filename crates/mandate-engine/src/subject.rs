//! Subject capability traits and type declarations.
//!
//! Participation in rule enforcement is explicit: a type opts in by
//! implementing [`Enforced`] (the runtime subject capability) and
//! [`Declared`] (the compile-time declaration), and by being registered
//! with a [`crate::registry::Registry`] before any instance is admitted.
//! There is no implicit object-model hook and no universal root type.
//!
//! Inheritance is modelled as composition: a subtype embeds its base
//! value and projects a view of it through [`Enforced::base_view`], which
//! is how a rule attached to the base type gets typed access to the base
//! portion of a subtype instance.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attr_value::{AttrTable, AttrValue};

// ---------------------------------------------------------------------------
// Enforced — runtime subject capability
// ---------------------------------------------------------------------------

/// Runtime capability of a participating instance.
///
/// Rule dispatch receives subjects as `&dyn Enforced`; typed predicates
/// recover the concrete type through [`Enforced::as_any`] or, for rules
/// declared on an ancestor, through [`Enforced::base_view`].
pub trait Enforced: Any {
    /// The registered display name of the runtime type.
    fn type_name(&self) -> &'static str;

    /// `Any` access for typed predicate downcasts.
    fn as_any(&self) -> &dyn Any;

    /// Project this instance as one of its ancestor types.
    ///
    /// A subtype that embeds its base returns the embedded value when
    /// `ancestor` names it (directly or transitively). Types without
    /// bases keep the default.
    fn base_view(&self, ancestor: &str) -> Option<&dyn Enforced> {
        let _ = ancestor;
        None
    }
}

/// Compile-time declaration of a participating type.
///
/// The constant name is what keys the registry stores; `declaration`
/// produces the [`TypeSpec`] handed to the lifecycle hook at
/// registration time.
pub trait Declared {
    const TYPE_NAME: &'static str;

    fn declaration() -> TypeSpec {
        TypeSpec::new(Self::TYPE_NAME)
    }
}

// ---------------------------------------------------------------------------
// TypeSpec — declaration record
// ---------------------------------------------------------------------------

/// Declaration of a participating type: display name, direct bases in
/// declaration order, and the declaration-time attribute table.
///
/// The registry retains the spec as the type's record; class-scope
/// predicates evaluate against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub name: String,
    /// Direct base type names, in declaration order.
    pub bases: Vec<String>,
    /// Attributes available at declaration time.
    pub attrs: AttrTable,
}

impl TypeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            attrs: AttrTable::new(),
        }
    }

    pub fn base(mut self, name: impl Into<String>) -> Self {
        self.bases.push(name.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    /// Declare a callable attribute.
    pub fn method(self, name: impl Into<String>) -> Self {
        self.attr(name, AttrValue::Method)
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.bases.is_empty() {
            write!(f, "({})", self.bases.join(", "))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TypeRecord — registry-retained form
// ---------------------------------------------------------------------------

/// The record a registry retains for a hooked type.
///
/// Snapshot of the declaration at registration time: display name, direct
/// bases in declaration order, and the declaration-time attribute table.
/// Class-scope dispatch evaluates predicates against this record; instance
/// dispatch walks the base list to build the ancestor key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRecord {
    pub name: String,
    pub bases: Vec<String>,
    pub attrs: AttrTable,
}

impl TypeRecord {
    pub fn from_spec(spec: TypeSpec) -> Self {
        Self {
            name: spec.name,
            bases: spec.bases,
            attrs: spec.attrs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr_value::AttrValue;

    struct Widget {
        #[allow(dead_code)]
        weight: f64,
    }

    impl Declared for Widget {
        const TYPE_NAME: &'static str = "Widget";

        fn declaration() -> TypeSpec {
            TypeSpec::new(Self::TYPE_NAME).attr("weight", AttrValue::Float(0.0))
        }
    }

    impl Enforced for Widget {
        fn type_name(&self) -> &'static str {
            Self::TYPE_NAME
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn spec_builder_accumulates_in_order() {
        let spec = TypeSpec::new("Gadget")
            .base("Widget")
            .base("Serial")
            .method("compute")
            .attr("limit", AttrValue::Int(5));
        assert_eq!(spec.bases, vec!["Widget".to_string(), "Serial".to_string()]);
        assert_eq!(spec.attrs.get("compute"), Some(&AttrValue::Method));
        assert_eq!(spec.attrs.get("limit"), Some(&AttrValue::Int(5)));
    }

    #[test]
    fn default_declaration_is_bare() {
        struct Plain;
        impl Declared for Plain {
            const TYPE_NAME: &'static str = "Plain";
        }
        let spec = Plain::declaration();
        assert_eq!(spec.name, "Plain");
        assert!(spec.bases.is_empty());
        assert!(spec.attrs.is_empty());
    }

    #[test]
    fn base_view_defaults_to_none() {
        let w = Widget { weight: 1.0 };
        assert!(w.base_view("Anything").is_none());
        assert_eq!(w.type_name(), "Widget");
    }

    #[test]
    fn type_spec_serde_roundtrip() {
        let spec = Widget::declaration();
        let json = serde_json::to_string(&spec).unwrap();
        let restored: TypeSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, spec);
    }

    #[test]
    fn spec_display_includes_bases() {
        assert_eq!(TypeSpec::new("Plain").to_string(), "Plain");
        assert_eq!(
            TypeSpec::new("Gadget").base("Widget").base("Serial").to_string(),
            "Gadget(Widget, Serial)"
        );
    }

    #[test]
    fn record_preserves_declaration_order() {
        let record = TypeRecord::from_spec(
            TypeSpec::new("Gadget")
                .base("Widget")
                .base("Serial")
                .attr("limit", AttrValue::Int(5)),
        );
        assert_eq!(record.name, "Gadget");
        assert_eq!(record.bases, vec!["Widget".to_string(), "Serial".to_string()]);
        assert_eq!(record.attrs.get("limit"), Some(&AttrValue::Int(5)));
    }
}
