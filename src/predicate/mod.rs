use serde::{Deserialize, Serialize};

use crate::core::Value;

/// Child collections a predicate can quantify over. `Components` is only
/// navigable from inside a `Names` existential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionPath {
    Identifiers,
    Names,
    Components,
    Relationships,
    Tags,
}

impl CollectionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identifiers => "identifiers",
            Self::Names => "names",
            Self::Components => "components",
            Self::Relationships => "relationships",
            Self::Tags => "tags",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

/// Typed boolean predicate over a domain type. A closed set of node
/// variants; the compiler is a recursive descent over this sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// Substring match on a text field.
    Contains {
        field: String,
        needle: String,
    },
    IsNull {
        field: String,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// `exists child in collection: inner`, optionally filtered by a guard
    /// on the collection before the existential applies.
    Exists {
        collection: CollectionPath,
        guard: Option<Box<Predicate>>,
        inner: Box<Predicate>,
    },
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op: CompareOp::NotEq,
            value: value.into(),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op: CompareOp::Lt,
            value: value.into(),
        }
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op: CompareOp::Gt,
            value: value.into(),
        }
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::Contains {
            field: field.into(),
            needle: needle.into(),
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull {
            field: field.into(),
        }
    }

    pub fn and(predicates: Vec<Predicate>) -> Self {
        Self::And(predicates)
    }

    pub fn or(predicates: Vec<Predicate>) -> Self {
        Self::Or(predicates)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Predicate) -> Self {
        Self::Not(Box::new(predicate))
    }

    /// Unguarded existential: `collection.any(inner)`.
    pub fn any(collection: CollectionPath, inner: Predicate) -> Self {
        Self::Exists {
            collection,
            guard: None,
            inner: Box::new(inner),
        }
    }

    /// Guarded existential: `collection.where(guard).any(inner)`. The guard
    /// filters the collection before the existential is tested, which is not
    /// the same as `any(guard AND inner)` once hacks or negation enter.
    pub fn any_where(collection: CollectionPath, guard: Predicate, inner: Predicate) -> Self {
        Self::Exists {
            collection,
            guard: Some(Box::new(guard)),
            inner: Box::new(inner),
        }
    }
}

/// One ordering key for a compiled plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub field: String,
    pub descending: bool,
}

impl OrderSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}
