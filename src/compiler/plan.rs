use serde::{Deserialize, Serialize};

use crate::core::Value;
use crate::predicate::CompareOp;

/// A column scoped to a table alias within one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
        }
    }
}

/// Right-hand side of a comparison: a literal or a correlated column from
/// an enclosing scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Value(Value),
    Column(ColumnRef),
}

/// An inner join pulled in by a satellite field reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub table: String,
    pub alias: String,
    /// Join condition: `alias.0 = alias.1` column pair.
    pub on: (ColumnRef, ColumnRef),
}

/// A correlated subquery scoped to its own alias. Used for existential
/// tests and for counted rewrites; correlation conditions live inside
/// `where_tree` as column-to-column comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubqueryPlan {
    pub table: String,
    pub alias: String,
    pub where_tree: Box<WhereNode>,
    /// For counted subqueries: count distinct values of this column rather
    /// than rows.
    pub distinct_column: Option<String>,
}

/// Boolean where-clause tree over plan columns. Evaluation follows
/// three-valued semantics: a comparison against NULL is not a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WhereNode {
    Compare {
        lhs: ColumnRef,
        op: CompareOp,
        rhs: Operand,
    },
    Contains {
        lhs: ColumnRef,
        needle: String,
    },
    IsNull(ColumnRef),
    IsNotNull(ColumnRef),
    And(Vec<WhereNode>),
    Or(Vec<WhereNode>),
    Not(Box<WhereNode>),
    Exists(SubqueryPlan),
    /// The subquery's (possibly distinct) row count compared to a constant.
    CorrelatedCount {
        subquery: SubqueryPlan,
        op: CompareOp,
        count: i64,
    },
}

impl WhereNode {
    pub fn eq_value(lhs: ColumnRef, value: impl Into<Value>) -> Self {
        Self::Compare {
            lhs,
            op: CompareOp::Eq,
            rhs: Operand::Value(value.into()),
        }
    }

    pub fn eq_column(lhs: ColumnRef, rhs: ColumnRef) -> Self {
        Self::Compare {
            lhs,
            op: CompareOp::Eq,
            rhs: Operand::Column(rhs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderKey {
    pub column: ColumnRef,
    pub descending: bool,
}

/// Compiled representation of a predicate: root table, joins, where-tree,
/// ordering. Callers may combine further (e.g. append an obsoletion
/// filter) before execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub root_table: String,
    pub root_alias: String,
    pub joins: Vec<Join>,
    pub where_tree: Option<WhereNode>,
    pub order_by: Vec<OrderKey>,
}

impl QueryPlan {
    pub fn new(root_table: impl Into<String>, root_alias: impl Into<String>) -> Self {
        Self {
            root_table: root_table.into(),
            root_alias: root_alias.into(),
            joins: Vec::new(),
            where_tree: None,
            order_by: Vec::new(),
        }
    }

    /// AND another condition onto the plan.
    pub fn and_where(&mut self, node: WhereNode) {
        self.where_tree = Some(match self.where_tree.take() {
            None => node,
            Some(WhereNode::And(mut nodes)) => {
                nodes.push(node);
                WhereNode::And(nodes)
            }
            Some(existing) => WhereNode::And(vec![existing, node]),
        });
    }

    /// Restrict the plan to current versions only.
    pub fn current_only(&mut self) {
        self.and_where(WhereNode::IsNull(ColumnRef::new(
            self.root_alias.clone(),
            "obsoleted_at",
        )));
    }
}
