use std::cmp::Ordering;
use std::collections::HashSet;

use crate::compiler::{ColumnRef, Operand, QueryPlan, SubqueryPlan, WhereNode};
use crate::config::TotalCountMode;
use crate::core::{EngineError, Result, Row, Value};
use crate::pattern;
use crate::predicate::CompareOp;

use super::store::Tables;
use super::table::Table;

/// One page of base-relation rows plus the (exact or lower-bound) total.
#[derive(Debug)]
pub struct QueryOutcome {
    pub rows: Vec<Row>,
    pub total: usize,
}

/// Alias bindings in scope during where-tree evaluation. Subquery frames
/// are pushed on top of the joined row's frames, so correlated references
/// to enclosing aliases resolve naturally and sibling subqueries never see
/// each other.
struct Env<'a> {
    frames: Vec<(&'a str, &'a Table, &'a Row)>,
}

impl<'a> Env<'a> {
    fn lookup(&self, col: &ColumnRef) -> Result<Value> {
        for (alias, table, row) in self.frames.iter().rev() {
            if *alias == col.alias {
                let idx = table.column_index(&col.column)?;
                return Ok(row[idx].clone());
            }
        }
        Err(EngineError::Execution(format!(
            "unbound alias '{}' in where clause",
            col.alias
        )))
    }
}

/// Execute a compiled plan against a read scope.
pub fn execute_plan<'a>(
    tables: &'a Tables,
    plan: &'a QueryPlan,
    offset: usize,
    limit: usize,
    mode: TotalCountMode,
) -> Result<QueryOutcome> {
    let root = tables.table(&plan.root_table)?;

    // Joined bindings: one frame per alias, root first.
    let mut aliases: Vec<(&str, &Table)> = vec![(plan.root_alias.as_str(), root)];
    for join in &plan.joins {
        aliases.push((join.alias.as_str(), tables.table(&join.table)?));
    }

    let mut bindings: Vec<Vec<&Row>> = root.rows().map(|(_, row)| vec![row]).collect();

    for (join_idx, join) in plan.joins.iter().enumerate() {
        let join_table = aliases[join_idx + 1].1;
        let new_col_idx = join_table.column_index(&join.on.0.column)?;
        let mut next = Vec::with_capacity(bindings.len());

        for binding in bindings {
            let env = Env {
                frames: aliases
                    .iter()
                    .take(join_idx + 1)
                    .zip(binding.iter())
                    .map(|((alias, table), row)| (*alias, *table, *row))
                    .collect(),
            };
            let probe = env.lookup(&join.on.1)?;
            // NULL never joins.
            if probe.is_null() {
                continue;
            }
            for (_, candidate) in join_table.rows() {
                if candidate[new_col_idx] == probe {
                    let mut extended = binding.clone();
                    extended.push(candidate);
                    next.push(extended);
                }
            }
        }
        bindings = next;
    }

    // Filter.
    let mut matches: Vec<Vec<&Row>> = Vec::new();
    for binding in bindings {
        let mut env = Env {
            frames: aliases
                .iter()
                .zip(binding.iter())
                .map(|((alias, table), row)| (*alias, *table, *row))
                .collect(),
        };
        let keep = match &plan.where_tree {
            Some(node) => eval(node, &mut env, tables)?,
            None => true,
        };
        if keep {
            matches.push(binding);
        }
    }

    // Order (NULL sorts last, per Value::compare).
    if !plan.order_by.is_empty() {
        let mut keyed: Vec<(Vec<Value>, Vec<&Row>)> = Vec::with_capacity(matches.len());
        for binding in matches {
            let env = Env {
                frames: aliases
                    .iter()
                    .zip(binding.iter())
                    .map(|((alias, table), row)| (*alias, *table, *row))
                    .collect(),
            };
            let keys = plan
                .order_by
                .iter()
                .map(|k| env.lookup(&k.column))
                .collect::<Result<Vec<_>>>()?;
            keyed.push((keys, binding));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            for (key_idx, order) in plan.order_by.iter().enumerate() {
                let ord = a[key_idx]
                    .compare(&b[key_idx])
                    .unwrap_or(Ordering::Equal);
                let ord = if order.descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        matches = keyed.into_iter().map(|(_, binding)| binding).collect();
    }

    let exact_total = matches.len();
    let total = match mode {
        TotalCountMode::Exact => exact_total,
        // Over-fetch one row past the page instead of counting everything;
        // the reported total is a lower bound.
        TotalCountMode::Fuzzy => exact_total.min(offset + limit + 1),
    };

    let rows = matches
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|binding| binding[0].clone())
        .collect();

    Ok(QueryOutcome { rows, total })
}

fn eval<'a>(node: &'a WhereNode, env: &mut Env<'a>, tables: &'a Tables) -> Result<bool> {
    match node {
        WhereNode::Compare { lhs, op, rhs } => {
            let left = env.lookup(lhs)?;
            let right = match rhs {
                Operand::Value(v) => v.clone(),
                Operand::Column(col) => env.lookup(col)?,
            };
            // A comparison against NULL is never a match.
            if left.is_null() || right.is_null() {
                return Ok(false);
            }
            let ordering = left.compare(&right)?;
            Ok(match op {
                CompareOp::Eq => ordering == Ordering::Equal,
                CompareOp::NotEq => ordering != Ordering::Equal,
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::LtEq => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::GtEq => ordering != Ordering::Less,
            })
        }
        WhereNode::Contains { lhs, needle } => {
            let value = env.lookup(lhs)?;
            match value {
                Value::Null => Ok(false),
                Value::Text(text) => Ok(pattern::contains_match(&text, needle)),
                other => Err(EngineError::TypeMismatch(format!(
                    "contains() applied to {} value",
                    other.type_name()
                ))),
            }
        }
        WhereNode::IsNull(col) => Ok(env.lookup(col)?.is_null()),
        WhereNode::IsNotNull(col) => Ok(!env.lookup(col)?.is_null()),
        WhereNode::And(nodes) => {
            for n in nodes {
                if !eval(n, env, tables)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        WhereNode::Or(nodes) => {
            for n in nodes {
                if eval(n, env, tables)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        WhereNode::Not(inner) => Ok(!eval(inner, env, tables)?),
        WhereNode::Exists(sub) => {
            let mut found = false;
            scan_subquery(sub, env, tables, &mut |_| {
                found = true;
                false // stop at first match
            })?;
            Ok(found)
        }
        WhereNode::CorrelatedCount {
            subquery,
            op,
            count,
        } => {
            let observed = if let Some(distinct) = &subquery.distinct_column {
                let table = tables.table(&subquery.table)?;
                let idx = table.column_index(distinct)?;
                let mut seen: HashSet<Value> = HashSet::new();
                scan_subquery(subquery, env, tables, &mut |row| {
                    seen.insert(row[idx].clone());
                    true
                })?;
                seen.len() as i64
            } else {
                let mut n = 0i64;
                scan_subquery(subquery, env, tables, &mut |_| {
                    n += 1;
                    true
                })?;
                n
            };
            Ok(match op {
                CompareOp::Eq => observed == *count,
                CompareOp::NotEq => observed != *count,
                CompareOp::Lt => observed < *count,
                CompareOp::LtEq => observed <= *count,
                CompareOp::Gt => observed > *count,
                CompareOp::GtEq => observed >= *count,
            })
        }
    }
}

/// Run `visit` for every subquery row satisfying the subquery's where tree,
/// with the row bound under the subquery's alias. `visit` returns false to
/// stop early.
fn scan_subquery<'a>(
    sub: &'a SubqueryPlan,
    env: &mut Env<'a>,
    tables: &'a Tables,
    visit: &mut dyn FnMut(&Row) -> bool,
) -> Result<()> {
    let table = tables.table(&sub.table)?;
    for (_, row) in table.rows() {
        env.frames.push((sub.alias.as_str(), table, row));
        let matched = eval(&sub.where_tree, env, tables);
        env.frames.pop();
        if matched? && !visit(row) {
            break;
        }
    }
    Ok(())
}
