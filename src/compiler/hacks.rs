use log::debug;

use crate::core::Value;
use crate::mapping::MappingRegistry;
use crate::model::RecordType;
use crate::predicate::{CollectionPath, CompareOp, Predicate};

use super::compiler::{correlation, visibility_window, AliasGen};
use super::plan::{ColumnRef, Operand, SubqueryPlan, WhereNode};

/// Compilation state a hack may draw on when rewriting a fragment.
pub struct HackContext<'a> {
    pub mapping: &'a MappingRegistry,
    pub rtype: RecordType,
    /// Alias of the scope the fragment appears in.
    pub outer_alias: &'a str,
    /// Alias of the base relation row (for versioned visibility bounds).
    pub root_alias: &'a str,
    pub aliases: &'a mut AliasGen,
}

/// An optional rewrite strategy for one specific predicate shape. Hacks are
/// consulted in registration order before the generic compiler handles an
/// existential fragment; the first hack returning a rewritten node wins.
/// No hack matching is never an error: the generic path is always correct,
/// just slower for the shapes hacks exist for.
pub trait QueryHack: Send + Sync {
    fn name(&self) -> &'static str;

    fn try_rewrite(&self, fragment: &Predicate, ctx: &mut HackContext<'_>) -> Option<WhereNode>;
}

/// Ordered set of rewrite strategies, built once at startup and immutable
/// afterwards.
pub struct HackRegistry {
    hacks: Vec<Box<dyn QueryHack>>,
}

impl HackRegistry {
    /// Empty registry: every fragment takes the generic path.
    pub fn new() -> Self {
        Self { hacks: Vec::new() }
    }

    /// Registry with the stock rewrites.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(NameComponentPairHack));
        registry
    }

    pub fn register(&mut self, hack: Box<dyn QueryHack>) {
        self.hacks.push(hack);
    }

    pub fn rewrite(&self, fragment: &Predicate, ctx: &mut HackContext<'_>) -> Option<WhereNode> {
        for hack in &self.hacks {
            if let Some(node) = hack.try_rewrite(fragment, ctx) {
                debug!(target: "chartstore::hacks", "hack '{}' rewrote a fragment", hack.name());
                return Some(node);
            }
        }
        None
    }
}

impl Default for HackRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Rewrites "a name has component kind=K1 with value V1 AND component
/// kind=K2 with value V2 (...)" from the generic nested-EXISTS-per-pair
/// form into a single correlated subquery over `name_component` that counts
/// distinct matching kinds. One component scan instead of one per pair.
pub struct NameComponentPairHack;

/// One required (kind, value) pair extracted from a component existential.
struct ComponentPair {
    kind: String,
    value: String,
}

impl NameComponentPairHack {
    /// Matches `Exists{Components, guard: None, inner: kind = K && value = V}`
    /// in either conjunct order.
    fn extract_pair(predicate: &Predicate) -> Option<ComponentPair> {
        let Predicate::Exists {
            collection: CollectionPath::Components,
            guard: None,
            inner,
        } = predicate
        else {
            return None;
        };
        let Predicate::And(parts) = inner.as_ref() else {
            return None;
        };
        if parts.len() != 2 {
            return None;
        }

        let mut kind = None;
        let mut value = None;
        for part in parts {
            match part {
                Predicate::Compare {
                    field,
                    op: CompareOp::Eq,
                    value: Value::Text(v),
                } if field == "kind" => kind = Some(v.clone()),
                Predicate::Compare {
                    field,
                    op: CompareOp::Eq,
                    value: Value::Text(v),
                } if field == "value" => value = Some(v.clone()),
                _ => return None,
            }
        }
        Some(ComponentPair {
            kind: kind?,
            value: value?,
        })
    }

    /// A guard the hack can compile on its own: a single equality on a name
    /// field. Anything richer falls back to the generic path.
    fn compile_simple_guard(
        guard: &Predicate,
        ctx: &HackContext<'_>,
        name_alias: &str,
    ) -> Option<WhereNode> {
        let Predicate::Compare {
            field,
            op: CompareOp::Eq,
            value,
        } = guard
        else {
            return None;
        };
        let column = ctx.mapping.collection_field(CollectionPath::Names, field)?;
        Some(WhereNode::Compare {
            lhs: ColumnRef::new(name_alias, column),
            op: CompareOp::Eq,
            rhs: Operand::Value(value.clone()),
        })
    }
}

impl QueryHack for NameComponentPairHack {
    fn name(&self) -> &'static str {
        "name-component-pair"
    }

    fn try_rewrite(&self, fragment: &Predicate, ctx: &mut HackContext<'_>) -> Option<WhereNode> {
        let Predicate::Exists {
            collection: CollectionPath::Names,
            guard,
            inner,
        } = fragment
        else {
            return None;
        };
        let Predicate::And(parts) = inner.as_ref() else {
            return None;
        };
        if parts.len() < 2 {
            return None;
        }

        let pairs: Vec<ComponentPair> = parts
            .iter()
            .map(Self::extract_pair)
            .collect::<Option<Vec<_>>>()?;

        // Counting distinct kinds is only equivalent when every required
        // kind is distinct.
        let mut kinds: Vec<&str> = pairs.iter().map(|p| p.kind.as_str()).collect();
        kinds.sort_unstable();
        kinds.dedup();
        if kinds.len() != pairs.len() {
            return None;
        }

        let name_alias = ctx.aliases.next();
        let comp_alias = ctx.aliases.next();
        let names = ctx.mapping.association(CollectionPath::Names);
        let components = ctx.mapping.association(CollectionPath::Components);

        let mut name_conditions = vec![
            correlation(names, &name_alias, ctx.outer_alias),
            visibility_window(&name_alias, ctx.root_alias),
        ];
        if let Some(guard) = guard {
            name_conditions.push(Self::compile_simple_guard(guard, ctx, &name_alias)?);
        }

        let pair_alternatives: Vec<WhereNode> = pairs
            .iter()
            .map(|pair| {
                WhereNode::And(vec![
                    WhereNode::eq_value(
                        ColumnRef::new(comp_alias.clone(), "kind"),
                        pair.kind.clone(),
                    ),
                    WhereNode::eq_value(
                        ColumnRef::new(comp_alias.clone(), "comp_value"),
                        pair.value.clone(),
                    ),
                ])
            })
            .collect();

        name_conditions.push(WhereNode::CorrelatedCount {
            subquery: SubqueryPlan {
                table: ctx.mapping.table(components.table).name.to_string(),
                alias: comp_alias.clone(),
                where_tree: Box::new(WhereNode::And(vec![
                    correlation(components, &comp_alias, &name_alias),
                    WhereNode::Or(pair_alternatives),
                ])),
                distinct_column: Some("kind".to_string()),
            },
            op: CompareOp::Eq,
            count: pairs.len() as i64,
        });

        Some(WhereNode::Exists(SubqueryPlan {
            table: ctx.mapping.table(names.table).name.to_string(),
            alias: name_alias,
            where_tree: Box::new(WhereNode::And(name_conditions)),
            distinct_column: None,
        }))
    }
}
