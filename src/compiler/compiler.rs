use crate::core::{DataType, EngineError, Result};
use crate::mapping::{AssociationDescriptor, MappingRegistry, TableId};
use crate::model::RecordType;
use crate::predicate::{CollectionPath, CompareOp, OrderSpec, Predicate};

use super::hacks::{HackContext, HackRegistry};
use super::plan::{
    ColumnRef, Join, Operand, OrderKey, QueryPlan, SubqueryPlan, WhereNode,
};

pub const ROOT_ALIAS: &str = "t0";

/// Mints table aliases unique within one compilation, so sibling
/// existential subqueries never share a scope.
#[derive(Debug)]
pub struct AliasGen(u32);

impl AliasGen {
    pub fn new() -> Self {
        Self(1)
    }

    pub fn next(&mut self) -> String {
        let alias = format!("t{}", self.0);
        self.0 += 1;
        alias
    }
}

impl Default for AliasGen {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a field name is resolved: the root record type or one child
/// collection scoped to an alias.
#[derive(Debug, Clone)]
enum Scope {
    Root,
    Collection(CollectionPath),
}

/// Translates typed predicates into query plans. Holds only the two
/// immutable registries; safe to share across threads.
pub struct PredicateCompiler {
    mapping: MappingRegistry,
    hacks: HackRegistry,
}

impl PredicateCompiler {
    pub fn new(mapping: MappingRegistry, hacks: HackRegistry) -> Self {
        Self { mapping, hacks }
    }

    pub fn mapping(&self) -> &MappingRegistry {
        &self.mapping
    }

    /// Compile a predicate over `rtype` into a plan rooted at the base
    /// relation. The plan always carries the discriminator restriction;
    /// it does not restrict to current versions (callers append that).
    pub fn compile(
        &self,
        rtype: RecordType,
        predicate: &Predicate,
        order_by: &[OrderSpec],
    ) -> Result<QueryPlan> {
        let base = self.mapping.table(TableId::RecordVersion);
        let mut plan = QueryPlan::new(base.name, ROOT_ALIAS);
        let mut aliases = AliasGen::new();

        plan.and_where(WhereNode::eq_value(
            ColumnRef::new(ROOT_ALIAS, self.mapping.discriminator().column),
            rtype.discriminator(),
        ));

        let node = self.compile_node(rtype, &Scope::Root, ROOT_ALIAS, predicate, &mut plan, &mut aliases)?;
        plan.and_where(node);

        for spec in order_by {
            let column = self.resolve_root_field(rtype, &spec.field, &mut plan)?;
            plan.order_by.push(OrderKey {
                column,
                descending: spec.descending,
            });
        }

        Ok(plan)
    }

    fn compile_node(
        &self,
        rtype: RecordType,
        scope: &Scope,
        alias: &str,
        predicate: &Predicate,
        plan: &mut QueryPlan,
        aliases: &mut AliasGen,
    ) -> Result<WhereNode> {
        match predicate {
            Predicate::Compare { field, op, value } => {
                let lhs = self.resolve_field(rtype, scope, alias, field, plan)?;
                Ok(compile_compare(lhs, *op, value.clone()))
            }
            Predicate::Contains { field, needle } => {
                let lhs = self.resolve_field(rtype, scope, alias, field, plan)?;
                self.require_text(scope, &lhs, field)?;
                Ok(WhereNode::Contains {
                    lhs,
                    needle: needle.clone(),
                })
            }
            Predicate::IsNull { field } => {
                let lhs = self.resolve_field(rtype, scope, alias, field, plan)?;
                Ok(WhereNode::IsNull(lhs))
            }
            Predicate::And(parts) => {
                let nodes = parts
                    .iter()
                    .map(|p| self.compile_node(rtype, scope, alias, p, plan, aliases))
                    .collect::<Result<Vec<_>>>()?;
                Ok(WhereNode::And(nodes))
            }
            Predicate::Or(parts) => {
                let nodes = parts
                    .iter()
                    .map(|p| self.compile_node(rtype, scope, alias, p, plan, aliases))
                    .collect::<Result<Vec<_>>>()?;
                Ok(WhereNode::Or(nodes))
            }
            Predicate::Not(inner) => {
                let node = self.compile_node(rtype, scope, alias, inner, plan, aliases)?;
                Ok(WhereNode::Not(Box::new(node)))
            }
            Predicate::Exists { collection, .. } => {
                self.check_navigation(scope, *collection)?;

                // Registered hacks get first refusal on the fragment.
                let mut ctx = HackContext {
                    mapping: &self.mapping,
                    rtype,
                    outer_alias: alias,
                    root_alias: ROOT_ALIAS,
                    aliases,
                };
                if let Some(rewritten) = self.hacks.rewrite(predicate, &mut ctx) {
                    return Ok(rewritten);
                }

                self.compile_exists(rtype, alias, predicate, plan, aliases)
            }
        }
    }

    fn compile_exists(
        &self,
        rtype: RecordType,
        outer_alias: &str,
        predicate: &Predicate,
        plan: &mut QueryPlan,
        aliases: &mut AliasGen,
    ) -> Result<WhereNode> {
        let Predicate::Exists {
            collection,
            guard,
            inner,
        } = predicate
        else {
            return Err(EngineError::Compile("expected existential node".into()));
        };

        let assoc = self.mapping.association(*collection);
        let sub_alias = aliases.next();
        let mut conditions = vec![correlation(assoc, &sub_alias, outer_alias)];
        if assoc.versioned {
            conditions.push(visibility_window(&sub_alias, ROOT_ALIAS));
        }

        let child_scope = Scope::Collection(*collection);
        // Guard compiles into the same subquery WHERE: filter first, then
        // test the existential.
        if let Some(guard) = guard {
            conditions.push(self.compile_node(
                rtype,
                &child_scope,
                &sub_alias,
                guard,
                plan,
                aliases,
            )?);
        }
        conditions.push(self.compile_node(rtype, &child_scope, &sub_alias, inner, plan, aliases)?);

        Ok(WhereNode::Exists(SubqueryPlan {
            table: self.mapping.table(assoc.table).name.to_string(),
            alias: sub_alias,
            where_tree: Box::new(WhereNode::And(conditions)),
            distinct_column: None,
        }))
    }

    fn check_navigation(&self, scope: &Scope, collection: CollectionPath) -> Result<()> {
        let valid = match (scope, collection) {
            (Scope::Root, CollectionPath::Components) => false,
            (Scope::Root, _) => true,
            (Scope::Collection(CollectionPath::Names), CollectionPath::Components) => true,
            (Scope::Collection(_), _) => false,
        };
        if valid {
            Ok(())
        } else {
            Err(EngineError::Compile(format!(
                "collection '{}' is not navigable from this scope",
                collection.as_str()
            )))
        }
    }

    fn resolve_field(
        &self,
        rtype: RecordType,
        scope: &Scope,
        alias: &str,
        field: &str,
        plan: &mut QueryPlan,
    ) -> Result<ColumnRef> {
        match scope {
            Scope::Root => self.resolve_root_field(rtype, field, plan),
            Scope::Collection(path) => self
                .mapping
                .collection_field(*path, field)
                .map(|col| ColumnRef::new(alias, col))
                .ok_or_else(|| {
                    EngineError::Compile(format!(
                        "no mapped column for field '{}' on collection '{}'",
                        field,
                        path.as_str()
                    ))
                }),
        }
    }

    /// Root fields living on a satellite relation pull in an inner join on
    /// `version_key`; the join is emitted once per satellite.
    fn resolve_root_field(
        &self,
        rtype: RecordType,
        field: &str,
        plan: &mut QueryPlan,
    ) -> Result<ColumnRef> {
        let (table_id, column) = self.mapping.root_field(rtype, field).ok_or_else(|| {
            EngineError::Compile(format!(
                "no mapped column for field '{}' on type {:?}",
                field, rtype
            ))
        })?;

        if table_id == TableId::RecordVersion {
            return Ok(ColumnRef::new(ROOT_ALIAS, column));
        }

        let descriptor = self.mapping.table(table_id);
        let alias = descriptor.name.to_string();
        if !plan.joins.iter().any(|j| j.alias == alias) {
            plan.joins.push(Join {
                table: descriptor.name.to_string(),
                alias: alias.clone(),
                on: (
                    ColumnRef::new(alias.clone(), descriptor.key_column),
                    ColumnRef::new(ROOT_ALIAS, "version_key"),
                ),
            });
        }
        Ok(ColumnRef::new(alias, column))
    }

    /// Root-scope aliases are either `t0` over the base relation or a
    /// satellite table name; collection-scope aliases are generated, so
    /// the column is checked against the association's table instead.
    fn require_text(&self, scope: &Scope, lhs: &ColumnRef, field: &str) -> Result<()> {
        let descriptor = match scope {
            Scope::Collection(path) => self.mapping.table(self.mapping.association(*path).table),
            Scope::Root => {
                let table_name = if lhs.alias == ROOT_ALIAS {
                    self.mapping.table(TableId::RecordVersion).name
                } else {
                    lhs.alias.as_str()
                };
                self.mapping
                    .tables()
                    .find(|t| t.name == table_name)
                    .ok_or_else(|| {
                        EngineError::Compile(format!("no table behind alias '{}'", lhs.alias))
                    })?
            }
        };
        let is_text = descriptor
            .column(&lhs.column)
            .map(|col| col.data_type == DataType::Text)
            .unwrap_or(false);
        if is_text {
            Ok(())
        } else {
            Err(EngineError::Compile(format!(
                "contains() requires a text field, '{}' is not",
                field
            )))
        }
    }
}

/// Inequality follows three-valued semantics: a NULL value never matches
/// `!=`, hence the explicit not-null conjunct.
pub(crate) fn compile_compare(lhs: ColumnRef, op: CompareOp, value: crate::core::Value) -> WhereNode {
    match op {
        CompareOp::NotEq => WhereNode::And(vec![
            WhereNode::IsNotNull(lhs.clone()),
            WhereNode::Not(Box::new(WhereNode::Compare {
                lhs,
                op: CompareOp::Eq,
                rhs: Operand::Value(value),
            })),
        ]),
        op => WhereNode::Compare {
            lhs,
            op,
            rhs: Operand::Value(value),
        },
    }
}

/// Correlate a child collection row with its parent alias.
pub(crate) fn correlation(
    assoc: &AssociationDescriptor,
    sub_alias: &str,
    outer_alias: &str,
) -> WhereNode {
    WhereNode::eq_column(
        ColumnRef::new(sub_alias, assoc.child_column),
        ColumnRef::new(outer_alias, assoc.parent_column),
    )
}

/// Versioned-edge visibility: effective_seq <= V and (obsolete_seq is null
/// or > V), where V is the version sequence of the root row in scope.
pub(crate) fn visibility_window(sub_alias: &str, root_alias: &str) -> WhereNode {
    WhereNode::And(vec![
        WhereNode::Compare {
            lhs: ColumnRef::new(sub_alias, "effective_seq"),
            op: CompareOp::LtEq,
            rhs: Operand::Column(ColumnRef::new(root_alias, "version_sequence")),
        },
        WhereNode::Or(vec![
            WhereNode::IsNull(ColumnRef::new(sub_alias, "obsolete_seq")),
            WhereNode::Compare {
                lhs: ColumnRef::new(sub_alias, "obsolete_seq"),
                op: CompareOp::Gt,
                rhs: Operand::Column(ColumnRef::new(root_alias, "version_sequence")),
            },
        ]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    fn compiler() -> PredicateCompiler {
        PredicateCompiler::new(MappingRegistry::build(), HackRegistry::new())
    }

    #[test]
    fn test_root_field_on_base_relation() {
        let plan = compiler()
            .compile(
                RecordType::Person,
                &Predicate::eq("status", "active"),
                &[],
            )
            .unwrap();
        assert_eq!(plan.root_table, "record_version");
        assert!(plan.joins.is_empty());
    }

    #[test]
    fn test_satellite_field_emits_single_join() {
        let predicate = Predicate::and(vec![
            Predicate::eq("gender", "female"),
            Predicate::is_null("birth_date"),
        ]);
        let plan = compiler()
            .compile(RecordType::Person, &predicate, &[])
            .unwrap();
        assert_eq!(plan.joins.len(), 1);
        assert_eq!(plan.joins[0].table, "person");
    }

    #[test]
    fn test_existential_compiles_to_subquery_not_join() {
        let predicate = Predicate::any(
            CollectionPath::Identifiers,
            Predicate::eq("value", "123"),
        );
        let plan = compiler()
            .compile(RecordType::Person, &predicate, &[])
            .unwrap();
        assert!(plan.joins.is_empty());
        let found = matches!(
            &plan.where_tree,
            Some(WhereNode::And(nodes)) if nodes.iter().any(|n| matches!(n, WhereNode::Exists(_)))
        );
        assert!(found, "expected an EXISTS subquery in {:?}", plan.where_tree);
    }

    #[test]
    fn test_sibling_existentials_get_distinct_aliases() {
        let predicate = Predicate::and(vec![
            Predicate::any(CollectionPath::Identifiers, Predicate::eq("value", "a")),
            Predicate::any(CollectionPath::Identifiers, Predicate::eq("value", "b")),
        ]);
        let plan = compiler()
            .compile(RecordType::Person, &predicate, &[])
            .unwrap();

        let mut aliases = Vec::new();
        collect_subquery_aliases(plan.where_tree.as_ref().unwrap(), &mut aliases);
        assert_eq!(aliases.len(), 2);
        assert_ne!(aliases[0], aliases[1]);
    }

    #[test]
    fn test_unknown_field_is_compile_error() {
        let err = compiler()
            .compile(RecordType::Observation, &Predicate::eq("gender", "x"), &[])
            .unwrap_err();
        assert!(matches!(err, EngineError::Compile(_)));
    }

    #[test]
    fn test_components_not_navigable_from_root() {
        let err = compiler()
            .compile(
                RecordType::Person,
                &Predicate::any(CollectionPath::Components, Predicate::eq("value", "x")),
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Compile(_)));
    }

    #[test]
    fn test_contains_requires_text() {
        let err = compiler()
            .compile(
                RecordType::Observation,
                &Predicate::contains("quantity", "1"),
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Compile(_)));
    }

    #[test]
    fn test_contains_requires_text_inside_collections() {
        let predicate = Predicate::any(
            CollectionPath::Relationships,
            Predicate::contains("target", "abc"),
        );
        let err = compiler()
            .compile(RecordType::Person, &predicate, &[])
            .unwrap_err();
        assert!(matches!(err, EngineError::Compile(_)));
    }

    #[test]
    fn test_not_eq_carries_null_rejection() {
        let node = compile_compare(
            ColumnRef::new("t0", "status"),
            CompareOp::NotEq,
            Value::from("active"),
        );
        match node {
            WhereNode::And(parts) => {
                assert!(matches!(parts[0], WhereNode::IsNotNull(_)));
                assert!(matches!(parts[1], WhereNode::Not(_)));
            }
            other => panic!("unexpected node: {:?}", other),
        }
    }

    fn collect_subquery_aliases(node: &WhereNode, out: &mut Vec<String>) {
        match node {
            WhereNode::And(nodes) | WhereNode::Or(nodes) => {
                for n in nodes {
                    collect_subquery_aliases(n, out);
                }
            }
            WhereNode::Not(inner) => collect_subquery_aliases(inner, out),
            WhereNode::Exists(sub) => {
                out.push(sub.alias.clone());
                collect_subquery_aliases(&sub.where_tree, out);
            }
            WhereNode::CorrelatedCount { subquery, .. } => {
                out.push(subquery.alias.clone());
                collect_subquery_aliases(&subquery.where_tree, out);
            }
            _ => {}
        }
    }
}
