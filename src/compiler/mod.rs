mod compiler;
mod hacks;
mod plan;

pub use compiler::{AliasGen, PredicateCompiler, ROOT_ALIAS};
pub use hacks::{HackContext, HackRegistry, NameComponentPairHack, QueryHack};
pub use plan::{
    ColumnRef, Join, Operand, OrderKey, QueryPlan, SubqueryPlan, WhereNode,
};
