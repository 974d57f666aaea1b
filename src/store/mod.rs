mod executor;
mod store;
mod table;

pub use executor::{execute_plan, QueryOutcome};
pub use store::{IdentifierClaim, Mutation, Store, Tables, VersionGuard, WriteSet};
pub use table::{Table, TableSchema};
