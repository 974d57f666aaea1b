mod cache;
mod composer;
mod dispatcher;
mod edges;

pub use cache::{LruRecordCache, NoCache, RecordCache};
pub use composer::{ComposerRegistry, SubtypeComposer};
pub use dispatcher::{PersistenceDispatcher, QueryPage};
