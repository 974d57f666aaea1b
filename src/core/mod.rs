mod error;
mod value;

pub use error::{EngineError, Result};
pub use value::{DataType, Value};

pub type Row = Vec<Value>;
