mod index_scan_executor;
mod insert_executor;
mod seq_scan_executor;
mod values_executor;

pub use index_scan_executor::IndexScanExecutor;
pub use insert_executor::{insert_output_schema, InsertExecutor};
pub use seq_scan_executor::SeqScanExecutor;
pub use values_executor::ValuesExecutor;

use crate::common::{RecordId, Result};
use crate::tuple::Tuple;

/// A pull-based executor. `init` resets it; `next` yields one tuple at a
/// time until the stream is exhausted.
pub trait Executor {
    fn init(&mut self) -> Result<()>;

    fn next(&mut self) -> Result<Option<(Tuple, RecordId)>>;
}
