//! The pull-based operator tree.
//!
//! Every operator implements [`Executor`]: `open` prepares it, `next`
//! pulls one output tuple at a time, `rewind` restarts the stream and
//! `close` releases it. Pulling from an operator that is not open is a
//! programmer error and panics; storage-level failures and wound-wait
//! aborts surface as errors and must be allowed to reach the transaction
//! driver untouched.

mod dml;
mod eval;
mod join;
mod pipeline;
mod scan;

pub use dml::{Delete, Insert};
pub use eval::{JoinPredicate, PredOp, Predicate};
pub use join::Join;
pub use pipeline::{Filter, Project};
pub use scan::SeqScan;

use slate::tuple::{Tuple, TupleDesc};
use slate::Result;
use std::sync::Arc;

/// A boxed operator in an executor tree.
pub type BoxedExecutor = Box<dyn Executor>;

pub trait Executor {
    /// Prepares the operator (and its children) to produce tuples.
    fn open(&mut self) -> Result<()>;

    /// The next output tuple, or `None` once the stream is exhausted.
    /// Repeated calls past the end keep returning `None`.
    fn next(&mut self) -> Result<Option<Tuple>>;

    /// Restarts the stream from the beginning.
    fn rewind(&mut self) -> Result<()>;

    /// Releases the operator. Pulling from a closed operator panics.
    fn close(&mut self);

    /// The schema of the tuples this operator produces.
    fn tuple_desc(&self) -> Arc<TupleDesc>;

    /// The child operators, left to right. Leaves report none.
    fn children(&mut self) -> Vec<&mut BoxedExecutor>;

    /// Replaces the children, in the order `children` reports them.
    fn set_children(&mut self, children: Vec<BoxedExecutor>);
}
