//! segeval - Physical predicate evaluation over segmented columnar storage
//!
//! Turns a compiled predicate tree into per-row bitmaps over the rows of one
//! segment, choosing per leaf between index lookup, raw scan, or a hybrid of
//! both for a partially indexed (growing) segment.
//!
//! # Layout
//!
//! - `bitmap`: bit-per-row results and writable views
//! - `schema`: field references, column types, nested paths
//! - `segment`: the read-only segment interface plus an in-memory segment
//! - `plan`: logical predicate nodes
//! - `exec`: physical operators, functor dispatch, compilation, driving
//! - `observability`: structured logging, scopes, metrics
//! - `config`: evaluation configuration

pub mod bitmap;
pub mod config;
pub mod exec;
pub mod observability;
pub mod plan;
pub mod schema;
pub mod segment;

pub use bitmap::{Bitmap, BitmapView};
pub use config::{ConfigError, EvalConfig};
pub use exec::{
    compile, evaluate_segment, explain, EvalContext, EvalResult, EvalStrategy, EvaluationError,
    ExprPtr, PhysicalExpr, SegmentBinding,
};
pub use segment::{RowRange, Segment};
