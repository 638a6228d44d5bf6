//! Record transformation stages.
//!
//! The stages run in a fixed order for every batch: predicate filter,
//! field mapping, type resolution, then the null-row filter. Each stage
//! is a pure batch-to-batch function; rows are only ever removed, never
//! reordered.

mod filter;
mod mapping;
mod nulls;
mod resolve;

pub use filter::filter_in_set;
pub use mapping::Mapper;
pub use nulls::drop_null_rows;
pub use resolve::resolve_types;
