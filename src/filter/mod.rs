//! List queries: equality filters, search, ordering and the page window,
//! rendered to SQL for Postgres or evaluated in memory.

pub mod types;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod error;

pub use types::*;
pub use error::FilterError;
pub use filter::Filter;
