//! Access control infrastructure

mod scope_filter;

pub use scope_filter::ScopedAccessFilterProvider;
