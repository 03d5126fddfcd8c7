//! Quill Build — the façade the build and preview layers call into.
//!
//! Ties the loader catalog, the executor and the hashers together behind
//! one driver with a per-source-root lifetime.

pub mod driver;


pub use driver::BuildCacheDriver;
