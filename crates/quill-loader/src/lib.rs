//! Quill Loader — generator resolution and cached execution
//!
//! A requested artifact may be a literal file, the output of a generator
//! script run through an interpreter, or a member of an archive that is
//! itself literal or generated. [`catalog::LoaderCatalog`] decides which;
//! [`executor::LoaderExecutor`] runs the result and commits it into the
//! cache atomically.

pub mod archive;
pub mod catalog;
pub mod executor;
pub mod loader;

#[cfg(test)]
pub mod tests;

pub use archive::ArchiveFormat;
pub use catalog::LoaderCatalog;
pub use executor::{LoadOptions, LoaderExecutor};
pub use loader::{Loader, Strategy};
