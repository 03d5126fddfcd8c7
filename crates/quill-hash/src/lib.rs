//! Quill Hash — content-addressable hashing for files and module graphs

pub mod content;
pub mod module;


pub use content::{ContentHasher, FileInfo, empty_hash, hash_bytes};
pub use module::{ModuleGraphHasher, ModuleInfo, find_module};
