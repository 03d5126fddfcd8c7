//! Quill Core — source-root path handling, cache layout, interpreter
//! configuration, and the module analyzer interface

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod error;
pub mod paths;
pub mod route;


pub use analyzer::{AnalyzeError, ModuleAnalyzer, ModuleRefs, SimpleModuleAnalyzer};
pub use cache::{CACHE_DIR, cache_dir, cache_output_path, clear_cache, ensure_parent, failure_marker_path, temp_path};
pub use config::{ARCHIVE_EXTENSIONS, InterpreterTable, ProjectConfig};
pub use error::{LoadError, LoadResult};
pub use paths::{dir_name, file_ext, normalize, resolve_relative, strip_ext};
pub use route::{RouteMatch, is_parameterized, route};
