//! Model resources
//!
//! - `loader`: per-stage load, cache and post-processing
//! - `pending`: background loads polled from the frame loop
//! - `placeholder`: synthesized stand-in geometry
//! - `obj_import`: Wavefront OBJ parsing

pub mod loader;
pub mod obj_import;
pub mod pending;
pub mod placeholder;

pub use loader::{apply_shading, LoadPolicy, ModelData, ResourceLoader};
pub use obj_import::{ObjError, ObjImporter};
pub use pending::{LoadResult, PendingModel, Progress};
pub use placeholder::build_placeholder;
