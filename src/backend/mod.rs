//! Backend abstraction layer
//!
//! Provides the trait the renderer drives and the handle types it stores.
//! [`HeadlessBackend`] implements it without a GPU.

pub mod headless;
pub mod traits;
pub mod types;

pub use headless::{BackendCall, HeadlessBackend, PipelineRecord, PrimitiveRecord};
pub use traits::*;
pub use types::*;
