//! Error types for scene, traversal and rendering operations.

use crate::backend::BackendError;
use crate::scene::{ComponentType, NodeId};
use thiserror::Error;

/// Errors raised by the scene graph, traversal engine, renderer and picker.
#[derive(Error, Debug)]
pub enum RigError {
    /// `add_child` would make a node its own ancestor.
    #[error("adding {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },

    /// The camera projection has no inverse, so unprojection is impossible.
    #[error("projection matrix is not invertible")]
    DegenerateProjection,

    /// An offscreen render target could not be allocated; the frame was abandoned.
    #[error("failed to allocate {width}x{height} offscreen target: {source}")]
    OffscreenAllocation {
        width: u32,
        height: u32,
        #[source]
        source: BackendError,
    },

    /// A traversal left the matrix or clip stack unbalanced.
    #[error("stack imbalance after traversal: {pushes} pushes vs {pops} pops")]
    StackImbalance { pushes: usize, pops: usize },

    #[error("node {0:?} does not exist")]
    NodeNotFound(NodeId),

    #[error("node {0:?} is not an entity")]
    NotAnEntity(NodeId),

    #[error("entity {node:?} has no {component:?} component")]
    MissingComponent {
        node: NodeId,
        component: ComponentType,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type RigResult<T> = Result<T, RigError>;
