//! Bottom-level acceleration structure.
//!
//! Builds one binary BVH per submesh with binned SAH splitting and emits a
//! flat, depth-first node array ready for GPU upload.
//!
//! ## Architecture
//! ```text
//! positions + triangle indices → per-triangle bounds → binned SAH (16 bins)
//!     → depth-first node array + primitive order → permuted index buffer
//! ```

pub mod build;
pub mod node;

pub use build::{build, Bvh, MAX_DEPTH, NUM_BINS};
pub use node::{Aabb, BvhNode, Permutation, COUNT_MASK, LEAF_FLAG};
