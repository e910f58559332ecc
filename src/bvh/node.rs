//! BVH node, bounds and primitive permutation types.
//!
//! Flat array layout for GPU traversal:
//! - 32-byte nodes, root at index 0
//! - left child is always the next node, right child index stored in `offset`

use bytemuck::{Pod, Zeroable};

/// Leaf marker bit in [`BvhNode::count`].
pub const LEAF_FLAG: u32 = 1 << 16;

/// Low bits of [`BvhNode::count`]: primitive count for leaves, split axis for internal nodes.
pub const COUNT_MASK: u32 = 0xFFFF;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: [f32::INFINITY; 3],
        max: [f32::NEG_INFINITY; 3],
    };

    /// Bounds of a triangle.
    #[inline]
    pub fn from_triangle(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> Self {
        let mut bounds = Self::EMPTY;
        bounds.grow_point(a);
        bounds.grow_point(b);
        bounds.grow_point(c);
        bounds
    }

    /// Grow to include a point.
    #[inline]
    pub fn grow_point(&mut self, p: [f32; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    /// Grow to include another AABB.
    #[inline]
    pub fn grow(&mut self, other: &Aabb) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(other.min[i]);
            self.max[i] = self.max[i].max(other.max[i]);
        }
    }

    /// True until at least one point has been added.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min[0] > self.max[0]
    }

    #[inline]
    pub fn extent(&self, axis: usize) -> f32 {
        self.max[axis] - self.min[axis]
    }

    /// Surface area (for SAH cost). Zero for empty boxes.
    #[inline]
    pub fn area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let dx = self.extent(0);
        let dy = self.extent(1);
        let dz = self.extent(2);
        2.0 * (dx * dy + dy * dz + dz * dx)
    }

    /// Longest axis (0=x, 1=y, 2=z).
    #[inline]
    pub fn longest_axis(&self) -> usize {
        let dx = self.extent(0);
        let dy = self.extent(1);
        let dz = self.extent(2);
        if dx >= dy && dx >= dz {
            0
        } else if dy >= dz {
            1
        } else {
            2
        }
    }

    /// Centroid of the AABB.
    #[inline]
    pub fn centroid(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Whether `other` lies inside this box, allowing `eps` slack.
    pub fn contains(&self, other: &Aabb, eps: f32) -> bool {
        (0..3).all(|i| other.min[i] >= self.min[i] - eps && other.max[i] <= self.max[i] + eps)
    }

    /// Component-wise equality within `eps`.
    pub fn approx_eq(&self, other: &Aabb, eps: f32) -> bool {
        (0..3).all(|i| {
            (self.min[i] - other.min[i]).abs() <= eps && (self.max[i] - other.max[i]).abs() <= eps
        })
    }
}

/// GPU BVH node (32 bytes, read as 8 words by the traversal shader).
///
/// Leaf: `count = LEAF_FLAG | primitive_count`, `offset` = first primitive
/// (submesh-local) in BVH order.
/// Internal: `count` = split axis, `offset` = right child index.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub min: [f32; 3],
    pub max: [f32; 3],
    pub offset: u32,
    pub count: u32,
}

impl BvhNode {
    pub fn leaf(bounds: &Aabb, first: u32, count: u32) -> Self {
        debug_assert!(count <= COUNT_MASK);
        Self {
            min: bounds.min,
            max: bounds.max,
            offset: first,
            count: LEAF_FLAG | (count & COUNT_MASK),
        }
    }

    pub fn internal(bounds: &Aabb, axis: u32) -> Self {
        Self {
            min: bounds.min,
            max: bounds.max,
            offset: 0,
            count: axis & COUNT_MASK,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.count & LEAF_FLAG != 0
    }

    /// Primitive count of a leaf, 0 for internal nodes.
    #[inline]
    pub fn primitive_count(&self) -> u32 {
        if self.is_leaf() {
            self.count & COUNT_MASK
        } else {
            0
        }
    }

    /// Split axis of an internal node.
    #[inline]
    pub fn axis(&self) -> u32 {
        self.count & COUNT_MASK
    }

    /// Right child index of an internal node.
    #[inline]
    pub fn right_child(&self) -> u32 {
        self.offset
    }

    pub fn bounds(&self) -> Aabb {
        Aabb {
            min: self.min,
            max: self.max,
        }
    }
}

/// Primitive reordering produced by a BVH build.
///
/// `order[i]` is the original primitive placed at position `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permutation {
    order: Vec<u32>,
}

impl Permutation {
    pub fn identity(len: usize) -> Self {
        Self {
            order: (0..len as u32).collect(),
        }
    }

    /// Wrap an explicit order. Returns `None` if it is not a permutation of `0..len`.
    pub fn from_order(order: Vec<u32>) -> Option<Self> {
        let mut seen = vec![false; order.len()];
        for &i in &order {
            let slot = seen.get_mut(i as usize)?;
            if *slot {
                return None;
            }
            *slot = true;
        }
        Some(Self { order })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.order
    }

    /// Reorder per-primitive data: `out[i] = data[order[i]]`.
    pub fn apply<T: Clone>(&self, data: &[T]) -> Vec<T> {
        debug_assert_eq!(data.len(), self.order.len());
        self.order.iter().map(|&i| data[i as usize].clone()).collect()
    }

    /// Reorder a triangle index buffer (3 indices per primitive).
    pub fn apply_triangles(&self, indices: &[u32]) -> Vec<u32> {
        debug_assert_eq!(indices.len(), self.order.len() * 3);
        let mut out = Vec::with_capacity(indices.len());
        for &prim in &self.order {
            let base = prim as usize * 3;
            out.extend_from_slice(&indices[base..base + 3]);
        }
        out
    }

    /// Append `other` with its primitives shifted by the current length.
    pub fn extend_offset(&mut self, other: &Permutation) {
        let base = self.order.len() as u32;
        self.order.extend(other.order.iter().map(|&i| i + base));
    }

    /// Inverse mapping: `inverse[original] = new position`.
    pub fn inverse(&self) -> Vec<u32> {
        let mut inv = vec![0u32; self.order.len()];
        for (pos, &orig) in self.order.iter().enumerate() {
            inv[orig as usize] = pos as u32;
        }
        inv
    }
}
