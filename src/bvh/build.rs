//! Binned SAH BVH builder.
//!
//! Constructs a flat, depth-first node array from an indexed triangle list
//! and reorders the triangles into leaf order. Nodes are allocated when their
//! task is popped from an explicit work stack, and each right child's index
//! is backfilled into its parent, so deep trees never recurse.

use super::node::{Aabb, BvhNode, Permutation, COUNT_MASK};

/// Number of SAH bins per axis.
pub const NUM_BINS: usize = 16;

/// Cost ratio: traversal vs intersection.
const TRAVERSAL_COST: f32 = 1.0;
const INTERSECT_COST: f32 = 1.0;

/// Axes narrower than this are not split.
const MIN_EXTENT: f32 = 1e-6;

/// Deepest tree the GPU traversal stack can walk.
pub const MAX_DEPTH: usize = 64;

/// Deeper than this, every split is an object median. Medians halve the
/// range, so even 2^32 triangles end within [`MAX_DEPTH`].
const SAH_DEPTH_LIMIT: usize = 28;

/// Built BVH result.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    /// Flat node array (index 0 = root). Empty for zero triangles.
    pub nodes: Vec<BvhNode>,
    /// Triangle index buffer permuted into leaf order.
    pub indices: Vec<u32>,
    order: Permutation,
}

impl Bvh {
    /// Primitive order used by the leaves: `order[i]` is the original
    /// triangle stored at position `i` of [`Bvh::indices`].
    ///
    /// Any per-primitive data computed against the original triangle order
    /// must go through [`Permutation::apply`] before it can be indexed by
    /// leaf offsets.
    pub fn primitive_order(&self) -> &Permutation {
        &self.order
    }

    pub fn triangle_count(&self) -> usize {
        self.order.len()
    }

    /// Bounds of the root node.
    pub fn bounds(&self) -> Aabb {
        self.nodes.first().map(BvhNode::bounds).unwrap_or(Aabb::EMPTY)
    }

    /// Deepest root-to-leaf path (1 for a single leaf).
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 1usize)];
        while let Some((idx, depth)) = stack.pop() {
            let node = &self.nodes[idx];
            if node.is_leaf() {
                max_depth = max_depth.max(depth);
            } else {
                stack.push((idx + 1, depth + 1));
                stack.push((node.right_child() as usize, depth + 1));
            }
        }
        max_depth
    }
}

/// SAH bin for evaluating split candidates.
#[derive(Clone, Copy)]
struct Bin {
    bounds: Aabb,
    count: usize,
}

impl Bin {
    const EMPTY: Self = Self {
        bounds: Aabb::EMPTY,
        count: 0,
    };
}

/// Winning split candidate.
#[derive(Debug, Clone, Copy)]
struct Split {
    axis: usize,
    pos: f32,
    cost: f32,
}

/// Pending subtree: primitive range plus the parent waiting for its right child index.
struct Task {
    start: usize,
    end: usize,
    depth: usize,
    right_of: Option<usize>,
}

/// Build a BVH over `indices` (three per triangle) into `positions`.
///
/// Leaves hold at most `max_leaf_size` triangles (clamped to `1..=0xFFFF`).
/// Indices must be in range for `positions`.
#[tracing::instrument(skip_all, fields(tri_count = indices.len() / 3, max_leaf_size = max_leaf_size))]
pub fn build(positions: &[[f32; 3]], indices: &[u32], max_leaf_size: usize) -> Bvh {
    let max_leaf_size = max_leaf_size.clamp(1, COUNT_MASK as usize);
    let n = indices.len() / 3;
    if n == 0 {
        return Bvh::default();
    }

    let mut aabbs = Vec::with_capacity(n);
    let mut centroids = Vec::with_capacity(n);
    for tri in indices.chunks_exact(3) {
        let a = positions[tri[0] as usize];
        let b = positions[tri[1] as usize];
        let c = positions[tri[2] as usize];
        aabbs.push(Aabb::from_triangle(a, b, c));
        centroids.push([
            (a[0] + b[0] + c[0]) / 3.0,
            (a[1] + b[1] + c[1]) / 3.0,
            (a[2] + b[2] + c[2]) / 3.0,
        ]);
    }

    // Working primitive order (reordered in place by partitioning)
    let mut prims: Vec<u32> = (0..n as u32).collect();
    let mut nodes: Vec<BvhNode> = Vec::with_capacity(2 * n - 1);

    let mut stack = vec![Task {
        start: 0,
        end: n,
        depth: 1,
        right_of: None,
    }];

    while let Some(task) = stack.pop() {
        let node_idx = nodes.len();
        if let Some(parent) = task.right_of {
            nodes[parent].offset = node_idx as u32;
        }

        let range = &mut prims[task.start..task.end];
        let count = range.len();

        let mut bounds = Aabb::EMPTY;
        for &p in range.iter() {
            bounds.grow(&aabbs[p as usize]);
        }

        if count <= max_leaf_size {
            nodes.push(BvhNode::leaf(&bounds, task.start as u32, count as u32));
            continue;
        }

        // SAH split, rejected when it does not beat the leaf cost or leaves a side empty
        let sah = (task.depth <= SAH_DEPTH_LIMIT)
            .then(|| find_best_split(range, &aabbs, &centroids, &bounds))
            .flatten()
            .filter(|s| s.cost < count as f32 * INTERSECT_COST)
            .and_then(|s| {
                let mid = partition(range, |&p| centroids[p as usize][s.axis] < s.pos);
                (mid > 0 && mid < count).then_some((s.axis, mid))
            });

        // Too large for a leaf, or too deep for SAH: object median on the widest centroid axis
        let (axis, mid) = match sah {
            Some(split) => split,
            None => median_split(range, &centroids),
        };

        nodes.push(BvhNode::internal(&bounds, axis as u32));

        let mid = task.start + mid;
        // Right first so the left subtree is emitted immediately after its parent
        stack.push(Task {
            start: mid,
            end: task.end,
            depth: task.depth + 1,
            right_of: Some(node_idx),
        });
        stack.push(Task {
            start: task.start,
            end: mid,
            depth: task.depth + 1,
            right_of: None,
        });
    }

    let order = Permutation::from_order(prims).unwrap_or_else(|| Permutation::identity(n));
    let indices = order.apply_triangles(&indices[..n * 3]);

    tracing::debug!(nodes = nodes.len(), "bvh built");

    Bvh {
        nodes,
        indices,
        order,
    }
}

/// SAH binned split search across all 3 axes.
///
/// Ties keep the first candidate found (axis 0→1→2, increasing split index).
fn find_best_split(
    prims: &[u32],
    aabbs: &[Aabb],
    centroids: &[[f32; 3]],
    bounds: &Aabb,
) -> Option<Split> {
    let parent_area = bounds.area();
    let inv_parent_area = if parent_area > 0.0 { 1.0 / parent_area } else { 0.0 };
    let mut best: Option<Split> = None;

    for axis in 0..3 {
        let extent = bounds.extent(axis);
        if extent < MIN_EXTENT {
            continue;
        }

        let mut bins = [Bin::EMPTY; NUM_BINS];
        let scale = NUM_BINS as f32 / extent;
        for &p in prims {
            let offset = (centroids[p as usize][axis] - bounds.min[axis]) * scale;
            let bin = (offset.max(0.0) as usize).min(NUM_BINS - 1);
            bins[bin].bounds.grow(&aabbs[p as usize]);
            bins[bin].count += 1;
        }

        // Sweep from right: area/count of bins i+1.. for split after bin i
        let mut right_area = [0.0f32; NUM_BINS - 1];
        let mut right_count = [0usize; NUM_BINS - 1];
        let mut sweep = Aabb::EMPTY;
        let mut sweep_count = 0;
        for i in (0..NUM_BINS - 1).rev() {
            sweep.grow(&bins[i + 1].bounds);
            sweep_count += bins[i + 1].count;
            right_area[i] = sweep.area();
            right_count[i] = sweep_count;
        }

        // Sweep from left and evaluate
        sweep = Aabb::EMPTY;
        sweep_count = 0;
        for i in 0..NUM_BINS - 1 {
            sweep.grow(&bins[i].bounds);
            sweep_count += bins[i].count;
            if sweep_count == 0 || right_count[i] == 0 {
                continue;
            }

            let cost = TRAVERSAL_COST
                + INTERSECT_COST
                    * (sweep.area() * inv_parent_area * sweep_count as f32
                        + right_area[i] * inv_parent_area * right_count[i] as f32);

            if best.map_or(true, |b| cost < b.cost) {
                best = Some(Split {
                    axis,
                    pos: bounds.min[axis] + (i + 1) as f32 / scale,
                    cost,
                });
            }
        }
    }

    best
}

/// Split at the median centroid along the widest centroid axis. Returns (axis, mid).
fn median_split(prims: &mut [u32], centroids: &[[f32; 3]]) -> (usize, usize) {
    let mut centroid_bounds = Aabb::EMPTY;
    for &p in prims.iter() {
        centroid_bounds.grow_point(centroids[p as usize]);
    }
    let axis = centroid_bounds.longest_axis();
    let mid = prims.len() / 2;
    prims.select_nth_unstable_by(mid, |&a, &b| {
        centroids[a as usize][axis].total_cmp(&centroids[b as usize][axis])
    });
    (axis, mid)
}

/// Partition slice in-place. Returns count of elements where predicate is true.
fn partition<T, F>(slice: &mut [T], pred: F) -> usize
where
    F: Fn(&T) -> bool,
{
    let mut left = 0;
    let mut right = slice.len();
    while left < right {
        if pred(&slice[left]) {
            left += 1;
        } else {
            right -= 1;
            slice.swap(left, right);
        }
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One unit triangle per center; returns (positions, indices).
    fn make_tris(centers: &[[f32; 3]]) -> (Vec<[f32; 3]>, Vec<u32>) {
        let mut positions = Vec::new();
        let mut indices = Vec::new();
        for c in centers {
            let base = positions.len() as u32;
            positions.push([c[0] - 0.5, c[1] - 0.5, c[2]]);
            positions.push([c[0] + 0.5, c[1] - 0.5, c[2]]);
            positions.push([c[0], c[1] + 0.5, c[2]]);
            indices.extend_from_slice(&[base, base + 1, base + 2]);
        }
        (positions, indices)
    }

    /// Deterministic pseudo-random centers.
    fn scattered(count: usize, seed: u32) -> Vec<[f32; 3]> {
        let mut state = seed;
        let mut next = || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 8) as f32 / (1u32 << 24) as f32 * 20.0 - 10.0
        };
        (0..count).map(|_| [next(), next(), next()]).collect()
    }

    fn tri_bounds(positions: &[[f32; 3]], indices: &[u32], prim: usize) -> Aabb {
        let t = &indices[prim * 3..prim * 3 + 3];
        Aabb::from_triangle(
            positions[t[0] as usize],
            positions[t[1] as usize],
            positions[t[2] as usize],
        )
    }

    /// Structural checks shared by the property tests.
    fn check_invariants(positions: &[[f32; 3]], indices: &[u32], bvh: &Bvh, max_leaf: usize) {
        let n = indices.len() / 3;
        assert!(bvh.nodes.len() <= 2 * n - 1, "too many nodes");

        let mut leaf_union = Aabb::EMPTY;
        let mut covered = vec![false; n];
        for (i, node) in bvh.nodes.iter().enumerate() {
            if node.is_leaf() {
                let count = node.primitive_count() as usize;
                assert!(count >= 1 && count <= max_leaf, "leaf {i} holds {count}");
                let mut exact = Aabb::EMPTY;
                for p in node.offset as usize..node.offset as usize + count {
                    assert!(!covered[p], "primitive {p} in two leaves");
                    covered[p] = true;
                    exact.grow(&tri_bounds(positions, &bvh.indices, p));
                }
                assert!(exact.approx_eq(&node.bounds(), 1e-5));
                leaf_union.grow(&node.bounds());
            } else {
                let left = bvh.nodes[i + 1].bounds();
                let right = bvh.nodes[node.right_child() as usize].bounds();
                assert!(node.right_child() as usize > i + 1);
                let mut union = left;
                union.grow(&right);
                assert!(union.approx_eq(&node.bounds(), 1e-5));
            }
        }
        assert!(covered.iter().all(|&c| c));

        let mut mesh_bounds = Aabb::EMPTY;
        for p in 0..n {
            mesh_bounds.grow(&tri_bounds(positions, indices, p));
        }
        assert!(leaf_union.approx_eq(&mesh_bounds, 1e-5));

        let mut before = indices.to_vec();
        let mut after = bvh.indices.clone();
        before.sort_unstable();
        after.sort_unstable();
        assert_eq!(before, after);
    }

    #[test]
    fn test_empty_bvh() {
        let bvh = build(&[], &[], 4);
        assert!(bvh.nodes.is_empty());
        assert!(bvh.indices.is_empty());
        assert_eq!(bvh.depth(), 0);
    }

    #[test]
    fn test_single_triangle() {
        let (pos, idx) = make_tris(&[[0.0; 3]]);
        let bvh = build(&pos, &idx, 4);
        assert_eq!(bvh.nodes.len(), 1); // just a leaf
        assert!(bvh.nodes[0].is_leaf());
        assert_eq!(bvh.nodes[0].primitive_count(), 1);
        assert_eq!(bvh.indices, idx);
    }

    #[test]
    fn test_leaf_count_correct() {
        let (pos, idx) = make_tris(&[[0.0; 3], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        let bvh = build(&pos, &idx, 4);
        assert_eq!(bvh.nodes.len(), 1);
        assert_eq!(bvh.nodes[0].primitive_count(), 3);
    }

    #[test]
    fn test_many_triangles_builds_tree() {
        let centers: Vec<[f32; 3]> = (0..100).map(|i| [i as f32 * 2.0, 0.0, 0.0]).collect();
        let (pos, idx) = make_tris(&centers);
        let bvh = build(&pos, &idx, 4);

        assert!(bvh.nodes.len() > 1, "BVH should have internal nodes");
        assert_eq!(bvh.nodes[0].axis(), 0, "root should split along x");
        let root = bvh.bounds();
        assert!(root.min[0] < 0.0);
        assert!(root.max[0] > 198.0);
        check_invariants(&pos, &idx, &bvh, 4);
    }

    #[test]
    fn test_scattered_invariants() {
        for (count, max_leaf) in [(7, 1), (64, 2), (257, 4), (500, 8)] {
            let (pos, idx) = make_tris(&scattered(count, count as u32));
            let bvh = build(&pos, &idx, max_leaf);
            check_invariants(&pos, &idx, &bvh, max_leaf);
        }
    }

    #[test]
    fn test_coincident_triangles_respect_leaf_size() {
        // Identical centroids defeat SAH binning; the median fallback must still split
        let (pos, idx) = make_tris(&[[1.0, 2.0, 3.0]; 33]);
        let bvh = build(&pos, &idx, 4);
        check_invariants(&pos, &idx, &bvh, 4);
        assert!(bvh.nodes.len() > 1);
    }

    #[test]
    fn test_flat_axis_is_skipped() {
        // All triangles in the z=0 plane: z extent is zero and never chosen
        let centers: Vec<[f32; 3]> = (0..40)
            .map(|i| [(i % 8) as f32 * 3.0, (i / 8) as f32 * 3.0, 0.0])
            .collect();
        let (pos, idx) = make_tris(&centers);
        let bvh = build(&pos, &idx, 2);
        check_invariants(&pos, &idx, &bvh, 2);
        assert!(bvh.nodes.iter().filter(|n| !n.is_leaf()).all(|n| n.axis() != 2));
    }

    #[test]
    fn test_primitive_order_matches_indices() {
        let (pos, idx) = make_tris(&scattered(50, 9));
        let bvh = build(&pos, &idx, 3);
        assert_eq!(bvh.primitive_order().apply_triangles(&idx), bvh.indices);

        let ids: Vec<u32> = (0..50).collect();
        assert_eq!(bvh.primitive_order().apply(&ids), bvh.primitive_order().as_slice());
    }

    #[test]
    fn test_build_is_deterministic() {
        let (pos, idx) = make_tris(&scattered(120, 3));
        let a = build(&pos, &idx, 4);
        let b = build(&pos, &idx, 4);
        assert_eq!(a.nodes, b.nodes);
        assert_eq!(a.indices, b.indices);
    }

    #[test]
    fn test_geometric_spacing_stays_within_traversal_depth() {
        // Each SAH split peels off the farthest triangle, a chain without the depth cap
        let centers: Vec<[f32; 3]> = (0..100).map(|i| [2f32.powi(i), 0.0, 0.0]).collect();
        let (pos, idx) = make_tris(&centers);
        let bvh = build(&pos, &idx, 1);
        assert!(bvh.depth() <= MAX_DEPTH, "depth {}", bvh.depth());
        check_invariants(&pos, &idx, &bvh, 1);
    }

    #[test]
    fn test_depth_grows_logarithmically() {
        let centers: Vec<[f32; 3]> = (0..1024).map(|i| [i as f32, 0.0, 0.0]).collect();
        let (pos, idx) = make_tris(&centers);
        let bvh = build(&pos, &idx, 1);
        assert!(bvh.depth() <= 24, "depth {}", bvh.depth());
    }
}
