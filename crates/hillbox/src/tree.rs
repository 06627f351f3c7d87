//! Arena-based octree for gravity and collision search.
//!
//! Nodes are stored contiguously in a `Vec` and reference each other by index, so a
//! rebuild is one allocation-light pass and the previous step's tree is simply dropped.
//! A finite domain is covered by a grid of root cells, each the root of its own octree;
//! an unbounded domain uses a single cube enclosing every particle.
//!
//! The same tree answers two questions:
//!
//! - **Force walk**: Barnes-Hut monopole acceleration at a point, opening any cell whose
//!   `width / distance` is not below θ or that contains the point.
//! - **Neighbour search**: every body whose sphere overlaps a query sphere, pruning cells
//!   by their tight extent grown by the largest radius they hold.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::Point3;
//! use hillbox::config::TreeParams;
//! use hillbox::particle::Particle;
//! use hillbox::tree::{RootGrid, Tree, Walk};
//!
//! let bodies = vec![
//!     Particle::new(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]),
//!     Particle::new(1e-3, [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
//! ];
//!
//! let grid = RootGrid::enclosing(&bodies);
//! let tree = Tree::build(&bodies, &grid, TreeParams::default());
//!
//! let walk = Walk { theta: 0.5, g: 1.0, softening: 0.0 };
//! let accel = tree.acceleration(Point3::new(1.0, 0.0, 0.0), Some(1), &walk);
//! assert!(accel.x < 0.0);
//! ```

use nalgebra::{Point3, Vector3};

use crate::boundary::GhostOffset;
use crate::collisions::CandidatePair;
use crate::config::{BoxConfig, TreeParams};
use crate::forces::pair_acceleration;

/// Anything the tree can index: a position, a mass and an optional collision radius.
pub trait Massive: Copy {
    fn position(&self) -> Point3<f64>;

    fn mass(&self) -> f64;

    /// Collision radius. Zero means the body never collides.
    fn radius(&self) -> f64 {
        0.0
    }
}

/// Axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        BoundingBox { min, max }
    }

    /// The inverted box; the identity for [`union`](Self::union).
    pub fn empty() -> Self {
        BoundingBox {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Tightest box around the given bodies.
    pub fn new_from_bodies<B: Massive>(bodies: &[B]) -> Self {
        bodies
            .iter()
            .fold(Self::empty(), |bounds, body| bounds.including(&body.position()))
    }

    /// Smallest cube, centred on the bodies' extent, that holds all of them.
    ///
    /// Degenerate inputs (no bodies, or all bodies at one point) get a unit cube.
    pub fn cube_around<B: Massive>(bodies: &[B]) -> Self {
        let tight = Self::new_from_bodies(bodies);
        let extent = tight.max - tight.min;
        let width = extent.x.max(extent.y).max(extent.z);

        if !width.is_finite() || width <= 0.0 {
            let center = tight.center();
            let center = if center.coords.iter().all(|c| c.is_finite()) {
                center
            } else {
                Point3::origin()
            };
            let half = Vector3::repeat(0.5);
            return BoundingBox::new(center - half, center + half);
        }

        // Pad so that bodies on the max face still fall strictly inside.
        let half = Vector3::repeat(0.5 * width * (1.0 + 1e-9));
        let center = tight.center();
        BoundingBox::new(center - half, center + half)
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Largest edge length.
    pub fn width(&self) -> f64 {
        let extent = self.max - self.min;
        extent.x.max(extent.y).max(extent.z)
    }

    pub fn contains(&self, point: &Point3<f64>) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }

    /// Squared distance from `point` to the nearest point of the box (zero inside).
    pub fn distance_squared_to(&self, point: &Point3<f64>) -> f64 {
        (0..3)
            .map(|axis| {
                let d = (self.min[axis] - point[axis])
                    .max(point[axis] - self.max[axis])
                    .max(0.0);
                d * d
            })
            .sum()
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    fn including(&self, point: &Point3<f64>) -> BoundingBox {
        BoundingBox {
            min: self.min.inf(point),
            max: self.max.sup(point),
        }
    }

    /// Octant (0-7) of `point`: bit 0 set above the centre in x, bit 1 in y, bit 2 in z.
    fn octant(&self, point: &Point3<f64>) -> usize {
        let center = self.center();
        let x_bit = (point.x > center.x) as usize;
        let y_bit = (point.y > center.y) as usize;
        let z_bit = (point.z > center.z) as usize;
        x_bit | (y_bit << 1) | (z_bit << 2)
    }

    fn subdivide(&self, octant: usize) -> Self {
        let center = self.center();
        let mut min = self.min;
        let mut max = center;
        for axis in 0..3 {
            if octant & (1 << axis) != 0 {
                min[axis] = center[axis];
                max[axis] = self.max[axis];
            }
        }
        BoundingBox { min, max }
    }
}

/// Grid of equal cubic root cells, each the root of one octree.
#[derive(Clone, Debug, PartialEq)]
pub struct RootGrid {
    origin: Point3<f64>,
    root_size: f64,
    cells: [usize; 3],
}

impl RootGrid {
    /// Root cells of a finite domain centred on the origin.
    pub fn from_box(domain: &BoxConfig) -> Self {
        RootGrid {
            origin: Point3::from(-0.5 * domain.size()),
            root_size: domain.root_size,
            cells: domain.root_cells,
        }
    }

    /// A single root cube around all bodies.
    pub fn enclosing<B: Massive>(bodies: &[B]) -> Self {
        let cube = BoundingBox::cube_around(bodies);
        RootGrid {
            origin: cube.min,
            root_size: cube.width(),
            cells: [1, 1, 1],
        }
    }

    /// Root cells of `domain` when finite, otherwise an enclosing cube.
    pub fn for_domain<B: Massive>(domain: Option<&BoxConfig>, bodies: &[B]) -> Self {
        match domain {
            Some(domain) => Self::from_box(domain),
            None => Self::enclosing(bodies),
        }
    }

    pub fn cell_count(&self) -> usize {
        self.cells.iter().product()
    }

    pub fn cell_bounds(&self, cell: usize) -> BoundingBox {
        let [nx, ny, _] = self.cells;
        let index = [cell % nx, (cell / nx) % ny, cell / (nx * ny)];
        let min = Point3::new(
            self.origin.x + index[0] as f64 * self.root_size,
            self.origin.y + index[1] as f64 * self.root_size,
            self.origin.z + index[2] as f64 * self.root_size,
        );
        BoundingBox::new(min, min + Vector3::repeat(self.root_size))
    }

    /// Root cell owning `point`. Points outside the grid go to the nearest edge cell.
    pub fn cell_of(&self, point: &Point3<f64>) -> usize {
        let index: [usize; 3] = std::array::from_fn(|axis| {
            let i = ((point[axis] - self.origin[axis]) / self.root_size).floor();
            let last = self.cells[axis] - 1;
            if i.is_nan() || i < 0.0 {
                0
            } else {
                (i as usize).min(last)
            }
        });
        index[0] + self.cells[0] * (index[1] + self.cells[1] * index[2])
    }
}

/// Index into the node arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeId(u32);

impl NodeId {
    /// Sentinel for an empty cell
    pub const EMPTY: NodeId = NodeId(u32::MAX);

    fn new(index: usize) -> Self {
        debug_assert!(index < u32::MAX as usize, "NodeId overflow");
        NodeId(index as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

#[derive(Clone, Copy, Debug)]
pub enum NodeKind {
    /// Bodies `items[start..start + count]`. More than `max_leaf` only at the depth cap.
    Leaf { start: u32, count: u32 },
    /// Eight octants, `EMPTY` where no body falls.
    Internal { children: [NodeId; 8] },
}

/// One cell of the octree with its aggregate properties.
#[derive(Clone, Copy, Debug)]
pub struct Node {
    /// Cell geometry, used by the opening criterion.
    pub bounds: BoundingBox,
    /// Tight box around the bodies actually held, used for pruning.
    pub extent: BoundingBox,
    pub mass: f64,
    pub center_of_mass: Point3<f64>,
    /// Largest collision radius in the subtree.
    pub max_radius: f64,
    pub kind: NodeKind,
}

/// Parameters of a Barnes-Hut force walk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Walk {
    pub theta: f64,
    pub g: f64,
    pub softening: f64,
}

/// Arena octree over a borrowed body slice.
///
/// The tree stores indices into `bodies`, so it is only valid while the slice is
/// unchanged. It is rebuilt every step and never mutated after construction.
pub struct Tree<'a, B: Massive> {
    nodes: Vec<Node>,
    /// Body indices grouped by leaf.
    items: Vec<u32>,
    bodies: &'a [B],
    roots: Vec<NodeId>,
}

impl<'a, B: Massive> Tree<'a, B> {
    /// Builds one octree per root cell of `grid`.
    ///
    /// Cells are bisected until a leaf holds at most `params.max_leaf` bodies or
    /// `params.max_depth` is reached; coincident bodies therefore end up sharing a leaf
    /// instead of recursing forever.
    pub fn build(bodies: &'a [B], grid: &RootGrid, params: TreeParams) -> Self {
        let mut per_cell: Vec<Vec<usize>> = vec![Vec::new(); grid.cell_count()];
        for (i, body) in bodies.iter().enumerate() {
            per_cell[grid.cell_of(&body.position())].push(i);
        }

        let mut nodes = Vec::with_capacity(bodies.len() * 2);
        let mut items = Vec::with_capacity(bodies.len());
        let roots = per_cell
            .iter()
            .enumerate()
            .map(|(cell, indices)| {
                Self::build_recursive(
                    bodies,
                    indices,
                    grid.cell_bounds(cell),
                    0,
                    params,
                    &mut nodes,
                    &mut items,
                )
            })
            .collect();

        Tree {
            nodes,
            items,
            bodies,
            roots,
        }
    }

    fn build_recursive(
        bodies: &[B],
        indices: &[usize],
        bounds: BoundingBox,
        depth: usize,
        params: TreeParams,
        nodes: &mut Vec<Node>,
        items: &mut Vec<u32>,
    ) -> NodeId {
        if indices.is_empty() {
            return NodeId::EMPTY;
        }

        if indices.len() <= params.max_leaf || depth >= params.max_depth {
            let start = items.len() as u32;
            items.extend(indices.iter().map(|&i| i as u32));
            let node = Self::summarize_leaf(
                bodies,
                indices,
                bounds,
                NodeKind::Leaf {
                    start,
                    count: indices.len() as u32,
                },
            );
            let id = NodeId::new(nodes.len());
            nodes.push(node);
            return id;
        }

        let mut octants: [Vec<usize>; 8] = Default::default();
        for &i in indices {
            octants[bounds.octant(&bodies[i].position())].push(i);
        }

        let children: [NodeId; 8] = std::array::from_fn(|o| {
            Self::build_recursive(
                bodies,
                &octants[o],
                bounds.subdivide(o),
                depth + 1,
                params,
                nodes,
                items,
            )
        });

        // Aggregate bottom-up from the children
        let mut mass = 0.0;
        let mut weighted = Vector3::zeros();
        let mut extent = BoundingBox::empty();
        let mut max_radius: f64 = 0.0;
        for child in children.iter().filter(|c| !c.is_empty()) {
            let child = &nodes[child.index()];
            mass += child.mass;
            weighted += child.center_of_mass.coords * child.mass;
            extent = extent.union(&child.extent);
            max_radius = max_radius.max(child.max_radius);
        }

        let id = NodeId::new(nodes.len());
        nodes.push(Node {
            bounds,
            extent,
            mass,
            center_of_mass: center_of_mass(mass, weighted, &extent),
            max_radius,
            kind: NodeKind::Internal { children },
        });
        id
    }

    fn summarize_leaf(
        bodies: &[B],
        indices: &[usize],
        bounds: BoundingBox,
        kind: NodeKind,
    ) -> Node {
        let mut mass = 0.0;
        let mut weighted = Vector3::zeros();
        let mut extent = BoundingBox::empty();
        let mut max_radius: f64 = 0.0;
        for &i in indices {
            let body = &bodies[i];
            let pos = body.position();
            mass += body.mass();
            weighted += pos.coords * body.mass();
            extent = extent.including(&pos);
            max_radius = max_radius.max(body.radius());
        }

        Node {
            bounds,
            extent,
            mass,
            center_of_mass: center_of_mass(mass, weighted, &extent),
            max_radius,
            kind,
        }
    }

    /// Gravitational acceleration at `pos` from every body in the tree.
    ///
    /// # Arguments
    ///
    /// * `pos` - Point to evaluate at
    /// * `skip` - Body excluded from the sum (the target itself)
    /// * `walk` - Opening angle, G and softening
    ///
    /// With `walk.theta == 0` every cell is opened and the result equals direct summation.
    pub fn acceleration(
        &self,
        pos: Point3<f64>,
        skip: Option<usize>,
        walk: &Walk,
    ) -> Vector3<f64> {
        let softening_sq = walk.softening * walk.softening;
        self.roots
            .iter()
            .map(|&root| self.acceleration_recursive(root, &pos, skip, walk, softening_sq))
            .sum()
    }

    fn acceleration_recursive(
        &self,
        id: NodeId,
        pos: &Point3<f64>,
        skip: Option<usize>,
        walk: &Walk,
        softening_sq: f64,
    ) -> Vector3<f64> {
        if id.is_empty() {
            return Vector3::zeros();
        }
        let node = &self.nodes[id.index()];
        if node.mass == 0.0 {
            return Vector3::zeros();
        }

        match node.kind {
            NodeKind::Leaf { start, count } => self
                .leaf_items(start, count)
                .filter(|&j| Some(j) != skip)
                .map(|j| {
                    let body = &self.bodies[j];
                    pair_acceleration(pos, &body.position(), body.mass(), walk.g, softening_sq)
                })
                .sum(),
            NodeKind::Internal { children } => {
                let distance = (node.center_of_mass - pos).magnitude();
                let holds_target = node.bounds.contains(pos) || node.extent.contains(pos);
                if !holds_target && node.bounds.width() < walk.theta * distance {
                    pair_acceleration(pos, &node.center_of_mass, node.mass, walk.g, softening_sq)
                } else {
                    children
                        .iter()
                        .map(|&child| {
                            self.acceleration_recursive(child, pos, skip, walk, softening_sq)
                        })
                        .sum()
                }
            }
        }
    }

    /// Indices of bodies whose sphere overlaps the sphere of `radius` around `center`.
    ///
    /// Results come in traversal order: root cells in grid order, octants 0 to 7.
    pub fn neighbors_within(&self, center: Point3<f64>, radius: f64) -> Vec<usize> {
        let mut found = Vec::new();
        for &root in &self.roots {
            self.neighbors_recursive(root, &center, radius, &mut found);
        }
        found
    }

    fn neighbors_recursive(
        &self,
        id: NodeId,
        center: &Point3<f64>,
        radius: f64,
        found: &mut Vec<usize>,
    ) {
        if id.is_empty() {
            return;
        }
        let node = &self.nodes[id.index()];
        let reach = radius + node.max_radius;
        if node.extent.distance_squared_to(center) > reach * reach {
            return;
        }

        match node.kind {
            NodeKind::Leaf { start, count } => {
                for j in self.leaf_items(start, count) {
                    let body = &self.bodies[j];
                    let reach = radius + body.radius();
                    if (body.position() - center).magnitude_squared() <= reach * reach {
                        found.push(j);
                    }
                }
            }
            NodeKind::Internal { children } => {
                for child in children {
                    self.neighbors_recursive(child, center, radius, found);
                }
            }
        }
    }

    /// Overlapping pairs `(i, j)` with `i < j`, the image of `i` under each offset
    /// tested against the primary `j`.
    ///
    /// Bodies with zero radius are skipped. Pairs come ordered by `i`, then offset, then
    /// traversal order of `j`.
    pub fn collision_candidates(&self, offsets: &[GhostOffset]) -> Vec<CandidatePair> {
        let mut pairs = Vec::new();
        for (i, body) in self.bodies.iter().enumerate() {
            if body.radius() <= 0.0 {
                continue;
            }
            for offset in offsets {
                let center = offset.position(&body.position());
                for j in self.neighbors_within(center, body.radius()) {
                    if j > i && self.bodies[j].radius() > 0.0 {
                        pairs.push(CandidatePair {
                            i,
                            j,
                            offset: *offset,
                        });
                    }
                }
            }
        }
        pairs
    }

    fn leaf_items(&self, start: u32, count: u32) -> impl Iterator<Item = usize> + '_ {
        self.items[start as usize..(start + count) as usize]
            .iter()
            .map(|&i| i as usize)
    }

    /// Root node of each root cell, `EMPTY` for cells without bodies.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        if id.is_empty() {
            None
        } else {
            self.nodes.get(id.index())
        }
    }

    /// Body indices held by a leaf, empty for internal nodes.
    pub fn leaf_bodies(&self, id: NodeId) -> Vec<usize> {
        match self.node(id).map(|n| n.kind) {
            Some(NodeKind::Leaf { start, count }) => self.leaf_items(start, count).collect(),
            _ => Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaves holding more than one body.
    pub fn multi_leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Leaf { count, .. } if count > 1))
            .count()
    }
}

/// Mass-weighted centre, or the middle of the extent for a massless cell.
fn center_of_mass(mass: f64, weighted: Vector3<f64>, extent: &BoundingBox) -> Point3<f64> {
    if mass != 0.0 {
        Point3::from(weighted / mass)
    } else {
        extent.center()
    }
}
