//! Collision detection using various strategies
//!
//! Provides three detectors producing the same kind of output:
//! - DirectDetector: O(N² · images), the reference
//! - TreeDetector: octree neighbour search
//! - PlaneSweepDetector: sort-and-sweep along one axis
//!
//! A [`CandidatePair`] `(i, j, offset)` always has `i < j` and means "the image of `i`
//! under `offset` overlaps the primary `j`". Whether the pair is approaching is left to
//! the resolver, which sees velocities updated by earlier pairs.

use crate::boundary::GhostOffset;
use crate::config::{Axis, BoxConfig, CollisionMode, SimulationConfig, TreeParams};
use crate::particle::Particle;
use crate::tree::{RootGrid, Tree};

/// Two overlapping spheres, possibly across a periodic boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidatePair {
    pub i: usize,
    pub j: usize,
    /// Applied to `i`.
    pub offset: GhostOffset,
}

/// Inputs shared by all detectors.
#[derive(Debug, Clone, Copy)]
pub struct SearchContext<'a> {
    pub particles: &'a [Particle],
    pub offsets: &'a [GhostOffset],
    pub domain: Option<&'a BoxConfig>,
}

/// Strategy for enumerating candidate collision pairs
///
/// Output order must depend only on the input, never on timing or hashing, so that
/// sequential resolution is reproducible.
pub trait CollisionDetector: Send + Sync {
    fn candidates(&self, ctx: &SearchContext) -> Vec<CandidatePair>;
}

/// Builds the detector selected by `config`, `None` when collisions are off.
pub fn detector_for(config: &SimulationConfig) -> Option<Box<dyn CollisionDetector>> {
    match config.collision {
        CollisionMode::None => None,
        CollisionMode::Direct => Some(Box::new(DirectDetector)),
        CollisionMode::Tree => Some(Box::new(TreeDetector { tree: config.tree })),
        CollisionMode::PlaneSweep => Some(Box::new(PlaneSweepDetector {
            axis: config.sweep_axis,
        })),
    }
}

/// Whether the image of `a` under `offset` overlaps `b`.
fn overlaps(a: &Particle, b: &Particle, offset: &GhostOffset) -> bool {
    let reach = a.radius + b.radius;
    offset.separation(a, b).magnitude_squared() <= reach * reach
}

/// O(N²) detector checking every pair in every image
///
/// Pairs come ordered by image, then `i`, then `j`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDetector;

impl CollisionDetector for DirectDetector {
    fn candidates(&self, ctx: &SearchContext) -> Vec<CandidatePair> {
        let particles = ctx.particles;
        let mut pairs = Vec::new();

        for offset in ctx.offsets {
            for (i, a) in particles.iter().enumerate() {
                if !a.can_collide() {
                    continue;
                }
                for (j, b) in particles.iter().enumerate().skip(i + 1) {
                    if b.can_collide() && overlaps(a, b, offset) {
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
}

/// Octree-based detector
///
/// Builds a fresh tree over all particles and, for each particle and image, collects the
/// bodies overlapping its sphere. Pairs come ordered by `i`, then image, then tree
/// traversal order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeDetector {
    pub tree: TreeParams,
}

impl CollisionDetector for TreeDetector {
    fn candidates(&self, ctx: &SearchContext) -> Vec<CandidatePair> {
        let grid = RootGrid::for_domain(ctx.domain, ctx.particles);
        let tree = Tree::build(ctx.particles, &grid, self.tree);
        tree.collision_candidates(ctx.offsets)
    }
}

/// Sort-and-sweep detector
///
/// Every sphere, in every image, becomes an interval on `axis`. Intervals are sorted by
/// lower end and swept with an active list; only overlapping intervals are tested in 3D.
/// A pair is kept when it joins two primaries, or a primary `j` with an image of `i < j`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaneSweepDetector {
    pub axis: Axis,
}

#[derive(Debug, Clone, Copy)]
struct Interval {
    lo: f64,
    hi: f64,
    index: usize,
    image: usize,
    primary: bool,
}

impl PlaneSweepDetector {
    fn intervals(&self, ctx: &SearchContext) -> Vec<Interval> {
        let axis = self.axis.index();
        let mut intervals = Vec::with_capacity(ctx.particles.len() * ctx.offsets.len());

        for (image, offset) in ctx.offsets.iter().enumerate() {
            let primary = offset.is_identity();
            for (index, p) in ctx.particles.iter().enumerate() {
                if !p.can_collide() {
                    continue;
                }
                let center = p.position[axis] + offset.shift[axis];
                intervals.push(Interval {
                    lo: center - p.radius,
                    hi: center + p.radius,
                    index,
                    image,
                    primary,
                });
            }
        }

        intervals.sort_by(|a, b| {
            a.lo.total_cmp(&b.lo)
                .then(a.index.cmp(&b.index))
                .then(a.image.cmp(&b.image))
        });
        intervals
    }

    /// Canonical pair for two overlapping intervals, if they should be reported.
    fn pair(&self, ctx: &SearchContext, a: &Interval, b: &Interval) -> Option<CandidatePair> {
        if a.index == b.index {
            return None;
        }
        let (ghost, primary) = match (a.primary, b.primary) {
            (true, true) => {
                let (i, j) = (a.index.min(b.index), a.index.max(b.index));
                return Some(CandidatePair {
                    i,
                    j,
                    offset: GhostOffset::identity(),
                });
            }
            (false, true) => (a, b),
            (true, false) => (b, a),
            (false, false) => return None,
        };

        (ghost.index < primary.index).then(|| CandidatePair {
            i: ghost.index,
            j: primary.index,
            offset: ctx.offsets[ghost.image],
        })
    }
}

impl CollisionDetector for PlaneSweepDetector {
    fn candidates(&self, ctx: &SearchContext) -> Vec<CandidatePair> {
        let intervals = self.intervals(ctx);
        let mut active: Vec<Interval> = Vec::new();
        let mut pairs = Vec::new();

        for current in &intervals {
            active.retain(|a| a.hi >= current.lo);
            for open in &active {
                let Some(pair) = self.pair(ctx, open, current) else {
                    continue;
                };
                let (a, b) = (&ctx.particles[pair.i], &ctx.particles[pair.j]);
                if overlaps(a, b, &pair.offset) {
                    pairs.push(pair);
                }
            }
            active.push(*current);
        }

        pairs
    }
}
