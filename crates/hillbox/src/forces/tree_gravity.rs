//! Tree-based gravity using the Barnes-Hut algorithm (O(N log N))

use nalgebra::Vector3;
use rayon::prelude::*;

use crate::config::TreeParams;
use crate::forces::{DirectGravity, ForceContext, ForceModel};
use crate::tree::{RootGrid, Tree, Walk};

/// Barnes-Hut gravity over an octree of the active particles
///
/// A cell is taken as a single point mass when `width / distance < θ` and it does not
/// contain the target. Below `direct_threshold` particles the tree is skipped and the
/// sum is done directly.
///
/// # Opening Angle (θ)
///
/// - θ = 0.0: every cell opened, identical to direct summation
/// - θ = 0.5: typical production value
/// - θ = 1.0: coarse but fast
///
/// # Examples
///
/// ```
/// use hillbox::forces::TreeGravity;
///
/// let gravity = TreeGravity::with_theta(0.3);
/// assert_eq!(gravity.theta, 0.3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeGravity {
    pub theta: f64,
    pub g: f64,
    pub softening: f64,
    pub tree: TreeParams,
    pub direct_threshold: usize,
}

impl TreeGravity {
    pub fn new() -> Self {
        Self {
            theta: 0.5,
            g: 1.0,
            softening: 0.0,
            tree: TreeParams::default(),
            direct_threshold: 16,
        }
    }

    pub fn with_theta(theta: f64) -> Self {
        Self {
            theta,
            ..Self::new()
        }
    }

    pub fn with_softening(theta: f64, softening: f64) -> Self {
        Self {
            theta,
            softening,
            ..Self::new()
        }
    }

    fn walk(&self) -> Walk {
        Walk {
            theta: self.theta,
            g: self.g,
            softening: self.softening,
        }
    }
}

impl Default for TreeGravity {
    fn default() -> Self {
        Self::new()
    }
}

impl ForceModel for TreeGravity {
    fn accelerations(&self, ctx: &ForceContext) -> Vec<Vector3<f64>> {
        if ctx.particles.len() < self.direct_threshold {
            return DirectGravity::with_softening(self.g, self.softening).accelerations(ctx);
        }

        let sources = &ctx.particles[..ctx.active_count];
        let grid = RootGrid::for_domain(ctx.domain, sources);
        let tree = Tree::build(sources, &grid, self.tree);
        let walk = self.walk();

        (0..ctx.particles.len())
            .into_par_iter()
            .map(|i| {
                let target = ctx.particles[i].position;
                ctx.offsets
                    .iter()
                    .map(|offset| {
                        let skip = (offset.is_identity() && i < ctx.active_count).then_some(i);
                        tree.acceleration(offset.position(&target), skip, &walk)
                    })
                    .sum::<Vector3<f64>>()
            })
            .collect()
    }
}
