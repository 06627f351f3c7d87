//! Direct N-body gravity calculation (O(N²))

use nalgebra::Vector3;
use rayon::prelude::*;

use crate::forces::{pair_acceleration, ForceContext, ForceModel};

/// Direct summation over every active source and every ghost image
///
/// Exact up to floating point. Each particle's acceleration is computed independently
/// in parallel, so the cost is `O(N · N_active · N_images)`.
///
/// # Examples
///
/// ```
/// use hillbox::forces::DirectGravity;
///
/// // Unit G, no softening
/// let gravity = DirectGravity::new();
///
/// // Plummer softening of 0.01 length units
/// let softened = DirectGravity::with_softening(1.0, 0.01);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectGravity {
    pub g: f64,
    pub softening: f64,
}

impl DirectGravity {
    pub fn new() -> Self {
        Self {
            g: 1.0,
            softening: 0.0,
        }
    }

    pub fn with_softening(g: f64, softening: f64) -> Self {
        Self { g, softening }
    }

    /// Acceleration of particle `i` from all sources in all images.
    pub fn acceleration_on(&self, i: usize, ctx: &ForceContext) -> Vector3<f64> {
        let softening_sq = self.softening * self.softening;
        let target = ctx.particles[i].position;
        let sources = &ctx.particles[..ctx.active_count];

        let mut acc = Vector3::zeros();
        for offset in ctx.offsets {
            let identity = offset.is_identity();
            let shifted = offset.position(&target);
            for (j, source) in sources.iter().enumerate() {
                if identity && j == i {
                    continue;
                }
                acc += pair_acceleration(
                    &shifted,
                    &source.position,
                    source.mass,
                    self.g,
                    softening_sq,
                );
            }
        }
        acc
    }
}

impl Default for DirectGravity {
    fn default() -> Self {
        Self::new()
    }
}

impl ForceModel for DirectGravity {
    fn accelerations(&self, ctx: &ForceContext) -> Vec<Vector3<f64>> {
        (0..ctx.particles.len())
            .into_par_iter()
            .map(|i| self.acceleration_on(i, ctx))
            .collect()
    }
}
