//! Gravity models
//!
//! A [`ForceModel`] turns the current particle slice into one acceleration per particle.
//! Only the active prefix exerts gravity; every particle, test particles included,
//! receives an acceleration. Periodic images of the sources are visited through the
//! ghost offsets handed in with the [`ForceContext`].

use nalgebra::{Point3, Vector3};

use crate::boundary::GhostOffset;
use crate::config::{BoxConfig, GravityMode, SimulationConfig};
use crate::particle::Particle;

pub mod gravity;
pub mod tree_gravity;


pub use gravity::DirectGravity;
pub use tree_gravity::TreeGravity;

/// Everything a force model may read during one evaluation.
#[derive(Clone, Copy, Debug)]
pub struct ForceContext<'a> {
    pub particles: &'a [Particle],
    /// Sources are `particles[..active_count]`.
    pub active_count: usize,
    /// Images of the box to sum over, the identity included.
    pub offsets: &'a [GhostOffset],
    /// Finite domain, if any, for laying out tree root cells.
    pub domain: Option<&'a BoxConfig>,
}

impl<'a> ForceContext<'a> {
    /// Context for an open, unbounded system with every particle active.
    pub fn open(particles: &'a [Particle], offsets: &'a [GhostOffset]) -> Self {
        ForceContext {
            particles,
            active_count: particles.len(),
            offsets,
            domain: None,
        }
    }
}

/// A source of acceleration
///
/// Implementations must not keep state between calls: the returned vector is written
/// over every particle's acceleration, so nothing carries over from an earlier step.
///
/// # Examples
///
/// ```
/// use hillbox::boundary::GhostOffset;
/// use hillbox::forces::{DirectGravity, ForceContext, ForceModel};
/// use hillbox::particle::Particle;
///
/// let particles = vec![
///     Particle::new(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]),
///     Particle::new(1.0, [2.0, 0.0, 0.0], [0.0, 0.0, 0.0]),
/// ];
/// let offsets = [GhostOffset::identity()];
///
/// let accels = DirectGravity::new().accelerations(&ForceContext::open(&particles, &offsets));
/// assert!((accels[0].x - 0.25).abs() < 1e-12);
/// ```
pub trait ForceModel: Send + Sync {
    /// One acceleration per particle, in store order.
    fn accelerations(&self, ctx: &ForceContext) -> Vec<Vector3<f64>>;
}

/// Builds the gravity model selected by `config`, `None` when gravity is off.
pub fn gravity_for(config: &SimulationConfig) -> Option<Box<dyn ForceModel>> {
    match config.gravity {
        GravityMode::None => None,
        GravityMode::Direct => Some(Box::new(DirectGravity::with_softening(
            config.g,
            config.softening,
        ))),
        GravityMode::Tree => Some(Box::new(TreeGravity {
            theta: config.opening_angle,
            g: config.g,
            softening: config.softening,
            tree: config.tree,
            direct_threshold: config.direct_threshold,
        })),
    }
}

/// Acceleration at `target` due to a point mass at `source`.
///
/// `a = G m (source - target) / (|d|² + ε²)^{3/2}`. A pair at zero separation without
/// softening contributes nothing.
#[inline]
pub fn pair_acceleration(
    target: &Point3<f64>,
    source: &Point3<f64>,
    mass: f64,
    g: f64,
    softening_sq: f64,
) -> Vector3<f64> {
    let d = source - target;
    let r2 = d.magnitude_squared() + softening_sq;
    if r2 == 0.0 {
        return Vector3::zeros();
    }
    d * (g * mass / (r2 * r2.sqrt()))
}
