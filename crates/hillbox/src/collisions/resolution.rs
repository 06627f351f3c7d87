//! Collision resolution: hard-sphere bounces or momentum-conserving mergers
//!
//! Candidate pairs are resolved one at a time, in the order the detector produced them.
//! Each pair is re-checked against the velocities left by earlier pairs, so a pair that
//! an earlier bounce has already separated is skipped. This sequential policy is an
//! approximation for dense packings where several contacts happen at once.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::boundary::GhostOffset;
use crate::collisions::{CandidatePair, Restitution};
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::particle::Particle;
use crate::state::ParticleStore;

/// How colliding pairs are treated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionSettings {
    /// Fraction of the tangential relative velocity kept. 1 is frictionless.
    pub tangential_restitution: f64,
    /// Merge colliding pairs instead of bouncing them.
    pub merge: bool,
}

impl CollisionSettings {
    pub fn from_config(config: &SimulationConfig) -> Self {
        CollisionSettings {
            tangential_restitution: config.tangential_restitution,
            merge: config.merge_on_collision,
        }
    }
}

impl Default for CollisionSettings {
    fn default() -> Self {
        CollisionSettings {
            tangential_restitution: 1.0,
            merge: false,
        }
    }
}

/// Running totals of resolved collisions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CollisionStats {
    /// Pairs that bounced.
    pub collisions: u64,
    /// Pairs that merged.
    pub merges: u64,
    /// Merges refused as unphysical.
    pub skipped: u64,
    /// Accumulated `|Δx| m δv_y` of the radially outer partner: the collisional
    /// transport of y-momentum across x.
    pub momentum_flux: f64,
}

impl CollisionStats {
    pub fn accumulate(&mut self, other: &CollisionStats) {
        self.collisions += other.collisions;
        self.merges += other.merges;
        self.skipped += other.skipped;
        self.momentum_flux += other.momentum_flux;
    }
}

/// Resolve candidate pairs in order
///
/// # Arguments
///
/// * `store` - Particles to update in place
/// * `pairs` - Candidate pairs, `i < j`, offset applied to `i`
/// * `restitution` - Normal restitution law, evaluated at the normal impact speed
/// * `settings` - Tangential coefficient and merge mode
/// * `time` - Stamped into `last_collision`
///
/// # Returns
///
/// Statistics for this pass. In merge mode, absorbed particles are removed after the
/// pass by swapping with the last particle, so indices shift.
pub fn resolve_collisions(
    store: &mut ParticleStore,
    pairs: &[CandidatePair],
    restitution: &dyn Restitution,
    settings: &CollisionSettings,
    time: f64,
) -> Result<CollisionStats> {
    let mut stats = CollisionStats::default();
    let mut consumed = vec![false; store.len()];

    for pair in pairs {
        if consumed[pair.i] || consumed[pair.j] {
            continue;
        }
        let particles = store.particles_mut();
        let a = particles[pair.i];
        let b = particles[pair.j];

        let separation = pair.offset.separation(&a, &b);
        let relative_velocity = pair.offset.relative_velocity(&a, &b);
        let distance = separation.magnitude();
        let touching = distance > 0.0 && distance <= a.radius + b.radius;
        if !touching || relative_velocity.dot(&separation) >= 0.0 {
            continue;
        }
        if a.fixed && b.fixed {
            continue;
        }

        if settings.merge {
            match merge_pair(&a, &b, &pair.offset) {
                Some(merged) => {
                    particles[pair.i] = Particle {
                        last_collision: Some(time),
                        ..merged
                    };
                    consumed[pair.j] = true;
                    stats.merges += 1;
                }
                None => {
                    warn!(
                        i = pair.i,
                        j = pair.j,
                        mass_i = a.mass,
                        mass_j = b.mass,
                        "skipping merge with negative or non-finite mass"
                    );
                    stats.skipped += 1;
                }
            }
            continue;
        }

        let normal = separation / distance;
        let delta = bounce_impulse(
            &normal,
            &relative_velocity,
            restitution,
            settings.tangential_restitution,
        );

        // A fixed partner acts as an infinite mass
        let total = a.mass + b.mass;
        let (share_i, share_j) = if a.fixed {
            (0.0, 1.0)
        } else if b.fixed {
            (1.0, 0.0)
        } else if total > 0.0 {
            (b.mass / total, a.mass / total)
        } else {
            (0.5, 0.5)
        };
        let dv_i = delta * share_i;
        let dv_j = -delta * share_j;

        // The radially outer partner carries the flux
        stats.momentum_flux += if separation.x > 0.0 {
            separation.x * dv_i.y * a.mass
        } else {
            -separation.x * dv_j.y * b.mass
        };

        particles[pair.i].velocity += dv_i;
        particles[pair.j].velocity += dv_j;
        particles[pair.i].last_collision = Some(time);
        particles[pair.j].last_collision = Some(time);
        stats.collisions += 1;
    }

    if stats.merges > 0 {
        for index in (0..consumed.len()).rev().filter(|&k| consumed[k]) {
            store.remove(index)?;
        }
        debug!(
            merges = stats.merges,
            remaining = store.len(),
            "merged colliding particles"
        );
    }

    Ok(stats)
}

/// Change of the relative velocity `v_i - v_j` in one bounce.
///
/// The normal component goes from `v_n` to `-e v_n`; the tangential one is scaled by
/// the tangential coefficient.
fn bounce_impulse(
    normal: &Vector3<f64>,
    relative_velocity: &Vector3<f64>,
    restitution: &dyn Restitution,
    tangential_restitution: f64,
) -> Vector3<f64> {
    let vn = relative_velocity.dot(normal);
    let e = restitution.coefficient(vn.abs());
    let e = if e.is_nan() { 1.0 } else { e.clamp(0.0, 1.0) };

    let tangential = relative_velocity - normal * vn;
    normal * (-(1.0 + e) * vn) - tangential * (1.0 - tangential_restitution)
}

/// Mass- and momentum-conserving merger of the image of `a` with `b`.
///
/// The result sits in `b`'s frame, at the centre of mass, with a volume-conserving
/// radius. `None` when either mass is negative or the total is not finite.
pub fn merge_pair(a: &Particle, b: &Particle, offset: &GhostOffset) -> Option<Particle> {
    let total = a.mass + b.mass;
    if a.mass < 0.0 || b.mass < 0.0 || !total.is_finite() {
        return None;
    }
    let (wa, wb) = if total > 0.0 {
        (a.mass / total, b.mass / total)
    } else {
        (0.5, 0.5)
    };

    let position_a = offset.position(&a.position);
    let velocity_a = a.velocity + offset.velocity_shift;

    Some(Particle {
        position: Point3::from(position_a.coords * wa + b.position.coords * wb),
        velocity: velocity_a * wa + b.velocity * wb,
        acceleration: Vector3::zeros(),
        mass: total,
        radius: (a.radius.powi(3) + b.radius.powi(3)).cbrt(),
        last_collision: a.last_collision,
        fixed: a.fixed || b.fixed,
    })
}
