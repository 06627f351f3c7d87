//! Domain boundaries and ghost images.
//!
//! A [`Boundary`] knows how to fold a particle back into the primary box and which
//! periodic images ("ghosts") of the box the force and collision routines must visit.
//! In the shearing sheet the radial images slide along `y` with the Keplerian shear
//! and carry a velocity offset, so every image is described by a position shift and
//! a velocity shift ([`GhostOffset`]).

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::{GhostCounts, SimulationConfig};
use crate::error::Result;
use crate::particle::Particle;
use crate::state::ParticleStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundaryMode {
    /// No wrapping and no ghosts. With a finite box, escaping particles are removed.
    #[default]
    Open,
    /// Every axis wraps with the box length.
    Periodic,
    /// Shearing sheet: periodic, with radial images sliding in `y` at `-1.5 Ω x`.
    Shear,
}

/// Position and velocity displacement of one periodic image of the box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GhostOffset {
    pub shift: Vector3<f64>,
    pub velocity_shift: Vector3<f64>,
}

impl GhostOffset {
    pub fn identity() -> Self {
        GhostOffset {
            shift: Vector3::zeros(),
            velocity_shift: Vector3::zeros(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.shift == Vector3::zeros() && self.velocity_shift == Vector3::zeros()
    }

    /// Position of the image of `position`.
    pub fn position(&self, position: &Point3<f64>) -> Point3<f64> {
        position + self.shift
    }

    /// Separation vector from `other` to the image of `particle`.
    pub fn separation(&self, particle: &Particle, other: &Particle) -> Vector3<f64> {
        particle.position + self.shift - other.position
    }

    /// Velocity of the image of `particle` relative to `other`, shear included.
    pub fn relative_velocity(&self, particle: &Particle, other: &Particle) -> Vector3<f64> {
        particle.velocity + self.velocity_shift - other.velocity
    }
}

/// What one application of the boundary did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundaryReport {
    pub wrapped: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    mode: BoundaryMode,
    size: Option<Vector3<f64>>,
    ghosts: GhostCounts,
    omega: f64,
}

impl Boundary {
    pub fn new(
        mode: BoundaryMode,
        size: Option<Vector3<f64>>,
        ghosts: GhostCounts,
        omega: f64,
    ) -> Self {
        Boundary {
            mode,
            size,
            ghosts,
            omega,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.boundary, config.box_size(), config.ghosts, config.omega)
    }

    pub fn mode(&self) -> BoundaryMode {
        self.mode
    }

    pub fn size(&self) -> Option<Vector3<f64>> {
        self.size
    }

    /// Offset of image `(i, j, k)` of the primary box at `time`.
    ///
    /// In shear mode the `y` shift of a radial image grows as `-1.5 Ω Lx i t` and is
    /// folded back into `[-Ly/2, Ly/2)` before adding `j Ly`.
    pub fn ghost_image(&self, i: i64, j: i64, k: i64, time: f64) -> GhostOffset {
        let size = match (self.mode, self.size) {
            (BoundaryMode::Open, _) | (_, None) => return GhostOffset::identity(),
            (_, Some(size)) => size,
        };

        let mut shift = Vector3::new(
            size.x * i as f64,
            size.y * j as f64,
            size.z * k as f64,
        );
        let mut velocity_shift = Vector3::zeros();

        if self.mode == BoundaryMode::Shear && i != 0 {
            let vy = -1.5 * self.omega * size.x * i as f64;
            velocity_shift.y = vy;
            shift.y += fold(vy * time, size.y);
        }

        GhostOffset {
            shift,
            velocity_shift,
        }
    }

    /// All images to visit, the primary box included.
    ///
    /// Ordered by `i`, then `j`, then `k`, each from `-n` to `+n`.
    pub fn ghost_offsets(&self, time: f64) -> Vec<GhostOffset> {
        if self.mode == BoundaryMode::Open {
            return vec![GhostOffset::identity()];
        }
        let (nx, ny, nz) = (
            self.ghosts.x as i64,
            self.ghosts.y as i64,
            self.ghosts.z as i64,
        );

        let mut offsets =
            Vec::with_capacity(((2 * nx + 1) * (2 * ny + 1) * (2 * nz + 1)) as usize);
        for i in -nx..=nx {
            for j in -ny..=ny {
                for k in -nz..=nz {
                    offsets.push(self.ghost_image(i, j, k, time));
                }
            }
        }
        offsets
    }

    /// Returns `particle` folded into the primary box.
    ///
    /// Coordinates land in `[-L/2, L/2)`, so a particle sitting exactly on the upper
    /// face maps to the lower one. Wrapping an in-box particle is a no-op.
    pub fn wrap(&self, particle: Particle, time: f64) -> Particle {
        let mut wrapped = particle;
        self.wrap_in_place(&mut wrapped, time);
        wrapped
    }

    /// Folds `particle` into the primary box. Returns whether it moved.
    pub fn wrap_in_place(&self, particle: &mut Particle, time: f64) -> bool {
        let size = match (self.mode, self.size) {
            (BoundaryMode::Open, _) | (_, None) => return false,
            (_, Some(size)) => size,
        };

        let kx = wrap_axis(&mut particle.position.x, size.x);
        if self.mode == BoundaryMode::Shear && kx != 0 {
            let image = self.ghost_image(kx, 0, 0, time);
            particle.position.y -= image.shift.y;
            particle.velocity.y -= image.velocity_shift.y;
        }
        let ky = wrap_axis(&mut particle.position.y, size.y);
        let kz = wrap_axis(&mut particle.position.z, size.z);

        kx != 0 || ky != 0 || kz != 0
    }

    /// Whether an open, finite box has lost this particle.
    pub fn is_outside(&self, particle: &Particle) -> bool {
        match (self.mode, self.size) {
            (BoundaryMode::Open, Some(size)) => (0..3).any(|axis| {
                let half = 0.5 * size[axis];
                let x = particle.position[axis];
                !(-half..half).contains(&x)
            }),
            _ => false,
        }
    }

    /// Wraps every particle into the box, or removes escapees of an open finite box.
    ///
    /// Removal swaps with the last particle, so indices are not preserved.
    pub fn apply(&self, store: &mut ParticleStore, time: f64) -> Result<BoundaryReport> {
        let mut report = BoundaryReport::default();

        match self.mode {
            BoundaryMode::Open => {
                let escaped: Vec<usize> = store
                    .particles()
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| self.is_outside(p))
                    .map(|(i, _)| i)
                    .collect();
                for &i in escaped.iter().rev() {
                    store.remove(i)?;
                }
                report.removed = escaped.len();
            }
            BoundaryMode::Periodic | BoundaryMode::Shear => {
                for p in store.particles_mut() {
                    if self.wrap_in_place(p, time) {
                        report.wrapped += 1;
                    }
                }
            }
        }

        Ok(report)
    }
}

/// Folds `x` into `[-L/2, L/2)` and returns how many box lengths were removed.
fn wrap_axis(x: &mut f64, length: f64) -> i64 {
    let half = 0.5 * length;
    if (-half..half).contains(x) {
        return 0;
    }

    let mut k = ((*x + half) / length).floor();
    let mut folded = *x - k * length;
    if folded >= half {
        folded -= length;
        k += 1.0;
    } else if folded < -half {
        folded += length;
        k -= 1.0;
    }
    *x = folded;
    k as i64
}

/// Folds a displacement into `[-L/2, L/2)`.
fn fold(displacement: f64, length: f64) -> f64 {
    displacement - length * ((displacement + 0.5 * length) / length).floor()
}
