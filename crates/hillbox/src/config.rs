//! Simulation configuration.
//!
//! Every tunable of a run lives in [`SimulationConfig`]: domain geometry, ghost rings,
//! integrator choice, force and collision modes. The struct is plain data, `serde`
//! serializable, and validated once by [`SimulationConfig::validate`] before a
//! [`Simulation`](crate::simulation::Simulation) accepts it.
//!
//! # Example
//!
//! ```rust
//! use hillbox::boundary::BoundaryMode;
//! use hillbox::config::{CollisionMode, GravityMode, IntegratorKind, SimulationConfig};
//!
//! let config = SimulationConfig::new()
//!     .with_box(1.0, 20, 5, 2)
//!     .with_boundary(BoundaryMode::Shear)
//!     .with_ghosts(1, 1, 0)
//!     .with_shear(1.0)
//!     .with_integrator(IntegratorKind::Sei)
//!     .with_gravity(GravityMode::None)
//!     .with_collision(CollisionMode::Tree);
//!
//! assert!(config.validate().is_ok());
//! ```

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::boundary::BoundaryMode;
use crate::error::{HillboxError, Result};

/// Which time-stepping scheme advances the particles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntegratorKind {
    /// Kick-drift-kick leapfrog.
    #[default]
    Leapfrog,
    /// Drift-kick-drift leapfrog, one force evaluation per step.
    LeapfrogDkd,
    /// Five-substep composition for near-integrable systems.
    McLachlan,
    /// Symplectic epicycle integrator for the shearing sheet.
    Sei,
}

/// How gravitational accelerations are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GravityMode {
    None,
    #[default]
    Direct,
    Tree,
}

/// How candidate collision pairs are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CollisionMode {
    #[default]
    None,
    Direct,
    Tree,
    PlaneSweep,
}

/// Coordinate axis, used to pick the plane-sweep direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Axis {
    #[default]
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// A finite domain made of `root_cells` cubes of side `root_size`, centred on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxConfig {
    pub root_size: f64,
    pub root_cells: [usize; 3],
}

impl BoxConfig {
    pub fn new(root_size: f64, nx: usize, ny: usize, nz: usize) -> Self {
        BoxConfig {
            root_size,
            root_cells: [nx, ny, nz],
        }
    }

    /// Edge lengths of the whole box.
    pub fn size(&self) -> Vector3<f64> {
        Vector3::new(
            self.root_size * self.root_cells[0] as f64,
            self.root_size * self.root_cells[1] as f64,
            self.root_size * self.root_cells[2] as f64,
        )
    }
}

/// Number of ghost rings replicated on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GhostCounts {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl GhostCounts {
    pub fn any(&self) -> bool {
        self.x > 0 || self.y > 0 || self.z > 0
    }
}

/// Octree shape limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Particles a leaf may hold before it is subdivided.
    pub max_leaf: usize,
    /// Recursion cap; deeper cells become multi-particle leaves.
    pub max_depth: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        TreeParams {
            max_leaf: 1,
            max_depth: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub dt: f64,
    /// End time for [`Simulation::run`](crate::simulation::Simulation::run). `None` runs until stopped.
    pub t_max: Option<f64>,
    pub g: f64,
    pub softening: f64,
    pub opening_angle: f64,
    pub boundary: BoundaryMode,
    pub domain: Option<BoxConfig>,
    pub ghosts: GhostCounts,
    pub omega: f64,
    pub omega_z: Option<f64>,
    pub integrator: IntegratorKind,
    pub gravity: GravityMode,
    pub collision: CollisionMode,
    pub sweep_axis: Axis,
    pub tangential_restitution: f64,
    pub merge_on_collision: bool,
    pub tree: TreeParams,
    pub direct_threshold: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            dt: 0.01,
            t_max: None,
            g: 1.0,
            softening: 0.0,
            opening_angle: 0.5,
            boundary: BoundaryMode::Open,
            domain: None,
            ghosts: GhostCounts::default(),
            omega: 1.0,
            omega_z: None,
            integrator: IntegratorKind::Leapfrog,
            gravity: GravityMode::Direct,
            collision: CollisionMode::None,
            sweep_axis: Axis::X,
            tangential_restitution: 1.0,
            merge_on_collision: false,
            tree: TreeParams::default(),
            direct_threshold: 16,
        }
    }
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_t_max(mut self, t_max: f64) -> Self {
        self.t_max = Some(t_max);
        self
    }

    pub fn with_g(mut self, g: f64) -> Self {
        self.g = g;
        self
    }

    pub fn with_softening(mut self, softening: f64) -> Self {
        self.softening = softening;
        self
    }

    pub fn with_opening_angle(mut self, theta: f64) -> Self {
        self.opening_angle = theta;
        self
    }

    /// Sets a finite domain of `nx × ny × nz` root cells of side `root_size`.
    pub fn with_box(mut self, root_size: f64, nx: usize, ny: usize, nz: usize) -> Self {
        self.domain = Some(BoxConfig::new(root_size, nx, ny, nz));
        self
    }

    pub fn with_boundary(mut self, boundary: BoundaryMode) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_ghosts(mut self, x: usize, y: usize, z: usize) -> Self {
        self.ghosts = GhostCounts { x, y, z };
        self
    }

    /// Sets the shear rate Ω. The vertical frequency follows Ω unless set separately.
    pub fn with_shear(mut self, omega: f64) -> Self {
        self.omega = omega;
        self
    }

    pub fn with_vertical_frequency(mut self, omega_z: f64) -> Self {
        self.omega_z = Some(omega_z);
        self
    }

    pub fn with_integrator(mut self, integrator: IntegratorKind) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn with_gravity(mut self, gravity: GravityMode) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_collision(mut self, collision: CollisionMode) -> Self {
        self.collision = collision;
        self
    }

    pub fn with_sweep_axis(mut self, axis: Axis) -> Self {
        self.sweep_axis = axis;
        self
    }

    pub fn with_tangential_restitution(mut self, coefficient: f64) -> Self {
        self.tangential_restitution = coefficient;
        self
    }

    pub fn with_merging(mut self, merge: bool) -> Self {
        self.merge_on_collision = merge;
        self
    }

    pub fn with_tree(mut self, tree: TreeParams) -> Self {
        self.tree = tree;
        self
    }

    /// Vertical epicyclic frequency used by the SEI integrator.
    pub fn vertical_frequency(&self) -> f64 {
        self.omega_z.unwrap_or(self.omega)
    }

    /// Edge lengths of the domain, or `None` when it is unbounded.
    pub fn box_size(&self) -> Option<Vector3<f64>> {
        self.domain.map(|d| d.size())
    }

    /// Checks the configuration for inconsistencies.
    ///
    /// # Errors
    ///
    /// Returns [`HillboxError::Configuration`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if !self.dt.is_finite() || self.dt == 0.0 {
            return Err(HillboxError::configuration(format!(
                "timestep must be finite and nonzero, got {}",
                self.dt
            )));
        }
        if self.t_max.is_some_and(f64::is_nan) {
            return Err(HillboxError::configuration("end time is NaN"));
        }
        if !self.g.is_finite() {
            return Err(HillboxError::configuration("gravitational constant must be finite"));
        }
        if !self.softening.is_finite() || self.softening < 0.0 {
            return Err(HillboxError::configuration(format!(
                "softening must be finite and non-negative, got {}",
                self.softening
            )));
        }
        if !self.opening_angle.is_finite() || self.opening_angle < 0.0 {
            return Err(HillboxError::configuration(format!(
                "opening angle must be finite and non-negative, got {}",
                self.opening_angle
            )));
        }

        if let Some(domain) = &self.domain {
            if !domain.root_size.is_finite() || domain.root_size <= 0.0 {
                return Err(HillboxError::configuration(format!(
                    "root cell size must be positive, got {}",
                    domain.root_size
                )));
            }
            if domain.root_cells.iter().any(|&n| n == 0) {
                return Err(HillboxError::configuration(
                    "every axis needs at least one root cell",
                ));
            }
        }

        match self.boundary {
            BoundaryMode::Open => {
                if self.ghosts.any() {
                    return Err(HillboxError::configuration(
                        "ghost rings require a periodic or shearing boundary",
                    ));
                }
            }
            BoundaryMode::Periodic | BoundaryMode::Shear => {
                if self.domain.is_none() {
                    return Err(HillboxError::configuration(format!(
                        "{:?} boundary requires a finite box",
                        self.boundary
                    )));
                }
            }
        }

        let needs_omega =
            self.boundary == BoundaryMode::Shear || self.integrator == IntegratorKind::Sei;
        if needs_omega && (!self.omega.is_finite() || self.omega == 0.0) {
            return Err(HillboxError::configuration(
                "shear rate must be finite and nonzero",
            ));
        }
        if self.integrator == IntegratorKind::Sei {
            let omega_z = self.vertical_frequency();
            if !omega_z.is_finite() || omega_z == 0.0 {
                return Err(HillboxError::configuration(
                    "vertical frequency must be finite and nonzero",
                ));
            }
        }

        if !(0.0..=1.0).contains(&self.tangential_restitution) {
            return Err(HillboxError::configuration(format!(
                "tangential restitution must lie in [0, 1], got {}",
                self.tangential_restitution
            )));
        }
        if self.tree.max_leaf == 0 || self.tree.max_depth == 0 {
            return Err(HillboxError::configuration(
                "tree leaf capacity and depth cap must be at least 1",
            ));
        }

        Ok(())
    }
}
