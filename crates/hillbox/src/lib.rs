//! N-body integration kernel for open, periodic and shearing-sheet domains.
//!
//! A [`Simulation`] advances a [`ParticleStore`] under self-gravity (direct summation or
//! a Barnes–Hut octree), hard-sphere collisions and boundary conditions, using one of
//! several symplectic splitting schemes. Periodic and shearing boxes are handled through
//! ghost images, so the force and collision code never special-cases the boundary.

pub mod boundary;
pub mod collisions;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod forces;
pub mod integrator;
pub mod particle;
pub mod simulation;
pub mod state;
pub mod tree;

#[cfg(test)]
mod boundary_test;
#[cfg(test)]
mod state_test;

pub use boundary::BoundaryMode;
pub use config::{CollisionMode, GravityMode, IntegratorKind, SimulationConfig};
pub use error::{HillboxError, Result};
pub use particle::Particle;
pub use simulation::{Heartbeat, Simulation, Snapshot, StopHandle};
pub use state::ParticleStore;
