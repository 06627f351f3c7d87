//! The simulation handle.
//!
//! [`Simulation`] owns the particle store and one instance of every pipeline stage
//! selected by its [`SimulationConfig`]. One [`step`](Simulation::step) runs
//!
//! 1. boundary: wrap into the box (or drop escapees of an open box)
//! 2. the integrator's drift/kick table, rebuilding the tree and re-evaluating gravity
//!    before any kick that follows a drift
//! 3. boundary again, at the end-of-step time
//! 4. collision detection and sequential resolution
//!
//! A step that leaves a non-finite coordinate behind is rolled back and reported.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::boundary::Boundary;
use crate::collisions::{
    detector_for, resolve_collisions, CollisionDetector, CollisionSettings, CollisionStats,
    ConstantRestitution, Restitution, SearchContext,
};
use crate::config::{IntegratorKind, SimulationConfig};
use crate::diagnostics::{self, EnergyReport};
use crate::error::{HillboxError, Result};
use crate::forces::{gravity_for, ForceContext, ForceModel};
use crate::integrator::{integrator_for, Integrator, SubStep};
use crate::particle::Particle;
use crate::state::ParticleStore;

/// Per-step notification sink for output and visualization
///
/// Called after every successful step of [`Simulation::integrate_with`]. Any
/// `FnMut(&Simulation)` closure is a heartbeat.
pub trait Heartbeat {
    fn beat(&mut self, simulation: &Simulation);
}

impl<F: FnMut(&Simulation)> Heartbeat for F {
    fn beat(&mut self, simulation: &Simulation) {
        self(simulation)
    }
}

/// Ends an integration between steps, from a heartbeat or another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Everything needed to resume a run: time, step count, configuration and particles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub time: f64,
    pub steps: u64,
    pub config: SimulationConfig,
    pub particles: Vec<Particle>,
    pub active_count: Option<usize>,
}

pub struct Simulation {
    config: SimulationConfig,
    store: ParticleStore,
    time: f64,
    steps: u64,
    boundary: Boundary,
    integrator: Box<dyn Integrator>,
    gravity: Option<Box<dyn ForceModel>>,
    detector: Option<Box<dyn CollisionDetector>>,
    restitution: Box<dyn Restitution>,
    stats: CollisionStats,
    collision_settings: CollisionSettings,
    forces_fresh: bool,
    stop: StopHandle,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("time", &self.time)
            .field("steps", &self.steps)
            .field("particles", &self.store.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Creates an empty simulation at `t = 0`
    ///
    /// # Errors
    ///
    /// `Configuration` when `config` fails [`SimulationConfig::validate`].
    ///
    /// # Examples
    ///
    /// ```
    /// use hillbox::config::SimulationConfig;
    /// use hillbox::particle::Particle;
    /// use hillbox::simulation::Simulation;
    ///
    /// let mut sim = Simulation::new(SimulationConfig::new().with_dt(0.001)).unwrap();
    /// sim.add_particle(Particle::new(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]));
    /// sim.add_particle(Particle::new(1e-3, [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]));
    ///
    /// sim.integrate(0.1).unwrap();
    /// assert!((sim.time() - 0.1).abs() < 1e-9);
    /// ```
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        info!(
            integrator = ?config.integrator,
            gravity = ?config.gravity,
            collision = ?config.collision,
            boundary = ?config.boundary,
            dt = config.dt,
            "creating simulation"
        );
        Ok(Simulation {
            boundary: Boundary::from_config(&config),
            integrator: integrator_for(&config),
            gravity: gravity_for(&config),
            detector: detector_for(&config),
            restitution: Box::new(ConstantRestitution::default()),
            stats: CollisionStats::default(),
            collision_settings: CollisionSettings::from_config(&config),
            store: ParticleStore::new(),
            time: 0.0,
            steps: 0,
            forces_fresh: false,
            stop: StopHandle::default(),
            config,
        })
    }

    /// Resumes a run from a [`Snapshot`].
    ///
    /// The restitution law is not part of the snapshot; set it again if it is not the
    /// default elastic one.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let mut simulation = Simulation::new(snapshot.config)?;
        let mut store = ParticleStore::from(snapshot.particles);
        store.set_active_count(snapshot.active_count)?;
        store.validate()?;
        simulation.store = store;
        simulation.time = snapshot.time;
        simulation.steps = snapshot.steps;
        Ok(simulation)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            time: self.time,
            steps: self.steps,
            config: self.config.clone(),
            particles: self.store.particles().to_vec(),
            active_count: self.store.configured_active_count(),
        }
    }

    /// Replaces the configuration between runs, keeping particles, time and the
    /// restitution law.
    pub fn reconfigure(&mut self, config: SimulationConfig) -> Result<()> {
        config.validate()?;
        self.boundary = Boundary::from_config(&config);
        self.integrator = integrator_for(&config);
        self.gravity = gravity_for(&config);
        self.detector = detector_for(&config);
        self.collision_settings = CollisionSettings::from_config(&config);
        self.forces_fresh = false;
        self.config = config;
        info!(time = self.time, "simulation reconfigured");
        Ok(())
    }

    /// Switches the integration scheme, discarding any scheme state.
    pub fn set_integrator(&mut self, kind: IntegratorKind) -> Result<()> {
        let mut config = self.config.clone();
        config.integrator = kind;
        config.validate()?;
        self.integrator = integrator_for(&config);
        self.integrator.reset();
        self.config = config;
        debug!(integrator = ?kind, time = self.time, "integrator switched");
        Ok(())
    }

    /// Injects the normal restitution law used by bounces.
    pub fn set_restitution(&mut self, restitution: impl Restitution + 'static) {
        self.restitution = Box::new(restitution);
    }

    pub fn add_particle(&mut self, particle: Particle) -> usize {
        self.forces_fresh = false;
        self.store.add(particle)
    }

    pub fn remove_particle(&mut self, index: usize) -> Result<Particle> {
        self.forces_fresh = false;
        self.store.remove(index)
    }

    pub fn particle(&self, index: usize) -> Result<&Particle> {
        self.store.get(index)
    }

    pub fn particle_mut(&mut self, index: usize) -> Result<&mut Particle> {
        self.forces_fresh = false;
        self.store.get_mut(index)
    }

    pub fn particles(&self) -> &[Particle] {
        self.store.particles()
    }

    pub fn particle_count(&self) -> usize {
        self.store.len()
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    /// Declares the first `count` particles the gravitating ones (`None`: all).
    pub fn set_active_count(&mut self, count: Option<usize>) -> Result<()> {
        self.forces_fresh = false;
        self.store.set_active_count(count)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn collision_stats(&self) -> &CollisionStats {
        &self.stats
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Advances exactly one timestep
    ///
    /// # Errors
    ///
    /// * `InvariantViolation` when the store breaks its contracts; nothing is advanced.
    /// * `NumericDegeneracy` when the step produced a non-finite coordinate; particles
    ///   and time are restored to their values before the step.
    pub fn step(&mut self) -> Result<()> {
        self.store.validate()?;
        let backup = self.store.clone();
        let t0 = self.time;

        let stats = match self.advance(t0) {
            Ok(stats) => stats,
            Err(err) => {
                self.rollback(backup, t0);
                return Err(err);
            }
        };

        if let Some(index) = self.store.first_non_finite() {
            let time = self.time;
            warn!(index, time, "non-finite particle state, rolling back step");
            self.rollback(backup, t0);
            return Err(HillboxError::NumericDegeneracy { index, time });
        }

        self.stats.accumulate(&stats);
        self.steps += 1;
        trace!(
            time = self.time,
            collisions = stats.collisions,
            merges = stats.merges,
            "step"
        );
        Ok(())
    }

    fn rollback(&mut self, backup: ParticleStore, t0: f64) {
        self.store = backup;
        self.time = t0;
        self.forces_fresh = false;
        self.integrator.reset();
    }

    fn advance(&mut self, t0: f64) -> Result<CollisionStats> {
        let dt = self.config.dt;
        self.apply_boundary()?;

        for &substep in self.integrator.substeps() {
            match substep {
                SubStep::Drift(c) => {
                    self.integrator.drift(self.store.particles_mut(), c * dt);
                    self.time += c * dt;
                    self.forces_fresh = false;
                }
                SubStep::Kick(c) => {
                    if !self.forces_fresh {
                        self.apply_boundary()?;
                        self.compute_accelerations();
                    }
                    self.integrator.kick(self.store.particles_mut(), c * dt);
                }
            }
        }

        self.time = t0 + dt;
        self.apply_boundary()?;
        self.collide()
    }

    fn apply_boundary(&mut self) -> Result<()> {
        let report = self.boundary.apply(&mut self.store, self.time)?;
        if report.wrapped > 0 || report.removed > 0 {
            self.forces_fresh = false;
        }
        if report.removed > 0 {
            debug!(
                removed = report.removed,
                remaining = self.store.len(),
                "particles left the open box"
            );
        }
        Ok(())
    }

    fn collide(&mut self) -> Result<CollisionStats> {
        let Some(detector) = &self.detector else {
            return Ok(CollisionStats::default());
        };
        let offsets = self.boundary.ghost_offsets(self.time);
        let pairs = detector.candidates(&SearchContext {
            particles: self.store.particles(),
            offsets: &offsets,
            domain: self.config.domain.as_ref(),
        });

        let stats = resolve_collisions(
            &mut self.store,
            &pairs,
            self.restitution.as_ref(),
            &self.collision_settings,
            self.time,
        )?;
        if stats.merges > 0 {
            self.forces_fresh = false;
        }
        Ok(stats)
    }

    /// Re-evaluates gravity at the current positions and time.
    ///
    /// Every acceleration is overwritten; with gravity off they are all zero.
    pub fn compute_accelerations(&mut self) {
        match &self.gravity {
            Some(gravity) => {
                let offsets = self.boundary.ghost_offsets(self.time);
                let accelerations = gravity.accelerations(&ForceContext {
                    particles: self.store.particles(),
                    active_count: self.store.active_count(),
                    offsets: &offsets,
                    domain: self.config.domain.as_ref(),
                });
                self.store.set_accelerations(&accelerations);
            }
            None => self.store.clear_accelerations(),
        }
        self.forces_fresh = true;
    }

    /// Steps until `until` is reached or passed.
    ///
    /// The step size is never shortened, so the final time may overshoot `until` by
    /// less than one `dt`.
    pub fn integrate(&mut self, until: f64) -> Result<()> {
        self.integrate_with(until, &mut |_: &Simulation| {})
    }

    /// Like [`integrate`](Self::integrate), calling `heartbeat` after every step.
    ///
    /// A [`StopHandle`] raised before or during the run ends it between steps. The flag
    /// is lowered once the run returns, so the next call starts afresh.
    pub fn integrate_with(&mut self, until: f64, heartbeat: &mut impl Heartbeat) -> Result<()> {
        let direction = self.config.dt.signum();
        let tolerance = 1e-9 * self.config.dt.abs();
        debug!(from = self.time, until, "integrating");

        while (until - self.time) * direction > tolerance && !self.stop.is_stopped() {
            self.step()?;
            heartbeat.beat(self);
        }
        self.stop.clear();

        info!(
            time = self.time,
            steps = self.steps,
            particles = self.store.len(),
            "integration finished"
        );
        Ok(())
    }

    /// Integrates to `config.t_max`, or until stopped when it is `None`.
    pub fn run(&mut self, heartbeat: &mut impl Heartbeat) -> Result<()> {
        let until = self
            .config
            .t_max
            .unwrap_or(self.config.dt.signum() * f64::INFINITY);
        self.integrate_with(until, heartbeat)
    }

    /// Kinetic and potential energy of the particles in `range`.
    ///
    /// See [`diagnostics::compute_energy`].
    pub fn compute_energy(&self, range: Range<usize>) -> Result<EnergyReport> {
        diagnostics::compute_energy(&self.store, range, self.config.g, self.config.softening)
    }

    /// Summed energy per unit mass of the particles in `range`.
    ///
    /// See [`diagnostics::compute_specific_energy`].
    pub fn compute_specific_energy(&self, range: Range<usize>) -> Result<f64> {
        diagnostics::compute_specific_energy(
            &self.store,
            range,
            self.config.g,
            self.config.softening,
        )
    }
}
