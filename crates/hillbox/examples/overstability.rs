//! Viscous overstability in a dense planetary ring
//!
//! A narrow, radially extended shearing box of a Saturn-like ring. Particles start on
//! the shear flow with no random motion; inelastic collisions (e = 0.5) heat and cool
//! the ring until it settles, and after a few tens of orbits radial density waves grow.
//! One line is logged per orbit.
//!
//! Run with: cargo run --release --package hillbox --example overstability [orbits]
//! Set RUST_LOG=hillbox=debug for per-integration detail.

use std::f64::consts::PI;

use hillbox::boundary::BoundaryMode;
use hillbox::collisions::ConstantRestitution;
use hillbox::{
    CollisionMode, GravityMode, HillboxError, IntegratorKind, Particle, Simulation,
    SimulationConfig,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

const OMEGA: f64 = 1.0;
const OMEGA_Z: f64 = 3.6;
const PARTICLE_RADIUS: f64 = 1.0;
const OPTICAL_DEPTH: f64 = 1.64;

fn main() -> hillbox::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let orbits: f64 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(10.0);

    let config = SimulationConfig::new()
        .with_box(1.0, 200, 5, 20)
        .with_boundary(BoundaryMode::Shear)
        .with_ghosts(1, 1, 0)
        .with_shear(OMEGA)
        .with_vertical_frequency(OMEGA_Z)
        .with_integrator(IntegratorKind::Sei)
        .with_gravity(GravityMode::None)
        .with_collision(CollisionMode::Tree)
        .with_dt(2e-3 * 2.0 * PI)
        .with_t_max(orbits * 2.0 * PI / OMEGA);
    let size = config
        .box_size()
        .ok_or_else(|| HillboxError::configuration("the ring patch needs a finite box"))?;
    let mut sim = Simulation::new(config)?;
    sim.set_restitution(ConstantRestitution(0.5));

    let target = OPTICAL_DEPTH * size.x * size.y / (PI * PARTICLE_RADIUS * PARTICLE_RADIUS);
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    while (sim.particle_count() as f64) < target {
        let x = rng.gen_range(-0.5..0.5) * size.x;
        let y = rng.gen_range(-0.5..0.5) * size.y;
        let z = 10.0 * rng.gen_range(-0.5..0.5) * PARTICLE_RADIUS;
        sim.add_particle(
            Particle::new(1.0, [x, y, z], [0.0, -1.5 * OMEGA * x, 0.0])
                .with_radius(PARTICLE_RADIUS),
        );
    }
    info!(particles = sim.particle_count(), orbits, "ring patch ready");

    let orbit = 2.0 * PI / OMEGA;
    let mut next_report = orbit;
    sim.run(&mut |s: &Simulation| {
        if s.time() + 0.5 * s.config().dt < next_report {
            return;
        }
        next_report += orbit;

        let stats = s.collision_stats();
        info!(
            orbit = (s.time() / orbit).round(),
            collisions = stats.collisions,
            dispersion = velocity_dispersion(s),
            thickness = rms_height(s),
            momentum_flux = stats.momentum_flux / s.time(),
            "orbit"
        );
    })?;

    Ok(())
}

/// RMS velocity relative to the Keplerian shear.
fn velocity_dispersion(sim: &Simulation) -> f64 {
    let particles = sim.particles();
    let sum: f64 = particles
        .iter()
        .map(|p| {
            let vy = p.velocity.y + 1.5 * OMEGA * p.position.x;
            p.velocity.x * p.velocity.x + vy * vy + p.velocity.z * p.velocity.z
        })
        .sum();
    (sum / particles.len().max(1) as f64).sqrt()
}

fn rms_height(sim: &Simulation) -> f64 {
    let particles = sim.particles();
    let sum: f64 = particles.iter().map(|p| p.position.z * p.position.z).sum();
    (sum / particles.len().max(1) as f64).sqrt()
}
