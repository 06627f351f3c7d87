//! Leapfrog versus the five-substep McLachlan scheme
//!
//! Test particles fly through a gap in a band of static perturbers. The perturbing
//! potential is weak compared with the kinetic energy, so the McLachlan scheme's
//! error term, a factor ε smaller than leapfrog's, shows up directly in the relative
//! energy error of the test-particle subsystem.
//!
//! Run with: cargo run --release --package hillbox --example convergence

use hillbox::diagnostics::relative_energy_error;
use hillbox::{GravityMode, IntegratorKind, Particle, Simulation, SimulationConfig};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

const BOX: f64 = 100.0;
const VELOCITY: f64 = 10.0;
const PERTURBERS: usize = 200;
const TEST_PARTICLES: usize = 100;

fn band_energy_error(integrator: IntegratorKind, dt: f64) -> hillbox::Result<f64> {
    let config = SimulationConfig::new()
        .with_dt(dt)
        .with_gravity(GravityMode::Direct)
        .with_integrator(integrator)
        .with_t_max(BOX / (4.0 * VELOCITY));
    let mut sim = Simulation::new(config)?;
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    // Pinned perturbers make the test-particle energy a conserved quantity
    while sim.particle_count() < PERTURBERS {
        let x = rng.gen_range(-BOX / 16.0..BOX / 16.0);
        let y = rng.gen_range(-BOX / 2.0..BOX / 2.0);
        if y.abs() < BOX / 16.0 {
            continue;
        }
        sim.add_particle(Particle::new(1.0, [x, y, 0.0], [0.0, 0.0, 0.0]).fixed());
    }
    for _ in 0..TEST_PARTICLES {
        let y = rng.gen_range(-BOX / 32.0..BOX / 32.0);
        sim.add_particle(Particle::test([-BOX / 8.0, y, 0.0], [VELOCITY, 0.0, 0.0]));
    }
    sim.set_active_count(Some(PERTURBERS))?;

    let range = PERTURBERS..PERTURBERS + TEST_PARTICLES;
    let e0 = sim.compute_specific_energy(range.clone())?;
    sim.run(&mut |_: &Simulation| {})?;
    let e1 = sim.compute_specific_energy(range)?;

    Ok(relative_energy_error(e0, e1))
}

fn main() -> hillbox::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    println!("{:>10} {:>14} {:>14} {:>10}", "dt", "leapfrog", "mclachlan", "ratio");
    for dt in [0.04, 0.02, 0.01, 0.005] {
        let leapfrog = band_energy_error(IntegratorKind::Leapfrog, dt)?;
        let mclachlan = band_energy_error(IntegratorKind::McLachlan, dt)?;
        println!(
            "{:>10} {:>14.4e} {:>14.4e} {:>10.2}",
            dt,
            leapfrog,
            mclachlan,
            leapfrog / mclachlan
        );
        info!(dt, leapfrog, mclachlan, "convergence point");
    }

    Ok(())
}
