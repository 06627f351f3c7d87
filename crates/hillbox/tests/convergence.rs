//! Energy conservation and convergence order of the splitting schemes.

use hillbox::diagnostics::relative_energy_error;
use hillbox::{GravityMode, IntegratorKind, Particle, Simulation, SimulationConfig};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const BOX: f64 = 100.0;
const VELOCITY: f64 = 10.0;
const PERTURBERS: usize = 200;
const TEST_PARTICLES: usize = 100;

/// Static perturbers in a band around x = 0 with a gap around y = 0, and test particles
/// launched through the gap.
///
/// The perturbers are pinned rather than free, so the test particles move in a static
/// potential and their summed specific energy is exactly conserved by the flow. `g` sets
/// the strength ε of that potential relative to the free motion.
fn band_scenario(integrator: IntegratorKind, dt: f64, g: f64) -> Simulation {
    let config = SimulationConfig::new()
        .with_dt(dt)
        .with_g(g)
        .with_gravity(GravityMode::Direct)
        .with_integrator(integrator);
    let mut sim = Simulation::new(config).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(42);

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
    sim.set_active_count(Some(PERTURBERS)).unwrap();
    sim
}

fn band_energy_error(integrator: IntegratorKind, dt: f64, g: f64) -> f64 {
    let mut sim = band_scenario(integrator, dt, g);
    let range = PERTURBERS..PERTURBERS + TEST_PARTICLES;
    let e0 = sim.compute_specific_energy(range.clone()).unwrap();

    sim.integrate(BOX / (4.0 * 4.0 * VELOCITY)).unwrap();

    let e1 = sim.compute_specific_energy(range).unwrap();
    relative_energy_error(e0, e1)
}

/// Test particle on an eccentric orbit around a fixed unit mass, starting at pericentre.
fn eccentric_orbit(dt: f64) -> Simulation {
    let config = SimulationConfig::new().with_dt(dt);
    let mut sim = Simulation::new(config).unwrap();
    sim.add_particle(Particle::new(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]).fixed());
    sim.add_particle(Particle::test([1.0, 0.0, 0.0], [0.0, 1.2, 0.0]));
    sim.set_active_count(Some(1)).unwrap();
    sim
}

/// Largest energy deviation over `[from, until]`, sampled after every step.
fn max_orbit_error(sim: &mut Simulation, e0: f64, from: f64, until: f64) -> f64 {
    let mut worst: f64 = 0.0;
    sim.integrate_with(until, &mut |s: &Simulation| {
        if s.time() >= from {
            let e = s.compute_specific_energy(1..2).unwrap();
            worst = worst.max((e - e0).abs());
        }
    })
    .unwrap();
    worst
}

#[test]
fn test_band_scenario_energy_error_small() {
    let error = band_energy_error(IntegratorKind::Leapfrog, 0.01, 1.0);

    assert!(error < 1e-3, "leapfrog relative energy error {error:e}");
}

#[test]
fn test_mclachlan_beats_leapfrog_on_band_scenario() {
    let leapfrog = band_energy_error(IntegratorKind::Leapfrog, 0.01, 1.0);
    let mclachlan = band_energy_error(IntegratorKind::McLachlan, 0.01, 1.0);

    assert!(
        mclachlan < leapfrog,
        "McLachlan {mclachlan:e} not below leapfrog {leapfrog:e}"
    );
}

#[test]
fn test_mclachlan_advantage_grows_as_perturbation_shrinks() {
    // Leapfrog errs as ε dt², McLachlan as ε² dt² at this step, so their ratio goes as 1/ε
    let advantage = |g: f64| {
        let leapfrog = band_energy_error(IntegratorKind::Leapfrog, 0.02, g);
        let mclachlan = band_energy_error(IntegratorKind::McLachlan, 0.02, g);
        leapfrog / mclachlan
    };

    let strong = advantage(1.0);
    let weak = advantage(0.1);

    assert!(strong > 1.0, "McLachlan advantage {strong} at full strength");
    assert!(
        weak > 5.0 * strong,
        "advantage {weak} at ε = 0.1 against {strong} at ε = 1"
    );
}

#[test]
fn test_leapfrog_is_second_order() {
    // a = 1 / (2 - 1.44), period 2π a^{3/2}
    let period = 2.0 * std::f64::consts::PI * (1.0f64 / 0.56).powf(1.5);

    let errors: Vec<f64> = [0.01, 0.005]
        .iter()
        .map(|&dt| {
            let mut sim = eccentric_orbit(dt);
            let e0 = sim.compute_specific_energy(1..2).unwrap();
            max_orbit_error(&mut sim, e0, 0.0, period)
        })
        .collect();

    let ratio = errors[0] / errors[1];
    assert!(ratio > 3.5 && ratio < 4.5, "error ratio {ratio}");
}

#[test]
fn test_leapfrog_error_does_not_grow() {
    let period = 2.0 * std::f64::consts::PI * (1.0f64 / 0.56).powf(1.5);
    let mut sim = eccentric_orbit(0.01);
    let e0 = sim.compute_specific_energy(1..2).unwrap();

    let first = max_orbit_error(&mut sim, e0, 0.0, period);
    let _ = max_orbit_error(&mut sim, e0, period, 9.0 * period);
    let tenth = max_orbit_error(&mut sim, e0, 9.0 * period, 10.0 * period);

    assert!(first > 0.0);
    assert!(tenth < 1.5 * first, "first orbit {first:e}, tenth {tenth:e}");
}

#[test]
fn test_dkd_matches_kdk_accuracy() {
    let period = 2.0 * std::f64::consts::PI * (1.0f64 / 0.56).powf(1.5);
    let mut kdk = eccentric_orbit(0.005);
    let mut dkd = eccentric_orbit(0.005);
    dkd.set_integrator(IntegratorKind::LeapfrogDkd).unwrap();
    let e0 = kdk.compute_specific_energy(1..2).unwrap();

    let kdk_error = max_orbit_error(&mut kdk, e0, 0.0, period);
    let dkd_error = max_orbit_error(&mut dkd, e0, 0.0, period);

    assert!(dkd_error < 1e-3 && kdk_error < 1e-3);
    assert!(dkd_error < 10.0 * kdk_error && kdk_error < 10.0 * dkd_error);
}
