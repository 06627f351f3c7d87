//! Resuming from a serialized snapshot continues the run bit for bit.

use hillbox::boundary::BoundaryMode;
use hillbox::{
    CollisionMode, GravityMode, IntegratorKind, Particle, Simulation, SimulationConfig, Snapshot,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn periodic_cluster(integrator: IntegratorKind) -> Simulation {
    let config = SimulationConfig::new()
        .with_box(4.0, 2, 2, 1)
        .with_boundary(BoundaryMode::Periodic)
        .with_ghosts(1, 1, 0)
        .with_gravity(GravityMode::Tree)
        .with_softening(0.05)
        .with_collision(CollisionMode::Direct)
        .with_integrator(integrator)
        .with_dt(0.02);
    let mut sim = Simulation::new(config).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(3);
    for _ in 0..40 {
        let position = [
            rng.gen_range(-4.0..4.0),
            rng.gen_range(-4.0..4.0),
            rng.gen_range(-2.0..2.0),
        ];
        let velocity = [
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        ];
        sim.add_particle(Particle::new(0.05, position, velocity).with_radius(0.2));
    }
    sim
}

fn resume_matches(integrator: IntegratorKind) {
    let mut original = periodic_cluster(integrator);
    for _ in 0..10 {
        original.step().unwrap();
    }

    let json = serde_json::to_string(&original.snapshot()).unwrap();
    let snapshot: Snapshot = serde_json::from_str(&json).unwrap();
    let mut resumed = Simulation::from_snapshot(snapshot).unwrap();

    for _ in 0..10 {
        original.step().unwrap();
        resumed.step().unwrap();
    }

    assert_eq!(resumed.steps(), 20);
    assert_eq!(resumed.time(), original.time());
    assert_eq!(resumed.particles(), original.particles());
}

#[test]
fn test_resume_leapfrog() {
    resume_matches(IntegratorKind::Leapfrog);
}

#[test]
fn test_resume_mclachlan() {
    resume_matches(IntegratorKind::McLachlan);
}

#[test]
fn test_snapshot_keeps_active_count() {
    let mut sim = Simulation::new(SimulationConfig::new()).unwrap();
    sim.add_particle(Particle::new(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]));
    sim.add_particle(Particle::test([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]));
    sim.set_active_count(Some(1)).unwrap();
    sim.step().unwrap();

    let snapshot = sim.snapshot();
    assert_eq!(snapshot.active_count, Some(1));
    assert_eq!(snapshot.particles.len(), 2);

    let resumed = Simulation::from_snapshot(snapshot).unwrap();
    assert_eq!(resumed.store().active_count(), 1);
    assert_eq!(resumed.time(), sim.time());
}

#[test]
fn test_snapshot_with_bad_active_count_is_rejected() {
    let mut sim = Simulation::new(SimulationConfig::new()).unwrap();
    sim.add_particle(Particle::new(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]));

    let mut snapshot = sim.snapshot();
    snapshot.active_count = Some(5);

    assert!(Simulation::from_snapshot(snapshot).is_err());
}
