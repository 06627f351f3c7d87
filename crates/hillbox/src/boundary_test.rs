use approx::assert_relative_eq;
use nalgebra::Vector3;

use crate::boundary::{Boundary, BoundaryMode, GhostOffset};
use crate::config::GhostCounts;
use crate::particle::Particle;
use crate::state::ParticleStore;

fn periodic_box() -> Boundary {
    Boundary::new(
        BoundaryMode::Periodic,
        Some(Vector3::new(10.0, 10.0, 10.0)),
        GhostCounts { x: 1, y: 1, z: 0 },
        1.0,
    )
}

fn shear_box(omega: f64) -> Boundary {
    Boundary::new(
        BoundaryMode::Shear,
        Some(Vector3::new(4.0, 8.0, 2.0)),
        GhostCounts { x: 1, y: 1, z: 0 },
        omega,
    )
}

#[test]
fn test_open_boundary_has_only_identity() {
    let boundary = Boundary::new(BoundaryMode::Open, None, GhostCounts::default(), 1.0);
    let offsets = boundary.ghost_offsets(3.0);

    assert_eq!(offsets.len(), 1);
    assert!(offsets[0].is_identity());
}

#[test]
fn test_periodic_offsets_product() {
    let offsets = periodic_box().ghost_offsets(0.0);

    assert_eq!(offsets.len(), 9);
    assert_eq!(offsets.iter().filter(|o| o.is_identity()).count(), 1);
    assert!(offsets.iter().all(|o| o.shift.z == 0.0));
    assert!(offsets.iter().all(|o| o.velocity_shift == Vector3::zeros()));
    assert_eq!(offsets[0].shift, Vector3::new(-10.0, -10.0, 0.0));
}

#[test]
fn test_periodic_wrap() {
    let boundary = periodic_box();
    let p = Particle::new(1.0, [7.0, -12.0, 5.0], [1.0, 2.0, 3.0]);

    let wrapped = boundary.wrap(p, 0.0);

    assert_relative_eq!(wrapped.position.x, -3.0);
    assert_relative_eq!(wrapped.position.y, -2.0);
    // Upper face maps to the lower one
    assert_relative_eq!(wrapped.position.z, -5.0);
    assert_eq!(wrapped.velocity, p.velocity);
}

#[test]
fn test_wrap_is_idempotent() {
    let boundary = periodic_box();
    let p = Particle::new(1.0, [23.7, -5.0, 4.999], [0.0, 0.0, 0.0]);

    let once = boundary.wrap(p, 0.0);
    let twice = boundary.wrap(once, 0.0);

    assert_eq!(once, twice);
}

#[test]
fn test_boundary_point_has_single_canonical_side() {
    let boundary = periodic_box();
    let upper = boundary.wrap(Particle::new(1.0, [5.0, 0.0, 0.0], [0.0; 3]), 0.0);
    let lower = boundary.wrap(Particle::new(1.0, [-5.0, 0.0, 0.0], [0.0; 3]), 0.0);

    assert_eq!(upper.position.x, -5.0);
    assert_eq!(lower.position.x, -5.0);
}

#[test]
fn test_shear_offsets_carry_velocity_shift() {
    let omega = 2.0;
    let boundary = shear_box(omega);

    let image = boundary.ghost_image(1, 0, 0, 0.0);
    assert_eq!(image.shift, Vector3::new(4.0, 0.0, 0.0));
    assert_relative_eq!(image.velocity_shift.y, -1.5 * omega * 4.0);

    let image = boundary.ghost_image(-1, 0, 0, 0.0);
    assert_relative_eq!(image.velocity_shift.y, 1.5 * omega * 4.0);

    let image = boundary.ghost_image(0, 1, 0, 0.0);
    assert_eq!(image.velocity_shift, Vector3::zeros());
}

#[test]
fn test_shear_offset_slides_with_time() {
    let boundary = shear_box(1.0);
    // vy = -6, after t = 0.5 the image has slid by -3
    let image = boundary.ghost_image(1, 0, 0, 0.5);
    assert_relative_eq!(image.shift.y, -3.0);

    // After t = 1.0 it has slid by -6, folded into [-4, 4)
    let image = boundary.ghost_image(1, 0, 0, 1.0);
    assert_relative_eq!(image.shift.y, 2.0);
}

#[test]
fn test_shear_wrap_matches_ghost_image() {
    let boundary = shear_box(1.0);
    let time = 0.3;
    let original = Particle::new(1.0, [1.0, 2.0, 0.0], [0.1, -1.5, 0.0]);

    // The +x image of the particle, seen as a particle that has left the box
    let image = boundary.ghost_image(1, 0, 0, time);
    let mut outside = original;
    outside.position += image.shift;
    outside.velocity += image.velocity_shift;

    let wrapped = boundary.wrap(outside, time);

    assert_relative_eq!(wrapped.position, original.position, epsilon = 1e-12);
    assert_relative_eq!(wrapped.velocity, original.velocity, epsilon = 1e-12);
}

#[test]
fn test_shear_wrap_velocity_jump() {
    let omega = 1.0;
    let boundary = shear_box(omega);
    let p = Particle::new(1.0, [2.5, 0.0, 0.0], [0.0, -3.75, 0.0]);

    let wrapped = boundary.wrap(p, 0.0);

    assert_relative_eq!(wrapped.position.x, -1.5);
    // Crossing outward picks up +1.5 Ω Lx
    assert_relative_eq!(wrapped.velocity.y, -3.75 + 1.5 * omega * 4.0);
}

#[test]
fn test_separation_uses_shift() {
    let offset = GhostOffset {
        shift: Vector3::new(10.0, 0.0, 0.0),
        velocity_shift: Vector3::new(0.0, -1.0, 0.0),
    };
    let a = Particle::new(1.0, [-4.5, 0.0, 0.0], [0.0, 0.0, 0.0]);
    let b = Particle::new(1.0, [4.5, 0.0, 0.0], [0.0, 0.0, 0.0]);

    assert_relative_eq!(offset.separation(&a, &b), Vector3::new(1.0, 0.0, 0.0));
    assert_relative_eq!(offset.relative_velocity(&a, &b), Vector3::new(0.0, -1.0, 0.0));
}

#[test]
fn test_apply_wraps_store() {
    let boundary = periodic_box();
    let mut store = ParticleStore::new();
    store.add(Particle::new(1.0, [0.0, 0.0, 0.0], [0.0; 3]));
    store.add(Particle::new(1.0, [6.0, 0.0, 0.0], [0.0; 3]));

    let report = boundary.apply(&mut store, 0.0).unwrap();

    assert_eq!(report.wrapped, 1);
    assert_eq!(report.removed, 0);
    assert_relative_eq!(store.get(1).unwrap().position.x, -4.0);
}

#[test]
fn test_open_box_removes_escapees() {
    let boundary = Boundary::new(
        BoundaryMode::Open,
        Some(Vector3::new(2.0, 2.0, 2.0)),
        GhostCounts::default(),
        1.0,
    );
    let mut store = ParticleStore::new();
    store.add(Particle::new(1.0, [0.0, 0.0, 0.0], [0.0; 3]));
    store.add(Particle::new(1.0, [3.0, 0.0, 0.0], [0.0; 3]));
    store.add(Particle::new(1.0, [0.5, 0.0, 0.0], [0.0; 3]));
    store.add(Particle::new(1.0, [0.0, 0.0, -1.5], [0.0; 3]));

    let report = boundary.apply(&mut store, 0.0).unwrap();

    assert_eq!(report.removed, 2);
    assert_eq!(store.len(), 2);
    assert!(store.particles().iter().all(|p| !boundary.is_outside(p)));
}
