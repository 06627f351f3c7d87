use nalgebra::{Point3, Vector3};

use crate::error::HillboxError;
use crate::particle::Particle;
use crate::state::ParticleStore;

fn make_test_store() -> ParticleStore {
    let mut store = ParticleStore::new();
    store.add(Particle::new(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]));
    store.add(Particle::new(2.0, [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]));
    store.add(Particle::new(3.0, [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]));
    store.add(Particle::test([3.0, 0.0, 0.0], [0.0, 3.0, 0.0]));
    store.add(Particle::test([4.0, 0.0, 0.0], [0.0, 4.0, 0.0]));
    store
}

#[test]
fn test_add_returns_dense_indices() {
    let store = make_test_store();

    assert_eq!(store.len(), 5);
    assert_eq!(store.active_count(), 5);
    assert_eq!(store.get(3).unwrap().position, Point3::new(3.0, 0.0, 0.0));
}

#[test]
fn test_get_out_of_range() {
    let store = make_test_store();

    assert!(matches!(store.get(5), Err(HillboxError::InvariantViolation(_))));
}

#[test]
fn test_set_active_count_rejects_overflow() {
    let mut store = make_test_store();

    assert!(store.set_active_count(Some(3)).is_ok());
    assert_eq!(store.active_count(), 3);
    assert!(matches!(
        store.set_active_count(Some(6)),
        Err(HillboxError::InvariantViolation(_))
    ));
}

#[test]
fn test_validate_passive_mass() {
    let mut store = make_test_store();
    store.set_active_count(Some(3)).unwrap();
    assert!(store.validate().is_ok());

    store.get_mut(4).unwrap().mass = 0.5;
    assert!(matches!(store.validate(), Err(HillboxError::InvariantViolation(_))));
}

#[test]
fn test_remove_passive_particle() {
    let mut store = make_test_store();
    store.set_active_count(Some(3)).unwrap();

    let removed = store.remove(3).unwrap();

    assert_eq!(removed.position.x, 3.0);
    assert_eq!(store.len(), 4);
    assert_eq!(store.active_count(), 3);
    // Last particle moved into the hole
    assert_eq!(store.get(3).unwrap().position.x, 4.0);
}

#[test]
fn test_remove_active_keeps_prefix_contiguous() {
    let mut store = make_test_store();
    store.set_active_count(Some(3)).unwrap();

    let removed = store.remove(0).unwrap();

    assert_eq!(removed.mass, 1.0);
    assert_eq!(store.len(), 4);
    assert_eq!(store.active_count(), 2);
    assert!(store.validate().is_ok());
    assert!(store.particles()[..2].iter().all(|p| p.mass > 0.0));
    assert!(store.particles()[2..].iter().all(|p| p.mass == 0.0));
}

#[test]
fn test_total_mass_counts_active_only() {
    let mut store = make_test_store();
    store.set_active_count(Some(2)).unwrap();
    store.get_mut(2).unwrap().mass = 0.0;

    assert_eq!(store.total_mass(), 3.0);
}

#[test]
fn test_total_momentum() {
    let store = make_test_store();

    // 2 * 1 + 3 * 2
    assert_eq!(store.total_momentum(), Vector3::new(0.0, 8.0, 0.0));
}

#[test]
fn test_center_of_mass() {
    let store = make_test_store();
    let com = store.center_of_mass().unwrap();

    // (0*1 + 1*2 + 2*3) / 6
    assert!((com.x - 8.0 / 6.0).abs() < 1e-12);
}

#[test]
fn test_center_of_mass_massless() {
    let mut store = ParticleStore::new();
    store.add(Particle::test([1.0, 0.0, 0.0], [0.0, 0.0, 0.0]));

    assert!(store.center_of_mass().is_none());
}

#[test]
fn test_check_range() {
    let store = make_test_store();

    assert!(store.check_range(&(0..5)).is_ok());
    assert!(store.check_range(&(3..3)).is_ok());
    assert!(store.check_range(&(2..6)).is_err());
}

#[test]
fn test_first_non_finite() {
    let mut store = make_test_store();
    assert_eq!(store.first_non_finite(), None);

    store.get_mut(2).unwrap().position.z = f64::INFINITY;
    assert_eq!(store.first_non_finite(), Some(2));
}
