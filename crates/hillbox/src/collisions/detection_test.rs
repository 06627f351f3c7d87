use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::boundary::{Boundary, BoundaryMode, GhostOffset};
use crate::collisions::detection::{
    CandidatePair, CollisionDetector, DirectDetector, PlaneSweepDetector, SearchContext,
    TreeDetector,
};
use crate::config::{Axis, BoxConfig, GhostCounts, TreeParams};
use crate::particle::Particle;

fn make_spheres(n: usize, half_width: f64, radius: f64, seed: u64) -> Vec<Particle> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            Particle::new(
                1.0,
                [
                    rng.gen_range(-half_width..half_width),
                    rng.gen_range(-half_width..half_width),
                    rng.gen_range(-half_width..half_width),
                ],
                [0.0, 0.0, 0.0],
            )
            .with_radius(radius * rng.gen_range(0.5..1.5))
        })
        .collect()
}

/// Order-independent key for comparing detector output.
fn canonical(pairs: &[CandidatePair]) -> Vec<(usize, usize, [u64; 3])> {
    let mut keys: Vec<_> = pairs
        .iter()
        .map(|p| {
            (
                p.i,
                p.j,
                [
                    p.offset.shift.x.to_bits(),
                    p.offset.shift.y.to_bits(),
                    p.offset.shift.z.to_bits(),
                ],
            )
        })
        .collect();
    keys.sort();
    keys
}

#[test]
fn test_direct_finds_overlap_only() {
    let particles = vec![
        Particle::new(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]).with_radius(0.5),
        Particle::new(1.0, [0.9, 0.0, 0.0], [0.0, 0.0, 0.0]).with_radius(0.5),
        Particle::new(1.0, [5.0, 0.0, 0.0], [0.0, 0.0, 0.0]).with_radius(0.5),
    ];
    let offsets = [GhostOffset::identity()];
    let ctx = SearchContext {
        particles: &particles,
        offsets: &offsets,
        domain: None,
    };

    let pairs = DirectDetector.candidates(&ctx);

    assert_eq!(pairs.len(), 1);
    assert_eq!((pairs[0].i, pairs[0].j), (0, 1));
}

#[test]
fn test_zero_radius_never_collides() {
    let particles = vec![
        Particle::new(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]).with_radius(1.0),
        Particle::new(1.0, [0.1, 0.0, 0.0], [0.0, 0.0, 0.0]),
    ];
    let offsets = [GhostOffset::identity()];
    let ctx = SearchContext {
        particles: &particles,
        offsets: &offsets,
        domain: None,
    };

    assert!(DirectDetector.candidates(&ctx).is_empty());
    assert!(TreeDetector::default().candidates(&ctx).is_empty());
    assert!(PlaneSweepDetector::default().candidates(&ctx).is_empty());
}

#[test]
fn test_detectors_agree_open() {
    let particles = make_spheres(200, 5.0, 0.4, 21);
    let offsets = [GhostOffset::identity()];
    let ctx = SearchContext {
        particles: &particles,
        offsets: &offsets,
        domain: None,
    };

    let direct = canonical(&DirectDetector.candidates(&ctx));
    let tree = canonical(&TreeDetector::default().candidates(&ctx));
    let sweep = canonical(&PlaneSweepDetector::default().candidates(&ctx));

    assert!(!direct.is_empty());
    assert_eq!(direct, tree);
    assert_eq!(direct, sweep);
}

#[test]
fn test_detectors_agree_across_periodic_images() {
    let domain = BoxConfig::new(5.0, 2, 2, 1);
    let boundary = Boundary::new(
        BoundaryMode::Periodic,
        Some(domain.size()),
        GhostCounts { x: 1, y: 1, z: 1 },
        1.0,
    );
    let offsets = boundary.ghost_offsets(0.0);
    let mut particles = make_spheres(150, 2.5, 0.4, 5);
    for p in &mut particles {
        p.position.x *= 2.0;
        p.position.y *= 2.0;
    }
    let ctx = SearchContext {
        particles: &particles,
        offsets: &offsets,
        domain: Some(&domain),
    };

    let direct = canonical(&DirectDetector.candidates(&ctx));
    let tree = canonical(&TreeDetector::default().candidates(&ctx));
    let sweep = canonical(
        &PlaneSweepDetector { axis: Axis::Y }.candidates(&ctx),
    );

    assert!(direct.iter().any(|(_, _, shift)| *shift != [0.0f64.to_bits(); 3]));
    assert_eq!(direct, tree);
    assert_eq!(direct, sweep);
}

#[test]
fn test_cross_boundary_pair_in_shear_box() {
    let boundary = Boundary::new(
        BoundaryMode::Shear,
        Some(Vector3::new(10.0, 10.0, 10.0)),
        GhostCounts { x: 1, y: 1, z: 0 },
        1.0,
    );
    let offsets = boundary.ghost_offsets(0.0);
    let particles = vec![
        Particle::new(1.0, [4.8, 0.0, 0.0], [0.0, 0.0, 0.0]).with_radius(0.5),
        Particle::new(1.0, [-4.8, 0.0, 0.0], [0.0, 0.0, 0.0]).with_radius(0.5),
    ];
    let ctx = SearchContext {
        particles: &particles,
        offsets: &offsets,
        domain: None,
    };

    for pairs in [
        DirectDetector.candidates(&ctx),
        TreeDetector {
            tree: TreeParams::default(),
        }
        .candidates(&ctx),
        PlaneSweepDetector::default().candidates(&ctx),
    ] {
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].i, pairs[0].j), (0, 1));
        assert_eq!(pairs[0].offset.shift.x, -10.0);
        // Crossing inward from +x picks up the shear velocity of the image
        assert_eq!(pairs[0].offset.velocity_shift.y, 15.0);
    }
}

#[test]
fn test_detection_is_deterministic() {
    let particles = make_spheres(120, 3.0, 0.4, 99);
    let offsets = [GhostOffset::identity()];
    let ctx = SearchContext {
        particles: &particles,
        offsets: &offsets,
        domain: None,
    };
    let detector = TreeDetector::default();

    assert_eq!(detector.candidates(&ctx), detector.candidates(&ctx));
    assert_eq!(
        PlaneSweepDetector::default().candidates(&ctx),
        PlaneSweepDetector::default().candidates(&ctx)
    );
}
