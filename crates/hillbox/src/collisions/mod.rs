//! Collision detection and resolution
//!
//! Detection enumerates candidate pairs whose spheres overlap, across ghost images;
//! resolution walks those pairs once, in order, bouncing (or merging) each pair that is
//! still touching and approaching.

pub mod detection;
pub mod resolution;
pub mod restitution;

#[cfg(test)]
mod detection_test;

pub use detection::{
    detector_for, CandidatePair, CollisionDetector, DirectDetector, PlaneSweepDetector,
    SearchContext, TreeDetector,
};
pub use resolution::{merge_pair, resolve_collisions, CollisionSettings, CollisionStats};
pub use restitution::{BridgesRestitution, ConstantRestitution, Restitution};
