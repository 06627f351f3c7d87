//! Energy diagnostics over a subrange of the particle store.
//!
//! Everything here reads the store and nothing else: ghost images are ignored, so in a
//! periodic box the potential is that of the primary particles only.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::particle::Particle;
use crate::state::ParticleStore;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyReport {
    pub kinetic: f64,
    pub potential: f64,
}

impl EnergyReport {
    pub fn total(&self) -> f64 {
        self.kinetic + self.potential
    }
}

/// Plummer-softened pair potential per unit mass of both partners.
fn pair_potential(a: &Particle, b: &Particle, g: f64, softening_sq: f64) -> f64 {
    let r2 = (a.position - b.position).norm_squared() + softening_sq;
    if r2 == 0.0 {
        return 0.0;
    }
    -g / r2.sqrt()
}

/// Energy of the particles in `range`
///
/// # Arguments
///
/// * `store` - Particles to inspect
/// * `range` - Indices whose kinetic energy is summed
/// * `g` - Gravitational constant
/// * `softening` - Plummer softening length
///
/// # Returns
///
/// Kinetic energy `Σ ½ m v²` over the range and potential energy over every pair
/// `i < j` with both members in the range, plus the pairs a range member forms with an
/// active particle outside it. Coincident unsoftened pairs contribute nothing.
pub fn compute_energy(
    store: &ParticleStore,
    range: Range<usize>,
    g: f64,
    softening: f64,
) -> Result<EnergyReport> {
    store.check_range(&range)?;
    let particles = store.particles();
    let active = store.active_count();
    let eps2 = softening * softening;

    let kinetic: f64 = particles[range.clone()]
        .iter()
        .map(Particle::kinetic_energy)
        .sum();

    let mut potential = 0.0;
    for i in range.clone() {
        let a = &particles[i];
        for (j, b) in particles.iter().enumerate().skip(i + 1) {
            if range.contains(&j) || j < active {
                potential += a.mass * b.mass * pair_potential(a, b, g, eps2);
            }
        }
        for b in &particles[..active.min(range.start)] {
            potential += a.mass * b.mass * pair_potential(a, b, g, eps2);
        }
    }

    Ok(EnergyReport { kinetic, potential })
}

/// Energy per unit mass of each particle in `range`, summed
///
/// `Σ ½ v² − Σ_{active j ≠ i} G m_j / √(r² + ε²)`. Unlike [`compute_energy`] this is
/// meaningful for massless test particles, whose orbital energy is conserved in a
/// static potential.
pub fn compute_specific_energy(
    store: &ParticleStore,
    range: Range<usize>,
    g: f64,
    softening: f64,
) -> Result<f64> {
    store.check_range(&range)?;
    let particles = store.particles();
    let sources = &particles[..store.active_count()];
    let eps2 = softening * softening;

    let energy: f64 = particles[range.clone()]
        .iter()
        .zip(range)
        .map(|(p, i)| {
            let potential: f64 = sources
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, s)| s.mass * pair_potential(p, s, g, eps2))
                .sum();
            p.specific_kinetic_energy() + potential
        })
        .sum();

    Ok(energy)
}

/// `|e1 - e0| / |e0|`, or the absolute change when `e0` is zero.
pub fn relative_energy_error(e0: f64, e1: f64) -> f64 {
    if e0 == 0.0 {
        (e1 - e0).abs()
    } else {
        ((e1 - e0) / e0).abs()
    }
}
