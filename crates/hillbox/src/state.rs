use std::ops::Range;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{HillboxError, Result};
use crate::particle::Particle;

/// Dense, indexable particle storage.
///
/// The first `active_count` particles are the gravitating ones; the rest are test
/// particles and must be massless. Removal swaps with the last element, so indices
/// are only stable until the next removal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticleStore {
    particles: Vec<Particle>,
    /// `None` means every particle is active.
    active_count: Option<usize>,
}

impl ParticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a particle and returns its index
    ///
    /// # Examples
    ///
    /// ```
    /// use hillbox::particle::Particle;
    /// use hillbox::state::ParticleStore;
    ///
    /// let mut store = ParticleStore::new();
    /// let idx = store.add(Particle::new(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]));
    ///
    /// assert_eq!(idx, 0);
    /// assert_eq!(store.len(), 1);
    /// ```
    pub fn add(&mut self, particle: Particle) -> usize {
        self.particles.push(particle);
        self.particles.len() - 1
    }

    /// Removes the particle at `index`, keeping the active prefix contiguous
    ///
    /// The vacated slot is filled by swapping, so the last particle (or the last
    /// active one, for an active removal) changes its index.
    ///
    /// # Arguments
    ///
    /// * `index` - Position of the particle to remove
    ///
    /// # Returns
    ///
    /// The removed particle, or `InvariantViolation` when `index` is out of range
    ///
    /// # Examples
    ///
    /// ```
    /// use hillbox::particle::Particle;
    /// use hillbox::state::ParticleStore;
    ///
    /// let mut store = ParticleStore::new();
    /// store.add(Particle::new(1.0, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]));
    /// store.add(Particle::new(2.0, [1.0, 0.0, 0.0], [0.0, 0.0, 0.0]));
    ///
    /// let removed = store.remove(0).unwrap();
    /// assert_eq!(removed.mass, 1.0);
    /// assert_eq!(store.get(0).unwrap().mass, 2.0);
    /// ```
    pub fn remove(&mut self, index: usize) -> Result<Particle> {
        self.check_index(index)?;
        match self.active_count {
            Some(active) if index < active => {
                let last_active = active - 1;
                self.particles.swap(index, last_active);
                let removed = self.particles.swap_remove(last_active);
                self.active_count = Some(last_active);
                Ok(removed)
            }
            _ => Ok(self.particles.swap_remove(index)),
        }
    }

    pub fn get(&self, index: usize) -> Result<&Particle> {
        self.particles.get(index).ok_or_else(|| out_of_range(index, self.len()))
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut Particle> {
        let len = self.len();
        self.particles.get_mut(index).ok_or_else(|| out_of_range(index, len))
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Number of gravitating particles.
    ///
    /// Clamped to the store length so that a stale count can never index past the end;
    /// [`validate`](Self::validate) reports the inconsistency instead.
    pub fn active_count(&self) -> usize {
        self.active_count.map_or(self.len(), |n| n.min(self.len()))
    }

    /// The explicitly configured active count, `None` when all particles are active.
    pub fn configured_active_count(&self) -> Option<usize> {
        self.active_count
    }

    /// Declares the first `count` particles active, or all of them for `None`.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` when `count` exceeds the number of particles.
    pub fn set_active_count(&mut self, count: Option<usize>) -> Result<()> {
        if let Some(n) = count {
            if n > self.len() {
                return Err(HillboxError::invariant(format!(
                    "active count {} exceeds particle count {}",
                    n,
                    self.len()
                )));
            }
        }
        self.active_count = count;
        Ok(())
    }

    /// Checks the store contracts: active prefix within bounds, passive particles massless.
    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.active_count {
            if n > self.len() {
                return Err(HillboxError::invariant(format!(
                    "active count {} exceeds particle count {}",
                    n,
                    self.len()
                )));
            }
            if let Some(offset) = self.particles[n..].iter().position(|p| p.mass != 0.0) {
                return Err(HillboxError::invariant(format!(
                    "passive particle {} has nonzero mass",
                    n + offset
                )));
            }
        }
        Ok(())
    }

    /// Checks that `range` lies inside the store.
    pub fn check_range(&self, range: &Range<usize>) -> Result<()> {
        if range.start > range.end || range.end > self.len() {
            return Err(HillboxError::invariant(format!(
                "range {:?} outside store of {} particles",
                range,
                self.len()
            )));
        }
        Ok(())
    }

    /// Overwrites every particle's acceleration. `accelerations` must match the store length.
    pub fn set_accelerations(&mut self, accelerations: &[Vector3<f64>]) {
        debug_assert_eq!(accelerations.len(), self.particles.len());
        for (p, a) in self.particles.iter_mut().zip(accelerations) {
            p.acceleration = *a;
        }
    }

    pub fn clear_accelerations(&mut self) {
        for p in &mut self.particles {
            p.acceleration = Vector3::zeros();
        }
    }

    /// Index of the first particle with a non-finite position or velocity.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.particles.iter().position(|p| !p.is_finite())
    }

    /// Total mass of the active particles.
    pub fn total_mass(&self) -> f64 {
        self.active().iter().map(|p| p.mass).sum()
    }

    pub fn total_momentum(&self) -> Vector3<f64> {
        self.particles.iter().map(Particle::momentum).sum()
    }

    pub fn total_angular_momentum(&self) -> Vector3<f64> {
        self.particles.iter().map(Particle::angular_momentum).sum()
    }

    /// Mass-weighted centre of the active particles, `None` if they carry no mass.
    pub fn center_of_mass(&self) -> Option<Point3<f64>> {
        let total = self.total_mass();
        if total == 0.0 {
            return None;
        }
        let weighted: Vector3<f64> = self.active().iter().map(|p| p.position.coords * p.mass).sum();
        Some(Point3::from(weighted / total))
    }

    fn active(&self) -> &[Particle] {
        &self.particles[..self.active_count()]
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len() {
            return Err(out_of_range(index, self.len()));
        }
        Ok(())
    }
}

fn out_of_range(index: usize, len: usize) -> HillboxError {
    HillboxError::invariant(format!(
        "particle index {} out of range for {} particles",
        index, len
    ))
}

impl From<Vec<Particle>> for ParticleStore {
    fn from(particles: Vec<Particle>) -> Self {
        ParticleStore {
            particles,
            active_count: None,
        }
    }
}
