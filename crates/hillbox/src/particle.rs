use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A single body in the simulation.
///
/// A particle with `mass == 0.0` is a test particle: it feels gravity but does not
/// exert it. A particle with `radius == 0.0` never collides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub position: Point3<f64>,
    pub velocity: Vector3<f64>,
    /// Recomputed before every kick; only meaningful inside a step.
    pub acceleration: Vector3<f64>,
    pub mass: f64,
    pub radius: f64,
    /// Simulation time of the most recent collision, if any.
    pub last_collision: Option<f64>,
    /// Fixed particles are never drifted or kicked but still gravitate.
    #[serde(default)]
    pub fixed: bool,
}

impl Default for Particle {
    fn default() -> Self {
        Particle {
            position: Point3::origin(),
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            mass: 0.0,
            radius: 0.0,
            last_collision: None,
            fixed: false,
        }
    }
}

impl Particle {
    /// Creates a point mass with zero radius.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hillbox::particle::Particle;
    ///
    /// let p = Particle::new(1.0, [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
    /// assert_eq!(p.mass, 1.0);
    /// assert_eq!(p.radius, 0.0);
    /// ```
    pub fn new(mass: f64, position: [f64; 3], velocity: [f64; 3]) -> Self {
        Particle {
            position: Point3::from(position),
            velocity: Vector3::from(velocity),
            mass,
            ..Default::default()
        }
    }

    /// Creates a massless test particle.
    pub fn test(position: [f64; 3], velocity: [f64; 3]) -> Self {
        Self::new(0.0, position, velocity)
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Pins the particle in place. It keeps exerting gravity.
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    pub fn is_test_particle(&self) -> bool {
        self.mass == 0.0
    }

    pub fn can_collide(&self) -> bool {
        self.radius > 0.0
    }

    pub fn momentum(&self) -> Vector3<f64> {
        self.velocity * self.mass
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity.magnitude_squared()
    }

    /// Kinetic energy per unit mass.
    pub fn specific_kinetic_energy(&self) -> f64 {
        0.5 * self.velocity.magnitude_squared()
    }

    /// Angular momentum about the origin, `m (r × v)`.
    pub fn angular_momentum(&self) -> Vector3<f64> {
        self.position.coords.cross(&self.velocity) * self.mass
    }

    pub fn distance_to(&self, other: &Particle) -> f64 {
        (self.position - other.position).magnitude()
    }

    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|c| c.is_finite())
            && self.velocity.iter().all(|c| c.is_finite())
    }
}

impl crate::tree::Massive for Particle {
    fn position(&self) -> Point3<f64> {
        self.position
    }

    fn mass(&self) -> f64 {
        self.mass
    }

    fn radius(&self) -> f64 {
        self.radius
    }
}
