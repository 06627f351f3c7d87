//! Coefficient-of-restitution laws
//!
//! The resolver asks a [`Restitution`] for `e` at the normal impact speed of each pair.
//! Any `Fn(f64) -> f64` closure can serve as a custom law.

/// Normal coefficient of restitution as a function of impact speed.
pub trait Restitution: Send + Sync {
    fn coefficient(&self, impact_speed: f64) -> f64;
}

/// Speed-independent restitution.
///
/// # Examples
///
/// ```
/// use hillbox::collisions::{ConstantRestitution, Restitution};
///
/// let half = ConstantRestitution(0.5);
/// assert_eq!(half.coefficient(3.0), 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantRestitution(pub f64);

impl Restitution for ConstantRestitution {
    fn coefficient(&self, _impact_speed: f64) -> f64 {
        self.0
    }
}

impl Default for ConstantRestitution {
    /// Perfectly elastic.
    fn default() -> Self {
        ConstantRestitution(1.0)
    }
}

/// Bridges et al. (1984) law for frosty ice: `e = (v / v_c)^-0.234`, capped at 1.
///
/// Impacts slower than the critical speed `v_c` are elastic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BridgesRestitution {
    pub critical_velocity: f64,
}

impl BridgesRestitution {
    const EXPONENT: f64 = -0.234;

    pub fn new(critical_velocity: f64) -> Self {
        BridgesRestitution { critical_velocity }
    }
}

impl Restitution for BridgesRestitution {
    fn coefficient(&self, impact_speed: f64) -> f64 {
        if impact_speed <= self.critical_velocity {
            return 1.0;
        }
        (impact_speed / self.critical_velocity).powf(Self::EXPONENT)
    }
}

impl<F> Restitution for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn coefficient(&self, impact_speed: f64) -> f64 {
        self(impact_speed)
    }
}
