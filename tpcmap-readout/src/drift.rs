//! Drift medium parameters consumed by downstream reconstruction.
//!
//! The readout geometry does no transport physics itself; it only carries
//! the parameters of the medium filling the drift volume so processes
//! converting drift time to position can query them through one interface.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Transport parameters of the medium above a readout plane.
///
/// Implementors are plain parameter sets; none of the getters may fail or
/// depend on external state.
pub trait DriftMedium {
    /// Drift field in V/mm.
    fn electric_field(&self) -> f64;
    /// Electron drift velocity in mm/us.
    fn drift_velocity(&self) -> f64;
    /// Electron lifetime in us.
    fn electron_lifetime(&self) -> f64;
    /// Longitudinal diffusion coefficient in sqrt(mm).
    fn longitudinal_diffusion(&self) -> f64;
    /// Transversal diffusion coefficient in sqrt(mm).
    fn transversal_diffusion(&self) -> f64;
    /// Mean energy to produce an electron-ion pair, in eV.
    fn w_value(&self) -> f64;
}

/// A gas volume described entirely by stored values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GasMedium {
    pub material: String,
    pub electric_field: f64,
    pub drift_velocity: f64,
    pub electron_lifetime: f64,
    pub longitudinal_diffusion: f64,
    pub transversal_diffusion: f64,
    pub w_value: f64,
    pub temperature_k: f64,
    pub pressure_atm: f64,
}

impl Default for GasMedium {
    fn default() -> Self {
        Self {
            material: String::new(),
            electric_field: 0.0,
            drift_velocity: 0.0,
            electron_lifetime: 0.0,
            longitudinal_diffusion: 0.0,
            transversal_diffusion: 0.0,
            w_value: 0.0,
            temperature_k: 300.0,
            pressure_atm: 1.0,
        }
    }
}

impl DriftMedium for GasMedium {
    fn electric_field(&self) -> f64 {
        self.electric_field
    }

    fn drift_velocity(&self) -> f64 {
        self.drift_velocity
    }

    fn electron_lifetime(&self) -> f64 {
        self.electron_lifetime
    }

    fn longitudinal_diffusion(&self) -> f64 {
        self.longitudinal_diffusion
    }

    fn transversal_diffusion(&self) -> f64 {
        self.transversal_diffusion
    }

    fn w_value(&self) -> f64 {
        self.w_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_medium_reports_stored_values() {
        let gas = GasMedium {
            material: "Ar/iC4H10".into(),
            electric_field: 100.0,
            drift_velocity: 2.3,
            w_value: 26.0,
            ..GasMedium::default()
        };
        let medium: &dyn DriftMedium = &gas;
        assert_eq!(medium.electric_field(), 100.0);
        assert_eq!(medium.drift_velocity(), 2.3);
        assert_eq!(medium.w_value(), 26.0);
    }
}
