//! Run configuration, fully defaulted to the reference TSTO case.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::design::DesignSpace;
use crate::dynamics::state::Earth;
use crate::error::{MdoError, Result};
use crate::propulsion::ChemistryOptions;
use crate::sizing::SizingOptions;
use crate::trajectory::{PhaseKind, Targets, TrajectoryLayout};

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Fixed vehicle data, not optimized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub md: f64,         // kg, payload
    pub mplf: f64,       // kg, payload fairing
    pub mass_aux_1: f64, // kg
    pub nb_engines_1: u32,
    pub nb_engines_2: u32,
    pub area_factor_1: f64,
    pub area_factor_2: f64,
    pub eta_c_star: f64,
    pub eta_c_f: f64,
    pub rmc: f64, // J/(kmol·K)
    pub p_a: f64, // Pa, nozzle design back-pressure
}

impl Default for VehicleConfig {
    fn default() -> Self {
        VehicleConfig {
            md: 11_000.0,
            mplf: 1_900.0,
            mass_aux_1: 3_000.0,
            nb_engines_1: 9,
            nb_engines_2: 1,
            area_factor_1: 0.64,
            area_factor_2: 0.64,
            eta_c_star: 0.98,
            eta_c_f: 0.98,
            rmc: 8_314.0,
            p_a: 0.0,
        }
    }
}

impl VehicleConfig {
    pub fn chemistry(&self, g0: f64) -> ChemistryOptions {
        ChemistryOptions { g0, eta_c_star: self.eta_c_star, eta_c_f: self.eta_c_f, rmc: self.rmc, p_a: self.p_a }
    }

    pub fn sizing(&self) -> SizingOptions {
        SizingOptions { nb_engines: self.nb_engines_1, mass_aux: self.mass_aux_1, ..SizingOptions::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseSettings {
    pub segments: usize,
    pub duration: (f64, f64), // s
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    /// Combustion table; the bundled LOX/RP-1 table when absent.
    pub cea_table: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MdoConfig {
    pub earth: Earth,
    pub vehicle: VehicleConfig,
    pub design: DesignSpace,
    /// Keyed by phase name; missing phases keep their defaults.
    pub phases: BTreeMap<String, PhaseSettings>,
    pub targets: Targets,
    pub tables: TablesConfig,
}

impl Default for MdoConfig {
    fn default() -> Self {
        let phases = PhaseKind::ALL
            .into_iter()
            .map(|k| {
                let settings = PhaseSettings { segments: k.default_segments(), duration: k.duration_bounds() };
                (k.name().to_string(), settings)
            })
            .collect();
        MdoConfig {
            earth: Earth::default(),
            vehicle: VehicleConfig::default(),
            design: DesignSpace::default(),
            phases,
            targets: Targets::default(),
            tables: TablesConfig::default(),
        }
    }
}

impl MdoConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: MdoConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_toml_str(&std::fs::read_to_string(path)?)?;
        info!("configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Phase names, segment counts and every bound must make sense. Values
    /// outside their bounds are left to the evaluation to report.
    pub fn validate(&self) -> Result<()> {
        for (name, s) in &self.phases {
            name.parse::<PhaseKind>()?;
            if s.segments == 0 {
                return Err(MdoError::InvalidConfig(format!("phase '{name}' needs at least one segment")));
            }
            if !(s.duration.0 <= s.duration.1) {
                return Err(MdoError::InvalidConfig(format!("phase '{name}': inverted duration bounds")));
            }
        }
        self.design.validate()?;
        let t = &self.targets;
        if !(t.lift_off_altitude.0 <= t.lift_off_altitude.1) || !(t.apogee_altitude.0 <= t.apogee_altitude.1) {
            return Err(MdoError::InvalidConfig("inverted altitude target".to_string()));
        }
        if self.earth.g0 <= 0.0 || self.earth.r0 <= 0.0 || self.earth.mu <= 0.0 {
            return Err(MdoError::InvalidConfig("earth constants must be positive".to_string()));
        }
        Ok(())
    }

    pub fn settings(&self, kind: PhaseKind) -> PhaseSettings {
        self.phases.get(kind.name()).copied().unwrap_or(PhaseSettings {
            segments: kind.default_segments(),
            duration: kind.duration_bounds(),
        })
    }

    pub fn layout(&self) -> TrajectoryLayout {
        TrajectoryLayout { segments: PhaseKind::ALL.map(|k| self.settings(k).segments) }
    }

    pub fn chemistry(&self) -> ChemistryOptions {
        self.vehicle.chemistry(self.earth.g0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_reference_case() {
        let c = MdoConfig::from_toml_str("").unwrap();
        assert_eq!(c, MdoConfig::default());
        assert_eq!(c.layout(), TrajectoryLayout::default());
        assert!((c.vehicle.md - 11_000.0).abs() < 1e-12);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let text = r#"
            [vehicle]
            md = 9000.0

            [phases.exoatmos_b]
            segments = 20
            duration = [1.0, 250.0]

            [design.diameter]
            value = 4.5
            lower = 1.0
            upper = 5.0
        "#;
        let c = MdoConfig::from_toml_str(text).unwrap();
        assert!((c.vehicle.md - 9_000.0).abs() < 1e-12);
        assert!((c.vehicle.mplf - 1_900.0).abs() < 1e-12);
        assert_eq!(c.layout().grid(PhaseKind::ExoatmosB).num_nodes(), 41);
        assert_eq!(c.layout().grid(PhaseKind::LiftOff).num_nodes(), 15);
        assert!((c.design.diameter.value - 4.5).abs() < 1e-12);
        assert!((c.design.mp_1.value - 250_951.47).abs() < 1e-9);
    }

    #[test]
    fn unknown_phase_is_rejected() {
        let text = "[phases.coast]\nsegments = 3\nduration = [1.0, 10.0]\n";
        assert!(matches!(MdoConfig::from_toml_str(text), Err(MdoError::UnknownPhase(_))));
    }

    #[test]
    fn round_trips_through_toml() {
        let c = MdoConfig::default();
        let back = MdoConfig::from_toml_str(&c.to_toml_string().unwrap()).unwrap();
        assert_eq!(back, c);
    }
}
