//! Run configuration.
//!
//! Everything that used to be a literal in the processing code (the planet's
//! surface gravity and year length, the reference wavelength and particle size
//! assumed for each aerosol species, and the output compression settings) lives
//! here so that the same code can be pointed at a different body or model setup.
//!
//! The configuration is layered with [figment]: built-in defaults (Mars, with the
//! Ames GCM dust and water-ice settings), then an optional TOML file, then
//! environment variables prefixed with `AMES_`. Nested keys use a double underscore
//! in the environment, e.g. `AMES_PLANET__GRAVITY=9.80665`. A TOML file might look like:
//!
//! ```toml
//! target_wavelength = 0.25
//!
//! [planet]
//! name = "Mars"
//! gravity = 3.72076
//! sols_per_year = 668.0
//!
//! [ice]
//! reference_wavelength = 12.0
//! particle_size = 1.5
//!
//! [compression]
//! deflate_level = 9
//! shuffle = true
//! ```
//!
//! Any section or key left out keeps its default.
use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub static ENV_PREFIX: &'static str = "AMES_";

/// Top level configuration keys; other `AMES_*` environment variables are ignored.
static TOP_LEVEL_KEYS: [&'static str; 5] = ["target_wavelength", "planet", "dust", "ice", "compression"];

/// Wavelength, in micrometers, that the UV products are computed at unless configured otherwise.
pub const DEFAULT_TARGET_WAVELENGTH: f64 = 0.25;

/// Physical constants of the body the GCM simulates.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlanetConfig {
    pub name: String,
    /// Surface gravitational acceleration in m/s^2
    pub gravity: f64,
    /// Length of one year in sols, used to wrap simulation time into sol of year
    pub sols_per_year: f64,
}

impl PlanetConfig {
    pub fn mars() -> Self {
        Self {
            name: "Mars".to_string(),
            gravity: 3.72076,
            sols_per_year: 668.0,
        }
    }
}

impl Default for PlanetConfig {
    fn default() -> Self {
        Self::mars()
    }
}

/// What quantity a GCM optical depth field represents at its reference wavelength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OpticalDepthKind {
    /// Extinction (scattering + absorption) optical depth, e.g. dust
    Extinction,
    /// Absorption-only optical depth, e.g. water ice
    Absorption,
}

/// How to read and rescale one aerosol species.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SpeciesConfig {
    /// Name of the per-layer optical depth variable in the GCM output
    pub source_variable: String,
    /// Name of the column optical depth variable to write
    pub output_variable: String,
    /// Wavelength (micrometers) at which the GCM optical depth is defined
    pub reference_wavelength: f64,
    /// Effective particle radius (micrometers), assumed uniform in space and time
    pub particle_size: f64,
    pub kind: OpticalDepthKind,
}

impl SpeciesConfig {
    pub fn dust() -> Self {
        Self {
            source_variable: "dustref".to_string(),
            output_variable: "uv_dust_optical_depth".to_string(),
            reference_wavelength: 0.690,
            particle_size: 1.2,
            kind: OpticalDepthKind::Extinction,
        }
    }

    pub fn water_ice() -> Self {
        Self {
            source_variable: "cldref".to_string(),
            output_variable: "uv_ice_optical_depth".to_string(),
            reference_wavelength: 12.0,
            particle_size: 1.5,
            kind: OpticalDepthKind::Absorption,
        }
    }
}

/// Compression applied by the output writer to the large variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CompressionConfig {
    /// Deflate level, 0 (none) to 9 (most)
    pub deflate_level: i32,
    pub shuffle: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            deflate_level: 9,
            shuffle: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not load the configuration: {0}")]
    Load(#[from] figment::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Wavelength (micrometers) to rescale the optical depths to
    #[serde(default = "default_target_wavelength")]
    pub target_wavelength: f64,
    #[serde(default)]
    pub planet: PlanetConfig,
    #[serde(default = "SpeciesConfig::dust")]
    pub dust: SpeciesConfig,
    #[serde(default = "SpeciesConfig::water_ice")]
    pub ice: SpeciesConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_wavelength: DEFAULT_TARGET_WAVELENGTH,
            planet: PlanetConfig::default(),
            dust: SpeciesConfig::dust(),
            ice: SpeciesConfig::water_ice(),
            compression: CompressionConfig::default(),
        }
    }
}

impl RunConfig {
    /// Layer the defaults, the TOML file at `toml_file` (if given) and `AMES_*`
    /// environment variables, in that order of increasing precedence.
    pub fn load(toml_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Self::defaults_figment();
        if let Some(p) = toml_file {
            if !p.is_file() {
                return Err(ConfigError::Invalid(format!(
                    "configuration file {} does not exist",
                    p.display()
                )));
            }
            log::debug!("Merging configuration from {}", p.display());
            figment = figment.merge(Toml::file(p));
        }
        figment = figment.merge(env_provider());
        Self::extract(figment)
    }

    /// Layer a TOML string over the defaults. Environment variables are not consulted.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Self::extract(Self::defaults_figment().merge(Toml::string(s)))
    }

    fn defaults_figment() -> Figment {
        Figment::from(Serialized::defaults(RunConfig::default()))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: RunConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.planet.gravity.is_finite() && self.planet.gravity > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "planet.gravity must be a positive number, got {}",
                self.planet.gravity
            )));
        }
        if !(self.planet.sols_per_year.is_finite() && self.planet.sols_per_year > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "planet.sols_per_year must be a positive number, got {}",
                self.planet.sols_per_year
            )));
        }
        if !(self.target_wavelength.is_finite() && self.target_wavelength > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "target_wavelength must be a positive number, got {}",
                self.target_wavelength
            )));
        }
        for (label, species) in [("dust", &self.dust), ("ice", &self.ice)] {
            if !(species.particle_size.is_finite() && species.particle_size > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{label}.particle_size must be a positive number, got {}",
                    species.particle_size
                )));
            }
            if !(species.reference_wavelength.is_finite() && species.reference_wavelength > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{label}.reference_wavelength must be a positive number, got {}",
                    species.reference_wavelength
                )));
            }
        }
        if !(0..=9).contains(&self.compression.deflate_level) {
            return Err(ConfigError::Invalid(format!(
                "compression.deflate_level must be between 0 and 9, got {}",
                self.compression.deflate_level
            )));
        }
        Ok(())
    }
}

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX)
        .filter(|key| {
            let section = key.as_str().split("__").next().unwrap_or_default();
            TOP_LEVEL_KEYS
                .iter()
                .any(|k| k.eq_ignore_ascii_case(section))
        })
        .split("__")
}

fn default_target_wavelength() -> f64 {
    DEFAULT_TARGET_WAVELENGTH
}
