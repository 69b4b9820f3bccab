//! Serializable coregistration settings.
//!
//! ```toml
//! package = "bspline"
//! spacing = [1.5, 1.5]
//! return_deformation = true
//!
//! [bspline]
//! grid_spacing = 20.0
//! ```

use serde::{Deserialize, Serialize};
use crate::engine::{
    BSplineEngine, BSplineOptions, DiffeomorphicEngine, DiffeomorphicOptions, Engine, OpticalFlowEngine,
    OpticalFlowOptions,
};
use crate::error::{CoregError, Result};

/// Engine family. The names of the packages each engine stands in for are
/// accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Package {
    #[default]
    #[serde(alias = "elastix")]
    Bspline,
    #[serde(alias = "skimage")]
    OpticalFlow,
    #[serde(alias = "dipy")]
    Diffeomorphic,
}

impl Package {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bspline => "bspline",
            Self::OpticalFlow => "optical_flow",
            Self::Diffeomorphic => "diffeomorphic",
        }
    }
}

impl std::fmt::Display for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Package {
    type Err = CoregError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bspline" | "elastix" => Ok(Self::Bspline),
            "optical_flow" | "skimage" => Ok(Self::OpticalFlow),
            "diffeomorphic" | "dipy" => Ok(Self::Diffeomorphic),
            other => Err(CoregError::invalid_configuration(format!("unknown package '{}'", other))),
        }
    }
}

/// Engine choice, its options and the options shared by all engines.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoregConfig {
    pub package: Package,
    /// Pixel spacing, x first. Overrides the spacing of the input series.
    pub spacing: Option<Vec<f64>>,
    /// Register 3D series slice by slice.
    pub force_2d: bool,
    pub return_deformation: bool,
    pub return_transform: bool,
    pub bspline: BSplineOptions,
    pub optical_flow: OpticalFlowOptions,
    pub diffeomorphic: DiffeomorphicOptions,
}

impl CoregConfig {
    pub fn new(package: Package) -> Self {
        Self {
            package,
            ..Self::default()
        }
    }

    pub fn with_spacing(mut self, spacing: Vec<f64>) -> Self {
        self.spacing = Some(spacing);
        self
    }

    pub fn with_force_2d(mut self, force_2d: bool) -> Self {
        self.force_2d = force_2d;
        self
    }

    pub fn with_return_deformation(mut self, enabled: bool) -> Self {
        self.return_deformation = enabled;
        self
    }

    pub fn with_return_transform(mut self, enabled: bool) -> Self {
        self.return_transform = enabled;
        self
    }

    pub fn with_bspline(mut self, options: BSplineOptions) -> Self {
        self.bspline = options;
        self
    }

    pub fn with_optical_flow(mut self, options: OpticalFlowOptions) -> Self {
        self.optical_flow = options;
        self
    }

    pub fn with_diffeomorphic(mut self, options: DiffeomorphicOptions) -> Self {
        self.diffeomorphic = options;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(spacing) = &self.spacing {
            if spacing.is_empty() || spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
                return Err(CoregError::invalid_configuration(format!(
                    "spacing must be positive, got {:?}",
                    spacing
                )));
            }
        }
        match self.package {
            Package::Bspline => self.bspline.validate(),
            Package::OpticalFlow => self.optical_flow.validate(),
            Package::Diffeomorphic => self.diffeomorphic.validate(),
        }
    }

    /// Construct the selected engine.
    pub fn build_engine(&self) -> Result<Engine> {
        self.validate()?;
        let engine = match self.package {
            Package::Bspline => BSplineEngine::new(self.bspline.clone())?.into(),
            Package::OpticalFlow => OpticalFlowEngine::new(self.optical_flow.clone())?.into(),
            Package::Diffeomorphic => DiffeomorphicEngine::new(self.diffeomorphic.clone())?.into(),
        };
        tracing::debug!(package = %self.package, "built coregistration engine");
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_aliases() {
        for (name, package) in [
            ("\"elastix\"", Package::Bspline),
            ("\"bspline\"", Package::Bspline),
            ("\"skimage\"", Package::OpticalFlow),
            ("\"optical_flow\"", Package::OpticalFlow),
            ("\"dipy\"", Package::Diffeomorphic),
        ] {
            assert_eq!(serde_json::from_str::<Package>(name).unwrap(), package);
        }
        assert_eq!("DIPY".parse::<Package>().unwrap(), Package::Diffeomorphic);
        assert!("ants".parse::<Package>().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CoregConfig =
            serde_json::from_str(r#"{"package": "skimage", "optical_flow": {"attachment": 5.0}}"#).unwrap();
        assert_eq!(config.package, Package::OpticalFlow);
        assert_eq!(config.optical_flow.attachment, 5.0);
        assert_eq!(config.optical_flow.iterations, OpticalFlowOptions::default().iterations);
        assert!(!config.force_2d);
        assert!(matches!(config.build_engine().unwrap(), Engine::OpticalFlow(_)));
    }

    #[test]
    fn test_rejects_bad_spacing() {
        let config = CoregConfig::default().with_spacing(vec![1.0, 0.0]);
        assert!(matches!(config.build_engine(), Err(CoregError::InvalidConfiguration(_))));
    }
}
