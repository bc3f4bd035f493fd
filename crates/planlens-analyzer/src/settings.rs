//! Analyzer settings
//!
//! Every field is optional when loading from TOML; missing fields take
//! their defaults.
//!
//! ```
//! use planlens_analyzer::settings::AnalyzerSettings;
//!
//! let settings = AnalyzerSettings::from_toml_str(
//!     r#"
//!     expensive_threshold = 35.0
//!
//!     [layout]
//!     node_width = 200.0
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(settings.expensive_threshold, 35.0);
//! assert_eq!(settings.layout.node_height, 60.0);
//! ```

use crate::analysis::cost::DEFAULT_EXPENSIVE_THRESHOLD;
use crate::analysis::index_advisor::DEFAULT_MAX_INCLUDED_COLUMNS;
use planlens_core::{PlanError, Result};
use serde::{Deserialize, Serialize};

/// Settings for the analysis passes and the layout engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    /// Cost percentage at or above which an operation is reported as expensive
    pub expensive_threshold: f64,
    /// Cap on included columns per index suggestion
    pub max_included_columns: usize,
    /// Whether detected bottlenecks flag their nodes as warnings
    pub mark_warnings: bool,
    pub layout: LayoutConfig,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            expensive_threshold: DEFAULT_EXPENSIVE_THRESHOLD,
            max_included_columns: DEFAULT_MAX_INCLUDED_COLUMNS,
            mark_warnings: true,
            layout: LayoutConfig::default(),
        }
    }
}

impl AnalyzerSettings {
    /// Creates settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses settings from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let settings: Self = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks that every value is usable
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.expensive_threshold) {
            return Err(PlanError::Configuration(format!(
                "expensive_threshold must be between 0 and 100, got {}",
                self.expensive_threshold
            )));
        }
        self.layout.validate()
    }

    /// Sets the expensive-operation threshold
    pub fn with_expensive_threshold(mut self, threshold: f64) -> Self {
        self.expensive_threshold = threshold.clamp(0.0, 100.0);
        self
    }

    /// Sets the cap on included columns
    pub fn with_max_included_columns(mut self, max: usize) -> Self {
        self.max_included_columns = max;
        self
    }

    /// Sets whether bottlenecks mark node warnings
    pub fn with_mark_warnings(mut self, mark: bool) -> Self {
        self.mark_warnings = mark;
        self
    }

    /// Sets the layout configuration
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }
}

/// Fixed dimensions used by the layout engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub node_width: f64,
    pub node_height: f64,
    /// Gap between neighbouring nodes in a layer
    pub horizontal_spacing: f64,
    /// Gap between layers
    pub vertical_spacing: f64,
    /// Margin around the whole canvas
    pub padding: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 180.0,
            node_height: 60.0,
            horizontal_spacing: 40.0,
            vertical_spacing: 80.0,
            padding: 40.0,
        }
    }
}

impl LayoutConfig {
    /// Distance between the top edges of two consecutive layers
    pub fn row_pitch(&self) -> f64 {
        self.node_height + self.vertical_spacing
    }

    /// Distance between the left edges of two neighbouring nodes
    pub fn column_pitch(&self) -> f64 {
        self.node_width + self.horizontal_spacing
    }

    fn validate(&self) -> Result<()> {
        let dimensions = [
            ("node_width", self.node_width, false),
            ("node_height", self.node_height, false),
            ("horizontal_spacing", self.horizontal_spacing, true),
            ("vertical_spacing", self.vertical_spacing, true),
            ("padding", self.padding, true),
        ];

        for (name, value, zero_allowed) in dimensions {
            let valid = value.is_finite() && (value > 0.0 || (zero_allowed && value == 0.0));
            if !valid {
                return Err(PlanError::Configuration(format!(
                    "layout.{name} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }
}
