//! Conversion settings and validation.
//!
//! Settings come from an optional JSON file and are overlaid by command-line
//! flags. Every field is optional so a partial file is valid; the
//! `effective_*` accessors supply the defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::HeaderGeneration;
use crate::domain::ModelConfig;
use crate::layout::{DEFAULT_ARCHITECTURE, architecture, known_tags};
use crate::quant::{DEFAULT_GROUP_SIZE, QuantScheme, SchemeKind};

/// Smallest accepted INT4 group size.
pub const MIN_GROUP_SIZE: usize = 2;

/// Largest accepted INT4 group size.
pub const MAX_GROUP_SIZE: usize = 4096;

/// Settings for one conversion job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConvertSettings {
    /// Weight encoding.
    pub scheme: Option<SchemeKind>,

    /// INT4 group size (even, 2..=4096).
    pub group_size: Option<usize>,

    /// Treat a missing tensor as fatal instead of warn-and-skip.
    pub strict: Option<bool>,

    /// Architecture tag selecting emission order and key aliases.
    pub architecture: Option<String>,

    /// Header generation to write. Defaults to the smallest one able to
    /// carry the config.
    pub header: Option<HeaderGeneration>,

    /// Override the rotary base written into a `rope` header.
    pub rope_theta: Option<f32>,

    /// Override the model type tag.
    pub model_type: Option<i32>,

    /// Override whether the classifier shares the embedding table.
    pub shared_classifier: Option<bool>,
}

impl ConvertSettings {
    /// Create settings with the defaults filled in.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            scheme: Some(SchemeKind::Fp32),
            group_size: Some(DEFAULT_GROUP_SIZE),
            strict: Some(false),
            architecture: Some(DEFAULT_ARCHITECTURE.to_string()),
            header: None,
            rope_theta: None,
            model_type: None,
            shared_classifier: None,
        }
    }

    #[must_use]
    pub const fn effective_group_size(&self) -> usize {
        match self.group_size {
            Some(size) => size,
            None => DEFAULT_GROUP_SIZE,
        }
    }

    #[must_use]
    pub const fn effective_scheme(&self) -> QuantScheme {
        match self.scheme {
            Some(kind) => kind.with_group_size(self.effective_group_size()),
            None => QuantScheme::Fp32,
        }
    }

    #[must_use]
    pub const fn effective_strict(&self) -> bool {
        matches!(self.strict, Some(true))
    }

    #[must_use]
    pub fn effective_architecture(&self) -> &str {
        self.architecture.as_deref().unwrap_or(DEFAULT_ARCHITECTURE)
    }

    /// Header generation for `config`, honoring an explicit choice.
    #[must_use]
    pub fn effective_header(&self, config: &ModelConfig) -> HeaderGeneration {
        self.header
            .unwrap_or_else(|| HeaderGeneration::for_config(config))
    }

    /// Apply the config overrides to a config read from a source.
    #[must_use]
    pub fn apply_to(&self, config: ModelConfig) -> ModelConfig {
        let mut config = config;
        if let Some(model_type) = self.model_type {
            config = config.with_model_type(model_type);
        }
        if let Some(theta) = self.rope_theta {
            config = config.with_rope_theta(theta);
        }
        if let Some(shared) = self.shared_classifier {
            config = config.with_shared_classifier(shared);
        }
        config
    }

    /// Overlay `other` onto these settings; fields set in `other` win.
    pub fn merge(&mut self, other: &Self) {
        if other.scheme.is_some() {
            self.scheme = other.scheme;
        }
        if other.group_size.is_some() {
            self.group_size = other.group_size;
        }
        if other.strict.is_some() {
            self.strict = other.strict;
        }
        if let Some(ref arch) = other.architecture {
            self.architecture = Some(arch.clone());
        }
        if other.header.is_some() {
            self.header = other.header;
        }
        if other.rope_theta.is_some() {
            self.rope_theta = other.rope_theta;
        }
        if other.model_type.is_some() {
            self.model_type = other.model_type;
        }
        if other.shared_classifier.is_some() {
            self.shared_classifier = other.shared_classifier;
        }
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Group size must be an even number between 2 and 4096, got {0}")]
    InvalidGroupSize(usize),

    #[error("Unknown architecture '{tag}' (known: {known})")]
    UnknownArchitecture { tag: String, known: String },

    #[error("Rope theta must be a positive finite number, got {0}")]
    InvalidRopeTheta(String),

    #[error("Header generation {header} cannot carry {field}")]
    HeaderTooSmall { header: String, field: &'static str },

    #[error("Failed to read settings file {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// Validate settings values.
pub fn validate_settings(settings: &ConvertSettings) -> Result<(), SettingsError> {
    if let Some(size) = settings.group_size {
        if !(MIN_GROUP_SIZE..=MAX_GROUP_SIZE).contains(&size) || size % 2 != 0 {
            return Err(SettingsError::InvalidGroupSize(size));
        }
    }

    if let Some(ref tag) = settings.architecture {
        if architecture(tag).is_none() {
            return Err(SettingsError::UnknownArchitecture {
                tag: tag.clone(),
                known: known_tags().join(", "),
            });
        }
    }

    if let Some(theta) = settings.rope_theta {
        if !theta.is_finite() || theta <= 0.0 {
            return Err(SettingsError::InvalidRopeTheta(theta.to_string()));
        }
    }

    match settings.header {
        Some(HeaderGeneration::Legacy) if settings.model_type.is_some() => {
            return Err(SettingsError::HeaderTooSmall {
                header: "legacy".to_string(),
                field: "model_type",
            });
        }
        Some(header @ (HeaderGeneration::Legacy | HeaderGeneration::Typed))
            if settings.rope_theta.is_some() =>
        {
            return Err(SettingsError::HeaderTooSmall {
                header: format!("{header:?}").to_lowercase(),
                field: "rope_theta",
            });
        }
        _ => {}
    }

    Ok(())
}

/// Load settings from a JSON file.
pub fn load_settings(path: &Path) -> Result<ConvertSettings, SettingsError> {
    let unreadable = |reason: String| SettingsError::Unreadable {
        path: path.display().to_string(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    let settings: ConvertSettings =
        serde_json::from_str(&text).map_err(|e| unreadable(e.to_string()))?;
    tracing::debug!(path = %path.display(), "Loaded conversion settings");
    Ok(settings)
}
