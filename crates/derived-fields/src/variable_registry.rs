//! Variable Registry: static table mapping each render-target `variable_id`
//! to the raw/derived fields and feature flags its production requires.

use std::collections::HashSet;

use pnw_common::ConfigError;

use crate::model_registry::ModelConfig;

/// What one render target needs from the fetcher and derived-field layer.
#[derive(Debug, Clone)]
pub struct VariableRequirements {
    pub variable_id: &'static str,
    pub raw_fields: &'static [&'static str],
    pub optional_fields: &'static [&'static str],
    pub derived_fields: &'static [&'static str],
    pub needs_accumulation: bool,
    pub needs_precip_type: bool,
    pub needs_snow_total: bool,
    pub needs_upper_air: bool,
}

const VARIABLES: &[VariableRequirements] = &[
    VariableRequirements {
        variable_id: "tmp2m",
        raw_fields: &["tmp2m"],
        optional_fields: &["ugrd10m", "vgrd10m"],
        derived_fields: &[],
        needs_accumulation: false,
        needs_precip_type: false,
        needs_snow_total: false,
        needs_upper_air: false,
    },
    VariableRequirements {
        variable_id: "precip_total",
        raw_fields: &["tp"],
        optional_fields: &["prate"],
        derived_fields: &["tp_total"],
        needs_accumulation: true,
        needs_precip_type: false,
        needs_snow_total: false,
        needs_upper_air: false,
    },
    VariableRequirements {
        variable_id: "snow_total",
        raw_fields: &["tp", "csnow"],
        optional_fields: &["prate"],
        derived_fields: &["tp_total", "tp_snow_total"],
        needs_accumulation: true,
        needs_precip_type: true,
        needs_snow_total: true,
        needs_upper_air: false,
    },
    VariableRequirements {
        variable_id: "mslp_precip",
        raw_fields: &["prmsl", "tp"],
        optional_fields: &["prate"],
        derived_fields: &["tp_total"],
        needs_accumulation: true,
        needs_precip_type: false,
        needs_snow_total: false,
        needs_upper_air: false,
    },
    VariableRequirements {
        variable_id: "temp_wind_850",
        raw_fields: &["tmp_850", "ugrd_850", "vgrd_850", "prmsl"],
        optional_fields: &[],
        derived_fields: &[],
        needs_accumulation: false,
        needs_precip_type: false,
        needs_snow_total: false,
        needs_upper_air: true,
    },
    VariableRequirements {
        variable_id: "reflectivity",
        raw_fields: &["refc"],
        optional_fields: &[],
        derived_fields: &[],
        needs_accumulation: false,
        needs_precip_type: false,
        needs_snow_total: false,
        needs_upper_air: false,
    },
];

/// Read-only lookup over the fixed, in-code variable catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableRegistry;

impl VariableRegistry {
    pub fn all() -> &'static [VariableRequirements] {
        VARIABLES
    }

    pub fn get(variable_id: &str) -> Result<&'static VariableRequirements, ConfigError> {
        VARIABLES
            .iter()
            .find(|v| v.variable_id == variable_id)
            .ok_or_else(|| ConfigError::InvalidValue {
                model_id: "*".to_string(),
                field: "variable_id".to_string(),
                message: format!("unknown variable '{variable_id}'"),
            })
    }

    /// Requirements for `variable_id`, rejected if `model_config` excludes it.
    pub fn requirements_for(
        variable_id: &str,
        model_config: &ModelConfig,
    ) -> Result<&'static VariableRequirements, ConfigError> {
        let requirements = Self::get(variable_id)?;
        if !model_config.supports_variable(variable_id) {
            return Err(ConfigError::UnsupportedVariable {
                model_id: model_config.id.clone(),
                variable_id: variable_id.to_string(),
            });
        }
        if requirements.needs_upper_air && !model_config.has_upper_air {
            return Err(ConfigError::UnsupportedVariable {
                model_id: model_config.id.clone(),
                variable_id: variable_id.to_string(),
            });
        }
        if requirements.needs_precip_type && !model_config.has_precip_type_masks {
            return Err(ConfigError::UnsupportedVariable {
                model_id: model_config.id.clone(),
                variable_id: variable_id.to_string(),
            });
        }
        Ok(requirements)
    }

    /// Union of raw fields (required + optional) needed to cover `variables`
    /// for `model_config`, so the fetcher can issue one request per product.
    pub fn union_raw_fields(variables: &[&str], model_config: &ModelConfig) -> HashSet<String> {
        let mut fields = HashSet::new();
        for variable_id in variables {
            let Ok(requirements) = Self::requirements_for(variable_id, model_config) else {
                continue;
            };
            fields.extend(requirements.raw_fields.iter().map(|f| f.to_string()));
            fields.extend(requirements.optional_fields.iter().map(|f| f.to_string()));
        }
        fields
    }

    /// `variable_id`s supported by `model_config` out of the full catalog.
    pub fn enabled_for_model(model_config: &ModelConfig) -> Vec<&'static str> {
        VARIABLES
            .iter()
            .filter(|v| Self::requirements_for(v.variable_id, model_config).is_ok())
            .map(|v| v.variable_id)
            .collect()
    }
}
