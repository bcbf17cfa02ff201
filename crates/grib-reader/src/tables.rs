//! GRIB2 parameter and level lookup tables.
//!
//! This module provides configurable lookup tables for translating
//! GRIB2 numeric codes into human-readable parameter names and level descriptions.
//!
//! Tables are built from model configuration YAML files, allowing the mapping
//! to be configured without code changes.

use std::collections::HashMap;

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// Level description - either static text or a template with {value} placeholder
#[derive(Debug, Clone)]
pub enum LevelDescription {
    /// Static description (e.g., "surface", "mean sea level")
    Static(String),
    /// Template with {value} placeholder (e.g., "{value} mb", "{value} m above ground")
    Template(String),
}

impl LevelDescription {
    /// Format the level description, substituting placeholders if it's a template.
    ///
    /// Supported placeholders:
    /// - `{value}` - Raw level value (e.g., 100000 for 1000 mb in Pa)
    /// - `{value_mb}` - Value converted from Pa to mb (divided by 100)
    pub fn format(&self, value: u32) -> String {
        match self {
            LevelDescription::Static(s) => s.clone(),
            LevelDescription::Template(t) => {
                let result = t.replace("{value}", &value.to_string());
                // Handle Pa to mb conversion for isobaric levels
                result.replace("{value_mb}", &(value / 100).to_string())
            }
        }
    }
}

/// GRIB2 parameter and level lookup tables.
///
/// Built from model configuration files and passed to the GRIB2 reader
/// to translate numeric codes into readable names.
#[derive(Debug, Clone, Default)]
pub struct Grib2Tables {
    /// (discipline, category, number) -> parameter short name (e.g., "TMP", "UGRD")
    parameters: HashMap<ParamKey, String>,
    /// level_type -> description pattern
    levels: HashMap<u8, LevelDescription>,
}

impl Grib2Tables {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter mapping
    ///
    /// # Arguments
    /// * `discipline` - GRIB2 discipline code
    /// * `category` - Parameter category within discipline
    /// * `number` - Parameter number within category
    /// * `name` - Short parameter name (e.g., "TMP", "UGRD")
    pub fn add_parameter(&mut self, discipline: u8, category: u8, number: u8, name: String) {
        self.parameters.insert((discipline, category, number), name);
    }

    /// Add a level description mapping
    ///
    /// # Arguments
    /// * `level_type` - GRIB2 level type code
    /// * `description` - Static or template description
    pub fn add_level(&mut self, level_type: u8, description: LevelDescription) {
        self.levels.insert(level_type, description);
    }

    /// Look up parameter short name by GRIB2 codes.
    ///
    /// Returns "P{discipline}_{category}_{number}" if not found.
    pub fn get_parameter_name(&self, discipline: u8, category: u8, number: u8) -> String {
        self.parameters
            .get(&(discipline, category, number))
            .cloned()
            .unwrap_or_else(|| format!("P{}_{}_{}", discipline, category, number))
    }

    /// Look up level description by type code and value.
    ///
    /// Returns "Level type {type} value {value}" if not found.
    pub fn get_level_description(&self, level_type: u8, level_value: u32) -> String {
        match self.levels.get(&level_type) {
            Some(desc) => desc.format(level_value),
            None => format!("Level type {} value {}", level_type, level_value),
        }
    }

    /// Get the number of parameters in the table
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Get the number of level types in the table
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Check if the tables are empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.levels.is_empty()
    }
}
