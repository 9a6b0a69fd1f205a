//! Target muscle catalog
//!
//! Static lookup from exercise name to category and electrode placement.
//! The tables are process-wide constants, safe for unsynchronized reads.

use crate::types::ExerciseCategory;

/// Fallback name when motion looks like resistance training
pub const STRENGTH_FALLBACK_EXERCISE: &str = "squat";

/// Fallback name when motion looks like cyclic cardio
pub const ENDURANCE_FALLBACK_EXERCISE: &str = "running";

const LOWER_BODY_POSTERIOR: &[&str] = &["quadriceps", "hamstrings", "glutes"];
const UPPER_BODY_PRESS: &[&str] = &["pectorals", "deltoids", "triceps"];
const RUNNING: &[&str] = &["quadriceps", "hamstrings", "calves"];
const SWIMMING: &[&str] = &["deltoids", "lats", "triceps", "trapezius"];
const ROWING: &[&str] = &["lats", "rhomboids", "biceps", "quadriceps"];
const FULL_BODY: &[&str] = &["quadriceps", "glutes", "deltoids", "core"];
const MOBILITY: &[&str] = &["lower_back", "hamstrings", "trapezius"];

/// One catalog row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub category: ExerciseCategory,
    pub muscles: &'static [&'static str],
}

const fn entry(
    name: &'static str,
    category: ExerciseCategory,
    muscles: &'static [&'static str],
) -> CatalogEntry {
    CatalogEntry {
        name,
        category,
        muscles,
    }
}

/// Every exercise the engine knows by name
pub const CATALOG: &[CatalogEntry] = &[
    entry("squat", ExerciseCategory::Strength, LOWER_BODY_POSTERIOR),
    entry("deadlift", ExerciseCategory::Strength, LOWER_BODY_POSTERIOR),
    entry("bench_press", ExerciseCategory::Strength, UPPER_BODY_PRESS),
    entry("shoulder_press", ExerciseCategory::Strength, UPPER_BODY_PRESS),
    entry("running", ExerciseCategory::Endurance, RUNNING),
    entry("cycling", ExerciseCategory::Endurance, LOWER_BODY_POSTERIOR),
    entry("swimming", ExerciseCategory::Endurance, SWIMMING),
    entry("rowing", ExerciseCategory::Endurance, ROWING),
    entry("jumping_jacks", ExerciseCategory::Hiit, FULL_BODY),
    entry("burpees", ExerciseCategory::Hiit, FULL_BODY),
    entry("mountain_climbers", ExerciseCategory::Hiit, FULL_BODY),
    entry("yoga", ExerciseCategory::Flexibility, MOBILITY),
    entry("pilates", ExerciseCategory::Flexibility, MOBILITY),
    entry("stretching", ExerciseCategory::Flexibility, MOBILITY),
];

/// Lookup facade over [`CATALOG`]
pub struct TargetMuscleCatalog;

impl TargetMuscleCatalog {
    /// Canonical form of an exercise name: trimmed, lowercase, `_`-separated
    pub fn normalize_name(name: &str) -> String {
        name.trim()
            .to_ascii_lowercase()
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn lookup(name: &str) -> Option<&'static CatalogEntry> {
        let normalized = Self::normalize_name(name);
        CATALOG.iter().find(|e| e.name == normalized)
    }

    /// Category for an exercise name; unknown names map to `Unknown`
    pub fn category_of(name: &str) -> ExerciseCategory {
        Self::lookup(name)
            .map(|e| e.category)
            .unwrap_or(ExerciseCategory::Unknown)
    }

    /// Ordered muscle groups targeted for an exercise name
    pub fn muscles_for(name: &str) -> Vec<String> {
        Self::lookup(name)
            .map(|e| e.muscles)
            .unwrap_or(MOBILITY)
            .iter()
            .map(|m| m.to_string())
            .collect()
    }
}
