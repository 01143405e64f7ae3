//! Search parameters and their derivation.
//!
//! [`SearchParameters`] is an immutable value object. New parameter sets
//! are derived from a base plus [`ParameterOverrides`] via
//! [`SearchParameters::with_overrides`]; every field is clamped to its
//! range on the way out.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Metadata equality filters passed through to the vector index.
pub type MetadataFilters = BTreeMap<String, String>;

/// Accepted range for `top_k`.
pub const TOP_K_RANGE: (usize, usize) = (3, 50);
/// Accepted range for `similarity_threshold`.
pub const SIMILARITY_RANGE: (f32, f32) = (0.5, 0.95);
/// Accepted range for `max_iterations`.
pub const ITERATION_RANGE: (usize, usize) = (1, 5);

/// Fallback `top_k` when parameter derivation fails.
pub const FALLBACK_TOP_K: usize = 10;
/// Fallback `max_iterations` when parameter derivation fails.
pub const FALLBACK_MAX_ITERATIONS: usize = 3;
/// Fallback `similarity_threshold` when parameter derivation fails.
pub const FALLBACK_SIMILARITY_THRESHOLD: f32 = 0.7;
/// Fallback `sufficiency_threshold` when parameter derivation fails.
pub const FALLBACK_SUFFICIENCY_THRESHOLD: f32 = 0.8;

/// Parameters governing one research session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParameters {
    /// Results per search, `3..=50`.
    pub top_k: usize,
    /// Minimum index similarity, `0.5..=0.95`.
    pub similarity_threshold: f32,
    /// Iteration cap, `1..=5`.
    pub max_iterations: usize,
    /// Sufficiency score at which research stops, `0..=1`.
    pub sufficiency_threshold: f32,
    /// Optional metadata filters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_filters: Option<MetadataFilters>,
}

impl Default for SearchParameters {
    /// The hardcoded fallback set used whenever derivation fails.
    fn default() -> Self {
        Self {
            top_k: FALLBACK_TOP_K,
            similarity_threshold: FALLBACK_SIMILARITY_THRESHOLD,
            max_iterations: FALLBACK_MAX_ITERATIONS,
            sufficiency_threshold: FALLBACK_SUFFICIENCY_THRESHOLD,
            metadata_filters: None,
        }
    }
}

impl SearchParameters {
    /// Returns a copy with every field clamped to its accepted range.
    ///
    /// Non-finite floats fall back to the default value for that field.
    /// An empty filter map is normalised to `None`.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            top_k: self.top_k.clamp(TOP_K_RANGE.0, TOP_K_RANGE.1),
            similarity_threshold: clamp_finite(
                self.similarity_threshold,
                SIMILARITY_RANGE,
                FALLBACK_SIMILARITY_THRESHOLD,
            ),
            max_iterations: self.max_iterations.clamp(ITERATION_RANGE.0, ITERATION_RANGE.1),
            sufficiency_threshold: clamp_finite(
                self.sufficiency_threshold,
                (0.0, 1.0),
                FALLBACK_SUFFICIENCY_THRESHOLD,
            ),
            metadata_filters: self
                .metadata_filters
                .clone()
                .filter(|filters| !filters.is_empty()),
        }
    }

    /// Derives a new parameter set from `self` plus `overrides`.
    ///
    /// Unset override fields keep the base value. The result is clamped.
    #[must_use]
    pub fn with_overrides(&self, overrides: &ParameterOverrides) -> Self {
        Self {
            top_k: overrides.top_k.unwrap_or(self.top_k),
            similarity_threshold: overrides
                .similarity_threshold
                .unwrap_or(self.similarity_threshold),
            max_iterations: overrides.max_iterations.unwrap_or(self.max_iterations),
            sufficiency_threshold: overrides
                .sufficiency_threshold
                .unwrap_or(self.sufficiency_threshold),
            metadata_filters: overrides
                .metadata_filters
                .clone()
                .or_else(|| self.metadata_filters.clone()),
        }
        .clamped()
    }

    /// Derives adjusted search parameters for a follow-up query.
    ///
    /// Only the per-search fields change; `max_iterations` and
    /// `sufficiency_threshold` are fixed for the lifetime of a session.
    #[must_use]
    pub fn with_adjustment(&self, adjustment: &SearchAdjustment) -> Self {
        self.with_overrides(&ParameterOverrides {
            top_k: adjustment.top_k,
            similarity_threshold: adjustment.similarity_threshold,
            max_iterations: None,
            sufficiency_threshold: None,
            metadata_filters: adjustment.metadata_filters.clone(),
        })
    }
}

/// Partial parameter set, as produced by the parameter planner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParameterOverrides {
    /// Results per search.
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Minimum index similarity.
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    /// Iteration cap.
    #[serde(default)]
    pub max_iterations: Option<usize>,
    /// Sufficiency score at which research stops.
    #[serde(default)]
    pub sufficiency_threshold: Option<f32>,
    /// Metadata equality filters.
    #[serde(default)]
    pub metadata_filters: Option<MetadataFilters>,
}

/// Per-follow-up search adjustment, as produced by the search adjuster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchAdjustment {
    /// Results per search.
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Minimum index similarity.
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    /// Metadata equality filters.
    #[serde(default)]
    pub metadata_filters: Option<MetadataFilters>,
}

fn clamp_finite(value: f32, (lo, hi): (f32, f32), fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_fallback_defaults() {
        let params = SearchParameters::default();
        assert_eq!(params.top_k, 10);
        assert_eq!(params.max_iterations, 3);
        assert!((params.similarity_threshold - 0.7).abs() < f32::EPSILON);
        assert!((params.sufficiency_threshold - 0.8).abs() < f32::EPSILON);
        assert!(params.metadata_filters.is_none());
    }

    #[test_case(0, 3; "below range")]
    #[test_case(3, 3; "lower bound")]
    #[test_case(25, 25; "inside")]
    #[test_case(50, 50; "upper bound")]
    #[test_case(500, 50; "above range")]
    fn test_top_k_clamp(input: usize, expected: usize) {
        let params = SearchParameters {
            top_k: input,
            ..SearchParameters::default()
        };
        assert_eq!(params.clamped().top_k, expected);
    }

    #[test_case(0, 1; "zero iterations")]
    #[test_case(9, 5; "too many iterations")]
    fn test_iteration_clamp(input: usize, expected: usize) {
        let params = SearchParameters {
            max_iterations: input,
            ..SearchParameters::default()
        };
        assert_eq!(params.clamped().max_iterations, expected);
    }

    #[test]
    fn test_float_fields_clamped_independently() {
        let params = SearchParameters {
            similarity_threshold: 0.1,
            sufficiency_threshold: 1.4,
            ..SearchParameters::default()
        }
        .clamped();
        assert!((params.similarity_threshold - 0.5).abs() < f32::EPSILON);
        assert!((params.sufficiency_threshold - 1.0).abs() < f32::EPSILON);
        assert_eq!(params.top_k, 10);
    }

    #[test]
    fn test_non_finite_falls_back() {
        let params = SearchParameters {
            similarity_threshold: f32::NAN,
            sufficiency_threshold: f32::INFINITY,
            ..SearchParameters::default()
        }
        .clamped();
        assert!((params.similarity_threshold - 0.7).abs() < f32::EPSILON);
        assert!((params.sufficiency_threshold - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_with_overrides_keeps_unset_fields() {
        let base = SearchParameters::default();
        let derived = base.with_overrides(&ParameterOverrides {
            top_k: Some(20),
            ..ParameterOverrides::default()
        });
        assert_eq!(derived.top_k, 20);
        assert_eq!(derived.max_iterations, base.max_iterations);
        // base untouched
        assert_eq!(base.top_k, 10);
    }

    #[test]
    fn test_with_adjustment_cannot_touch_termination_fields() {
        let base = SearchParameters {
            max_iterations: 2,
            ..SearchParameters::default()
        };
        let mut filters = MetadataFilters::new();
        filters.insert("doc_type".to_string(), "pdf".to_string());
        let adjusted = base.with_adjustment(&SearchAdjustment {
            top_k: Some(5),
            similarity_threshold: Some(0.85),
            metadata_filters: Some(filters.clone()),
        });
        assert_eq!(adjusted.max_iterations, 2);
        assert_eq!(adjusted.top_k, 5);
        assert_eq!(adjusted.metadata_filters, Some(filters));
    }

    #[test]
    fn test_empty_filters_normalised() {
        let params = SearchParameters {
            metadata_filters: Some(MetadataFilters::new()),
            ..SearchParameters::default()
        };
        assert!(params.clamped().metadata_filters.is_none());
    }
}
