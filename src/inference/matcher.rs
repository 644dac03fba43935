//! Model matcher.
//!
//! Maps a signature to the catalog models that explain it:
//! 1. models whose declared fields equal the signature, if there are any;
//! 2. otherwise the models whose declared fields are a subset of the
//!    signature with the largest number of fields;
//! 3. otherwise nothing.
//!
//! Ties are never broken here. Every tied model is returned in catalog order
//! and the caller decides (see [`super::resolution`]).

use super::catalog::{ModelCatalog, ModelDefinition};
use super::signature::Signature;
use log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// No model fits the signature.
    None,
    /// At least one model declares exactly the signature.
    Exact,
    /// Best subset matches; the signature carries extra fields.
    Subset,
}

/// Ordered candidate list for one signature.
#[derive(Debug, Clone)]
pub struct MatchResult<'a> {
    signature: Signature,
    kind: MatchKind,
    candidates: Vec<&'a ModelDefinition>,
}

impl<'a> MatchResult<'a> {
    fn none(signature: Signature) -> Self {
        Self {
            signature,
            kind: MatchKind::None,
            candidates: Vec::new(),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    pub fn candidates(&self) -> &[&'a ModelDefinition] {
        &self.candidates
    }

    pub fn model_ids(&self) -> Vec<&'a str> {
        self.candidates.iter().map(|m| m.model_id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// More than one equally good candidate.
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }

    pub fn first(&self) -> Option<&'a ModelDefinition> {
        self.candidates.first().copied()
    }
}

pub struct ModelMatcher<'a> {
    catalog: &'a ModelCatalog,
}

impl<'a> ModelMatcher<'a> {
    pub fn new(catalog: &'a ModelCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a ModelCatalog {
        self.catalog
    }

    pub fn find_matches(&self, signature: &Signature) -> MatchResult<'a> {
        // Every model would be a trivial subset of nothing useful.
        if signature.is_empty() {
            return MatchResult::none(signature.clone());
        }

        debug!("Matching measurement keys (after cleanup): {}", signature);

        let exact: Vec<&'a ModelDefinition> = self
            .catalog
            .iter()
            .filter(|model| model.declared_fields == *signature.fields())
            .collect();
        if !exact.is_empty() {
            debug!(
                "Exact match for {}: {:?}",
                signature,
                exact.iter().map(|m| m.model_id.as_str()).collect::<Vec<_>>()
            );
            return MatchResult {
                signature: signature.clone(),
                kind: MatchKind::Exact,
                candidates: exact,
            };
        }

        let mut best_score = 0;
        let mut best: Vec<&'a ModelDefinition> = Vec::new();

        for model in self.catalog.iter() {
            if !signature.contains_all(&model.declared_fields) {
                continue;
            }

            let score = model.declared_fields.len();
            if score > best_score {
                debug!(
                    "Better subset match {} (score={}, previous best={})",
                    model.model_id, score, best_score
                );
                best_score = score;
                best.clear();
                best.push(model);
            } else if score == best_score {
                debug!("Tied subset match {} (score={})", model.model_id, score);
                best.push(model);
            } else {
                debug!(
                    "Subset match rejected for {} (score={} < best={})",
                    model.model_id, score, best_score
                );
            }
        }

        if best.is_empty() {
            warn!(
                "Could not detect Mobile Alerts device model. Measurement keys: {}. \
                 This might be a new device type, please report it.",
                signature
            );
            return MatchResult::none(signature.clone());
        }

        MatchResult {
            signature: signature.clone(),
            kind: MatchKind::Subset,
            candidates: best,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::catalog::ModelDefinition;
    use crate::inference::signature::{Measurement, classify};
    use serde_json::{Value, json};

    fn signature_of(value: Value) -> Signature {
        match value {
            Value::Object(map) => classify(&map),
            _ => panic!("fixture must be an object"),
        }
    }

    fn ids(catalog: &ModelCatalog, value: Value) -> Vec<String> {
        ModelMatcher::new(catalog)
            .find_matches(&signature_of(value))
            .model_ids()
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_single_thermometer() {
        let catalog = ModelCatalog::builtin();
        let result = ModelMatcher::new(&catalog).find_matches(&signature_of(json!({
            "t1": 22.5, "ts": 1704067200, "idx": "0E7EA4A71203", "c": 0, "lb": false
        })));
        assert_eq!(result.kind(), MatchKind::Exact);
        assert_eq!(result.model_ids(), vec!["MA10100"]);
        assert!(!result.is_ambiguous());
    }

    #[test]
    fn test_cable_and_water_models_tie() {
        let catalog = ModelCatalog::builtin();
        assert_eq!(
            ids(&catalog, json!({"t1": 22.5, "t2": 18.3, "h": 65.0})),
            vec!["MA10300", "MA10350"]
        );
    }

    #[test]
    fn test_averages_prefer_climate_station() {
        let catalog = ModelCatalog::builtin();
        let result = ModelMatcher::new(&catalog).find_matches(&signature_of(json!({
            "idx": 239621, "ts": 1742682553, "c": 1742682558, "lb": true,
            "t1": 19.7, "h": 36.0, "h3havg": 36.0, "h24havg": 37.0, "h7davg": 35.0, "h30davg": 40.0
        })));
        assert_eq!(result.model_ids(), vec!["MA10230"]);
        assert_eq!(result.first().unwrap().declared_fields.len(), 6);
    }

    #[test]
    fn test_subset_prefers_most_fields() {
        let catalog = ModelCatalog::builtin();
        // Rain gauge with an extra unknown flag: {t1} and {t1, r, rf} are both subsets.
        let result = ModelMatcher::new(&catalog).find_matches(&signature_of(json!({
            "t1": 12.0, "r": 0.258, "rf": 10, "rx": 1
        })));
        assert_eq!(result.kind(), MatchKind::Subset);
        assert_eq!(result.model_ids(), vec!["MA10650"]);
    }

    #[test]
    fn test_subset_ties_are_all_kept() {
        let catalog = ModelCatalog::builtin();
        // {t1, h, extra}: MA10200 and MA10241 both declare {t1, h}.
        assert_eq!(
            ids(&catalog, json!({"t1": 21.3, "h": 45.0, "hx": 1})),
            vec!["MA10200", "MA10241"]
        );
    }

    #[test]
    fn test_contact_sensor_with_extra_fields() {
        let catalog = ModelCatalog::builtin();
        assert_eq!(
            ids(&catalog, json!({"w": false, "wsct": true, "wutt": true})),
            vec!["MA10800"]
        );
    }

    #[test]
    fn test_exact_match_wins_over_larger_subset_matches() {
        let catalog = ModelCatalog::builtin();
        assert_eq!(
            ids(&catalog, json!({"t1": 22.0, "t2": 5.5, "h": 51.0, "ppm": 450})),
            vec!["MA10402"]
        );
        assert_eq!(ids(&catalog, json!({"t1": 22.5, "t2": 18.3})), vec!["MA10101"]);
    }

    #[test]
    fn test_pool_sensor_and_multi_sensor() {
        let catalog = ModelCatalog::builtin();
        assert_eq!(
            ids(&catalog, json!({"t1": 22.5, "h1": 65.0, "t2": 1})),
            vec!["MA10700"]
        );
        assert_eq!(
            ids(&catalog, json!({
                "t1": 21.5, "t2": 18.3, "t3": 22.1, "t4": 19.8,
                "h1": 55.0, "h2": 48.5, "h3": 52.3, "h4": 60.1
            })),
            vec!["TFA_30.3060.01:IT"]
        );
    }

    #[test]
    fn test_humidity_only_station() {
        let catalog = ModelCatalog::builtin();
        let result = ModelMatcher::new(&catalog).find_matches(&signature_of(json!({"h1": 48.0})));
        assert_eq!(result.kind(), MatchKind::Exact);
        assert_eq!(result.model_ids(), vec!["MA10450"]);

        // Devices that also report h1 keep their own exact match.
        assert_eq!(
            ids(&catalog, json!({"t1": 22.5, "h1": 65.0, "t2": 1})),
            vec!["MA10700"]
        );
    }

    #[test]
    fn test_unknown_and_empty() {
        let catalog = ModelCatalog::builtin();
        let matcher = ModelMatcher::new(&catalog);

        let unknown = matcher.find_matches(&signature_of(json!({"xyz": 1})));
        assert!(unknown.is_empty());
        assert_eq!(unknown.kind(), MatchKind::None);
        assert!(unknown.signature().contains("xyz"));

        let metadata_only =
            matcher.find_matches(&signature_of(json!({"idx": 1, "ts": 2, "c": 3, "lb": false})));
        assert!(metadata_only.is_empty());
        assert!(metadata_only.signature().is_empty());

        assert!(matcher.find_matches(&classify(&Measurement::new())).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let catalog = ModelCatalog::builtin();
        let matcher = ModelMatcher::new(&catalog);
        let signature = signature_of(json!({"t1": 1.0, "t2": 2.0, "h": 3.0, "extra": 0}));
        let first = matcher.find_matches(&signature).model_ids();
        for _ in 0..10 {
            assert_eq!(matcher.find_matches(&signature).model_ids(), first);
        }
    }

    #[test]
    fn test_subset_maximality_over_all_signatures() {
        let catalog = ModelCatalog::builtin();
        let matcher = ModelMatcher::new(&catalog);
        let pool = ["t1", "t2", "t3", "h", "h1", "ap", "r", "rf", "ppm", "w", "ws", "wg", "wd"];

        // Every subset of the pool (2^13 signatures).
        for mask in 1u32..(1 << pool.len()) {
            let signature: Signature = pool
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, f)| *f)
                .collect();
            let result = matcher.find_matches(&signature);

            let exact: Vec<&str> = catalog
                .iter()
                .filter(|m| m.declared_fields == *signature.fields())
                .map(|m| m.model_id.as_str())
                .collect();
            if !exact.is_empty() {
                assert_eq!(result.model_ids(), exact);
                continue;
            }

            let best = catalog
                .iter()
                .filter(|m| signature.contains_all(&m.declared_fields))
                .map(|m| m.declared_fields.len())
                .max();
            match best {
                None => assert!(result.is_empty()),
                Some(best) => {
                    let expected: Vec<&str> = catalog
                        .iter()
                        .filter(|m| {
                            signature.contains_all(&m.declared_fields)
                                && m.declared_fields.len() == best
                        })
                        .map(|m| m.model_id.as_str())
                        .collect();
                    assert_eq!(result.model_ids(), expected);
                }
            }
        }
    }

    #[test]
    fn test_tie_reset_on_higher_score() {
        let catalog = ModelCatalog::new(
            vec![
                ModelDefinition::new("A", "A", ["t1"]),
                ModelDefinition::new("B", "B", ["h"]),
                ModelDefinition::new("C", "C", ["t1", "h"]),
                ModelDefinition::new("D", "D", ["t1", "w"]),
            ],
            vec![],
        )
        .unwrap();
        let matcher = ModelMatcher::new(&catalog);
        let signature: Signature = ["t1", "h", "w", "x"].into_iter().collect();
        assert_eq!(matcher.find_matches(&signature).model_ids(), vec!["C", "D"]);
    }
}
