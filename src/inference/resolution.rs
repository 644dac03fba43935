//! Turning a match result into a single model.
//!
//! Policy:
//! - no candidate: the device is unsupported;
//! - an explicit choice must name one of the candidates;
//! - a single candidate is taken as is;
//! - several interchangeable candidates (same fields, same meaning for every
//!   field) resolve to the first in catalog order;
//! - anything else stays ambiguous until someone picks a model.

use super::catalog::{ModelCatalog, ModelDefinition};
use super::matcher::MatchResult;
use super::signature::Signature;
use crate::error::{BridgeError, Result};
use log::debug;
use serde::Serialize;

/// Why a resolved model was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionBasis {
    /// Only one model fits.
    SingleCandidate,
    /// Several models fit but they report the same fields with the same meaning.
    Interchangeable,
    /// Picked explicitly by the user or configuration.
    ExplicitChoice,
}

#[derive(Debug, Clone)]
pub enum Resolution<'a> {
    Unsupported {
        signature: Signature,
    },
    Resolved {
        model: &'a ModelDefinition,
        basis: ResolutionBasis,
    },
    Ambiguous {
        signature: Signature,
        candidates: Vec<&'a ModelDefinition>,
    },
}

impl<'a> Resolution<'a> {
    pub fn model(&self) -> Option<&'a ModelDefinition> {
        match self {
            Resolution::Resolved { model, .. } => Some(*model),
            _ => None,
        }
    }
}

/// Resolve `result` for `device_id`, honouring an explicit `choice` if given.
///
/// Fails only when `choice` names a model that is not a candidate.
pub fn resolve<'a>(
    catalog: &ModelCatalog,
    device_id: &str,
    result: &MatchResult<'a>,
    choice: Option<&str>,
) -> Result<Resolution<'a>> {
    let candidates = result.candidates();

    if candidates.is_empty() {
        return Ok(Resolution::Unsupported {
            signature: result.signature().clone(),
        });
    }

    if let Some(choice) = choice {
        return match candidates.iter().copied().find(|m| m.model_id == choice) {
            Some(model) => {
                debug!("Device {} resolved to {} by explicit choice", device_id, choice);
                Ok(Resolution::Resolved {
                    model,
                    basis: ResolutionBasis::ExplicitChoice,
                })
            }
            None => Err(BridgeError::InvalidModelChoice {
                device_id: device_id.to_string(),
                model_id: choice.to_string(),
            }),
        };
    }

    let first = candidates[0];
    if candidates.len() == 1 {
        return Ok(Resolution::Resolved {
            model: first,
            basis: ResolutionBasis::SingleCandidate,
        });
    }

    if candidates[1..]
        .iter()
        .all(|other| interchangeable(catalog, first, other))
    {
        debug!(
            "Device {} matches interchangeable models {:?}, using {}",
            device_id,
            result.model_ids(),
            first.model_id
        );
        return Ok(Resolution::Resolved {
            model: first,
            basis: ResolutionBasis::Interchangeable,
        });
    }

    Ok(Resolution::Ambiguous {
        signature: result.signature().clone(),
        candidates: candidates.to_vec(),
    })
}

/// Two models are interchangeable when materializing either gives the same sensors.
pub fn interchangeable(catalog: &ModelCatalog, a: &ModelDefinition, b: &ModelDefinition) -> bool {
    a.declared_fields == b.declared_fields
        && a.declared_fields.iter().all(|field| {
            catalog.category_for(&a.model_id, field) == catalog.category_for(&b.model_id, field)
        })
}
