//! Device model inference.
//!
//! The vendor API never says which product a device is, so the model is
//! inferred from the shape of its measurement object:
//! raw measurement → [`classify`] → [`Signature`] → [`ModelMatcher`] →
//! [`MatchResult`] → [`resolve`] → [`Resolution`].

pub mod catalog;
pub mod legacy;
pub mod matcher;
pub mod resolution;
pub mod signature;

pub use catalog::{FieldOverride, ModelCatalog, ModelDefinition};
pub use matcher::{MatchKind, MatchResult, ModelMatcher};
pub use resolution::{Resolution, ResolutionBasis, resolve};
pub use signature::{Measurement, Signature, classify};
