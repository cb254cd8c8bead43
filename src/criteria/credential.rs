//! Credential criteria and their evaluators.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::registry::{EvaluableCriteriaRegistry, EvaluatorBinding};
use super::{CriteriaSet, Criterion, EvaluableCriterion};

const DEFAULT_MAPPINGS: &str = include_str!("../../resources/criteria-registry.properties");

/// How a credential's key may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageType {
    #[default]
    Unspecified,
    Signing,
    Encryption,
}

impl UsageType {
    /// Unspecified on either side matches anything
    pub fn matches(self, other: UsageType) -> bool {
        self == UsageType::Unspecified || other == UsageType::Unspecified || self == other
    }
}

impl fmt::Display for UsageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UsageType::Unspecified => "unspecified",
            UsageType::Signing => "signing",
            UsageType::Encryption => "encryption",
        };
        f.write_str(name)
    }
}

/// A candidate key credential
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub entity_id: Option<String>,
    pub usage: UsageType,
    pub key_algorithm: Option<String>,
    pub key_length: Option<u32>,
    #[serde(default)]
    pub key_names: Vec<String>,
}

impl Credential {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_usage(mut self, usage: UsageType) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_key(mut self, algorithm: impl Into<String>, length: u32) -> Self {
        self.key_algorithm = Some(algorithm.into());
        self.key_length = Some(length);
        self
    }

    pub fn with_key_name(mut self, name: impl Into<String>) -> Self {
        self.key_names.push(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityIdCriterion(pub String);

impl Criterion for EntityIdCriterion {
    const NAME: &'static str = "EntityIdCriterion";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageCriterion(pub UsageType);

impl Criterion for UsageCriterion {
    const NAME: &'static str = "UsageCriterion";
}

/// Key algorithm name, compared case-insensitively (`RSA`, `EC`, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAlgorithmCriterion(pub String);

impl Criterion for KeyAlgorithmCriterion {
    const NAME: &'static str = "KeyAlgorithmCriterion";
}

/// Exact key length in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLengthCriterion(pub u32);

impl Criterion for KeyLengthCriterion {
    const NAME: &'static str = "KeyLengthCriterion";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNameCriterion(pub String);

impl Criterion for KeyNameCriterion {
    const NAME: &'static str = "KeyNameCriterion";
}

struct EntityIdEvaluator(String);

impl EvaluableCriterion<Credential> for EntityIdEvaluator {
    fn evaluate(&self, credential: &Credential) -> Option<bool> {
        let entity_id = credential.entity_id.as_deref()?;
        Some(entity_id == self.0)
    }
}

struct UsageEvaluator(UsageType);

impl EvaluableCriterion<Credential> for UsageEvaluator {
    fn evaluate(&self, credential: &Credential) -> Option<bool> {
        Some(self.0.matches(credential.usage))
    }
}

struct KeyAlgorithmEvaluator(String);

impl EvaluableCriterion<Credential> for KeyAlgorithmEvaluator {
    fn evaluate(&self, credential: &Credential) -> Option<bool> {
        let algorithm = credential.key_algorithm.as_deref()?;
        Some(algorithm.eq_ignore_ascii_case(&self.0))
    }
}

struct KeyLengthEvaluator(u32);

impl EvaluableCriterion<Credential> for KeyLengthEvaluator {
    fn evaluate(&self, credential: &Credential) -> Option<bool> {
        Some(credential.key_length? == self.0)
    }
}

struct KeyNameEvaluator(String);

impl EvaluableCriterion<Credential> for KeyNameEvaluator {
    fn evaluate(&self, credential: &Credential) -> Option<bool> {
        if credential.key_names.is_empty() {
            return None;
        }
        Some(credential.key_names.iter().any(|name| *name == self.0))
    }
}

/// Named credential evaluators available to the properties resource
pub fn credential_evaluators() -> Vec<EvaluatorBinding<Credential>> {
    vec![
        EvaluatorBinding::new("EvaluableEntityIdCredentialCriterion", |c: &EntityIdCriterion| {
            Box::new(EntityIdEvaluator(c.0.clone())) as Box<dyn EvaluableCriterion<Credential>>
        }),
        EvaluatorBinding::new("EvaluableUsageCredentialCriterion", |c: &UsageCriterion| {
            Box::new(UsageEvaluator(c.0)) as Box<dyn EvaluableCriterion<Credential>>
        }),
        EvaluatorBinding::new("EvaluableKeyAlgorithmCredentialCriterion", |c: &KeyAlgorithmCriterion| {
            Box::new(KeyAlgorithmEvaluator(c.0.clone())) as Box<dyn EvaluableCriterion<Credential>>
        }),
        EvaluatorBinding::new("EvaluableKeyLengthCredentialCriterion", |c: &KeyLengthCriterion| {
            Box::new(KeyLengthEvaluator(c.0)) as Box<dyn EvaluableCriterion<Credential>>
        }),
        EvaluatorBinding::new("EvaluableKeyNameCredentialCriterion", |c: &KeyNameCriterion| {
            Box::new(KeyNameEvaluator(c.0.clone())) as Box<dyn EvaluableCriterion<Credential>>
        }),
    ]
}

/// A credential criteria registry loaded with the bundled mappings
pub fn credential_criteria_registry() -> EvaluableCriteriaRegistry<Credential> {
    let registry = EvaluableCriteriaRegistry::new();
    registry.load_properties(DEFAULT_MAPPINGS, &credential_evaluators());
    registry
}

/// Whether one candidate passes the criteria. `None` results never exclude:
/// with `satisfy_all` every opinion must be `true`, otherwise a single `true`
/// (or no opinion at all) is enough.
pub fn credential_matches(
    credential: &Credential,
    criteria: &CriteriaSet,
    registry: &EvaluableCriteriaRegistry<Credential>,
    satisfy_all: bool,
) -> bool {
    let opinions: Vec<bool> = registry
        .evaluate_set(criteria, credential)
        .into_iter()
        .filter_map(|(_, result)| result)
        .collect();
    if opinions.is_empty() {
        return true;
    }
    if satisfy_all {
        opinions.iter().all(|&ok| ok)
    } else {
        opinions.iter().any(|&ok| ok)
    }
}

/// The candidates that pass the criteria, in their original order
pub fn filter_credentials<'c>(
    candidates: &'c [Credential],
    criteria: &CriteriaSet,
    registry: &EvaluableCriteriaRegistry<Credential>,
    satisfy_all: bool,
) -> Vec<&'c Credential> {
    candidates
        .iter()
        .filter(|credential| credential_matches(credential, criteria, registry, satisfy_all))
        .collect()
}
