//! Criteria and their evaluation
//!
//! A criterion is a typed input to a resolver, such as "the key must be 2048
//! bits". Criteria are collected in a `CriteriaSet` (at most one per type) and
//! evaluated against candidates through an `EvaluableCriteriaRegistry`, which
//! maps each criterion type to a factory producing its evaluator.

pub mod credential;
pub mod registry;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

pub use credential::{
    Credential, EntityIdCriterion, KeyAlgorithmCriterion, KeyLengthCriterion, KeyNameCriterion,
    UsageCriterion, UsageType, credential_criteria_registry, credential_evaluators, credential_matches,
    filter_credentials,
};
pub use registry::{EvaluableCriteriaRegistry, EvaluatorBinding};

/// A typed predicate input
pub trait Criterion: fmt::Debug + Send + Sync + 'static {
    /// Name used by registry configuration resources
    const NAME: &'static str;
}

/// Evaluates one criterion against a target.
///
/// `None` means "no opinion": the target lacks whatever the criterion tests.
/// Callers must not treat it as `Some(false)`.
pub trait EvaluableCriterion<T: ?Sized>: Send + Sync {
    fn evaluate(&self, target: &T) -> Option<bool>;
}

impl<T: ?Sized, F> EvaluableCriterion<T> for F
where
    F: Fn(&T) -> Option<bool> + Send + Sync,
{
    fn evaluate(&self, target: &T) -> Option<bool> {
        self(target)
    }
}

/// Type-erased criterion stored in a `CriteriaSet`
pub trait AnyCriterion: fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn criterion_name(&self) -> &'static str;
}

impl<C: Criterion> AnyCriterion for C {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn criterion_name(&self) -> &'static str {
        C::NAME
    }
}

/// Criteria keyed by their type
#[derive(Debug, Default)]
pub struct CriteriaSet {
    criteria: HashMap<TypeId, Box<dyn AnyCriterion>>,
}

impl CriteriaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a criterion, returning true if it replaced one of the same type
    pub fn add<C: Criterion>(&mut self, criterion: C) -> bool {
        self.criteria
            .insert(TypeId::of::<C>(), Box::new(criterion))
            .is_some()
    }

    pub fn with<C: Criterion>(mut self, criterion: C) -> Self {
        self.add(criterion);
        self
    }

    pub fn get<C: Criterion>(&self) -> Option<&C> {
        self.criteria
            .get(&TypeId::of::<C>())
            .and_then(|c| c.as_any().downcast_ref::<C>())
    }

    pub fn contains<C: Criterion>(&self) -> bool {
        self.criteria.contains_key(&TypeId::of::<C>())
    }

    pub fn remove<C: Criterion>(&mut self) -> bool {
        self.criteria.remove(&TypeId::of::<C>()).is_some()
    }

    pub fn clear(&mut self) {
        self.criteria.clear();
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn AnyCriterion> + '_ {
        self.criteria.values().map(|c| c.as_ref())
    }

    /// Names of the criteria present, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.iter().map(|c| c.criterion_name()).collect();
        names.sort_unstable();
        names
    }
}
