//! Registry mapping criterion types to evaluator factories.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{AnyCriterion, CriteriaSet, Criterion, EvaluableCriterion};

type ErasedFactory<T> = Arc<dyn Fn(&dyn Any) -> Option<Box<dyn EvaluableCriterion<T>>> + Send + Sync>;

fn erase<T, C, F>(factory: F) -> ErasedFactory<T>
where
    T: ?Sized + 'static,
    C: Criterion,
    F: Fn(&C) -> Box<dyn EvaluableCriterion<T>> + Send + Sync + 'static,
{
    Arc::new(move |criterion: &dyn Any| criterion.downcast_ref::<C>().map(&factory))
}

struct Entry<T: ?Sized> {
    criterion: &'static str,
    factory: ErasedFactory<T>,
}

impl<T: ?Sized> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            criterion: self.criterion,
            factory: Arc::clone(&self.factory),
        }
    }
}

/// A named evaluator factory that configuration resources can refer to
pub struct EvaluatorBinding<T: ?Sized> {
    criterion: &'static str,
    evaluator: &'static str,
    type_id: TypeId,
    factory: ErasedFactory<T>,
}

impl<T: ?Sized + 'static> EvaluatorBinding<T> {
    pub fn new<C, F>(evaluator: &'static str, factory: F) -> Self
    where
        C: Criterion,
        F: Fn(&C) -> Box<dyn EvaluableCriterion<T>> + Send + Sync + 'static,
    {
        Self {
            criterion: C::NAME,
            evaluator,
            type_id: TypeId::of::<C>(),
            factory: erase(factory),
        }
    }

    pub fn criterion(&self) -> &'static str {
        self.criterion
    }

    pub fn evaluator(&self) -> &'static str {
        self.evaluator
    }
}

impl<T: ?Sized> fmt::Debug for EvaluatorBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluatorBinding")
            .field("criterion", &self.criterion)
            .field("evaluator", &self.evaluator)
            .finish()
    }
}

/// Maps criterion types to the factories that build their evaluators for
/// targets of type `T`.
///
/// A criterion without a registered evaluator evaluates to `None`.
pub struct EvaluableCriteriaRegistry<T: ?Sized> {
    evaluators: RwLock<HashMap<TypeId, Entry<T>>>,
}

impl<T: ?Sized + 'static> EvaluableCriteriaRegistry<T> {
    pub fn new() -> Self {
        Self {
            evaluators: RwLock::new(HashMap::new()),
        }
    }

    /// Register the evaluator factory for criterion type `C`, replacing any existing one
    pub fn register_evaluator<C, F>(&self, factory: F)
    where
        C: Criterion,
        F: Fn(&C) -> Box<dyn EvaluableCriterion<T>> + Send + Sync + 'static,
    {
        debug!(criterion = C::NAME, "Registering criterion evaluator");
        self.evaluators.write().insert(
            TypeId::of::<C>(),
            Entry {
                criterion: C::NAME,
                factory: erase(factory),
            },
        );
    }

    pub fn deregister<C: Criterion>(&self) -> bool {
        self.evaluators.write().remove(&TypeId::of::<C>()).is_some()
    }

    pub fn clear(&self) {
        self.evaluators.write().clear();
    }

    pub fn has_evaluator<C: Criterion>(&self) -> bool {
        self.evaluators.read().contains_key(&TypeId::of::<C>())
    }

    pub fn len(&self) -> usize {
        self.evaluators.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.read().is_empty()
    }

    /// Names of the criteria with a registered evaluator, sorted
    pub fn registered_criteria(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.evaluators.read().values().map(|e| e.criterion).collect();
        names.sort_unstable();
        names
    }

    /// Build the evaluator for a criterion
    pub fn evaluator_for<C: Criterion>(&self, criterion: &C) -> Option<Box<dyn EvaluableCriterion<T>>> {
        self.evaluator_for_any(criterion)
    }

    /// Build the evaluator for a type-erased criterion, as held by a `CriteriaSet`
    pub fn evaluator_for_any(&self, criterion: &dyn AnyCriterion) -> Option<Box<dyn EvaluableCriterion<T>>> {
        let any = criterion.as_any();
        let entry = self.evaluators.read().get(&any.type_id()).cloned()?;
        (entry.factory)(any)
    }

    /// Evaluate one criterion; `None` when no evaluator is registered or the
    /// evaluator has no opinion
    pub fn evaluate<C: Criterion>(&self, criterion: &C, target: &T) -> Option<bool> {
        self.evaluator_for(criterion)?.evaluate(target)
    }

    /// Evaluate every criterion of a set that has an evaluator
    pub fn evaluate_set(&self, criteria: &CriteriaSet, target: &T) -> Vec<(&'static str, Option<bool>)> {
        criteria
            .iter()
            .map(|criterion| {
                let result = self
                    .evaluator_for_any(criterion)
                    .and_then(|evaluator| evaluator.evaluate(target));
                (criterion.criterion_name(), result)
            })
            .collect()
    }

    /// Register the mappings of a properties resource (`Criterion = Evaluator`
    /// lines, `#`/`!` comments) against a catalog of named evaluators.
    /// Malformed or unknown entries are logged and skipped. Returns the number
    /// of evaluators registered.
    pub fn load_properties(&self, properties: &str, catalog: &[EvaluatorBinding<T>]) -> usize {
        let mut loaded = 0;
        for (index, raw) in properties.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some((criterion, evaluator)) = line.split_once(['=', ':']) else {
                warn!(line = index + 1, entry = line, "Skipping malformed criteria registry entry");
                continue;
            };
            let (criterion, evaluator) = (criterion.trim(), evaluator.trim());
            if criterion.is_empty() || evaluator.is_empty() {
                warn!(line = index + 1, entry = line, "Skipping malformed criteria registry entry");
                continue;
            }
            let binding = catalog
                .iter()
                .find(|b| b.criterion == criterion && b.evaluator == evaluator);
            match binding {
                Some(binding) => {
                    self.evaluators.write().insert(
                        binding.type_id,
                        Entry {
                            criterion: binding.criterion,
                            factory: Arc::clone(&binding.factory),
                        },
                    );
                    loaded += 1;
                }
                None => warn!(
                    line = index + 1,
                    criterion,
                    evaluator,
                    "Skipping criteria registry entry with no known evaluator"
                ),
            }
        }
        debug!(loaded, "Loaded criteria registry mappings");
        loaded
    }
}

impl<T: ?Sized + 'static> Default for EvaluableCriteriaRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + 'static> fmt::Debug for EvaluableCriteriaRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluableCriteriaRegistry")
            .field("criteria", &self.registered_criteria())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct MinLength(usize);

    impl Criterion for MinLength {
        const NAME: &'static str = "MinLength";
    }

    #[derive(Debug)]
    struct Prefix(&'static str);

    impl Criterion for Prefix {
        const NAME: &'static str = "Prefix";
    }

    fn min_length(criterion: &MinLength) -> Box<dyn EvaluableCriterion<str>> {
        let min = criterion.0;
        Box::new(move |s: &str| Some(s.len() >= min))
    }

    fn catalog() -> Vec<EvaluatorBinding<str>> {
        vec![
            EvaluatorBinding::new("MinLengthEvaluator", min_length),
            EvaluatorBinding::new("PrefixEvaluator", |criterion: &Prefix| {
                let prefix = criterion.0;
                Box::new(move |s: &str| (!s.is_empty()).then(|| s.starts_with(prefix)))
                    as Box<dyn EvaluableCriterion<str>>
            }),
        ]
    }

    #[test]
    fn test_unregistered_criterion_has_no_opinion() {
        let registry = EvaluableCriteriaRegistry::<str>::new();
        assert_eq!(registry.evaluate(&MinLength(3), "abcd"), None);
    }

    #[test]
    fn test_register_and_deregister() {
        let registry = EvaluableCriteriaRegistry::<str>::new();
        registry.register_evaluator(min_length);
        assert!(registry.has_evaluator::<MinLength>());
        assert_eq!(registry.evaluate(&MinLength(3), "abcd"), Some(true));
        assert_eq!(registry.evaluate(&MinLength(5), "abcd"), Some(false));

        assert!(registry.deregister::<MinLength>());
        assert_eq!(registry.evaluate(&MinLength(3), "abcd"), None);
    }

    #[test]
    fn test_evaluate_set_reports_each_criterion() {
        let registry = EvaluableCriteriaRegistry::<str>::new();
        registry.register_evaluator(min_length);
        let criteria = CriteriaSet::new().with(MinLength(2)).with(Prefix("x"));

        let mut results = registry.evaluate_set(&criteria, "abc");
        results.sort();
        assert_eq!(results, vec![("MinLength", Some(true)), ("Prefix", None)]);
    }

    #[test]
    fn test_load_properties_skips_bad_entries() {
        let registry = EvaluableCriteriaRegistry::<str>::new();
        let properties = "\
# comment
! another comment

MinLength = MinLengthEvaluator
Prefix: PrefixEvaluator
Unknown = SomethingElse
MinLength = WrongEvaluator
no separator here
 = Empty
";
        assert_eq!(registry.load_properties(properties, &catalog()), 2);
        assert_eq!(registry.registered_criteria(), vec!["MinLength", "Prefix"]);
        assert_eq!(registry.evaluate(&Prefix("a"), "abc"), Some(true));
        assert_eq!(registry.evaluate(&Prefix("a"), ""), None);

        registry.clear();
        assert!(registry.is_empty());
    }
}
