//! FilterModule (§4.3): evaluates a combinator over a list of predicates
//! and either re-emits the input element unchanged or emits nothing.

use super::Processor;
use crate::element::{Schema, StreamElement};
use crate::error::AnalyticsError;
use crate::state::StateBackend;

#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(Schema, String),
    NotEq(Schema, String),
    In(Schema, Vec<String>),
}

impl Predicate {
    fn evaluate(&self, element: &StreamElement) -> Result<bool, AnalyticsError> {
        match self {
            Predicate::Eq(schema, expected) => Ok(schema.apply(element)?.render() == *expected),
            Predicate::NotEq(schema, expected) => Ok(schema.apply(element)?.render() != *expected),
            Predicate::In(schema, candidates) => {
                let rendered = schema.apply(element)?.render();
                Ok(candidates.iter().any(|c| *c == rendered))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

#[derive(Debug)]
pub struct FilterModule {
    name: String,
    predicates: Vec<Predicate>,
    combinator: Combinator,
}

impl FilterModule {
    pub fn new(name: impl Into<String>, predicates: Vec<Predicate>, combinator: Combinator) -> Self {
        Self { name: name.into(), predicates, combinator }
    }
}

impl Processor for FilterModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, _backend: &mut StateBackend, element: &StreamElement) -> Result<Vec<StreamElement>, AnalyticsError> {
        let mut evaluated = Vec::with_capacity(self.predicates.len());
        for predicate in &self.predicates {
            evaluated.push(predicate.evaluate(element)?);
        }
        let holds = match self.combinator {
            Combinator::And => evaluated.iter().all(|b| *b),
            Combinator::Or => evaluated.iter().any(|b| *b),
        };
        if holds {
            Ok(vec![element.clone()])
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::StreamCategory;

    fn ball_element(stream: &str) -> StreamElement {
        StreamElement::new(stream, StreamCategory::State, "m1", 1000)
    }

    #[test]
    fn and_requires_every_predicate() {
        let mut backend = StateBackend::new();
        let filter = FilterModule::new(
            "ballOnly",
            vec![
                Predicate::Eq(Schema::StreamName, "fieldObjectState".to_string()),
                Predicate::Eq(Schema::Key, "m1".to_string()),
            ],
            Combinator::And,
        );
        let matching = ball_element("fieldObjectState");
        assert_eq!(filter.process(&mut backend, &matching).unwrap(), vec![matching]);

        let other_stream = ball_element("kickEvent");
        assert!(filter.process(&mut backend, &other_stream).unwrap().is_empty());
    }

    #[test]
    fn or_requires_any_predicate() {
        let mut backend = StateBackend::new();
        let filter = FilterModule::new(
            "passOrShot",
            vec![
                Predicate::Eq(Schema::StreamName, "successfulPassEvent".to_string()),
                Predicate::Eq(Schema::StreamName, "shotOffTargetEvent".to_string()),
            ],
            Combinator::Or,
        );
        assert!(!filter.process(&mut backend, &ball_element("successfulPassEvent")).unwrap().is_empty());
        assert!(!filter.process(&mut backend, &ball_element("shotOffTargetEvent")).unwrap().is_empty());
        assert!(filter.process(&mut backend, &ball_element("kickEvent")).unwrap().is_empty());
    }

    #[test]
    fn in_predicate_matches_a_set() {
        let mut backend = StateBackend::new();
        let filter = FilterModule::new(
            "goalAreas",
            vec![Predicate::In(Schema::StreamName, vec!["leftGoal".to_string(), "rightGoal".to_string()])],
            Combinator::And,
        );
        assert!(!filter.process(&mut backend, &ball_element("leftGoal")).unwrap().is_empty());
        assert!(filter.process(&mut backend, &ball_element("sideLine")).unwrap().is_empty());
    }

    #[test]
    fn schema_apply_error_propagates_and_drops_element() {
        let mut backend = StateBackend::new();
        let filter = FilterModule::new("broken", vec![Predicate::Eq(Schema::Phase, "START".to_string())], Combinator::And);
        let atomic = ball_element("fieldObjectState");
        assert!(matches!(filter.process(&mut backend, &atomic), Err(AnalyticsError::NotNonAtomic)));
    }
}
