//! Loading strategies, chosen once when the loader initializes.
//!
//! `ObservedStrategy` defers each element until it reaches the look-ahead
//! region. `ImmediateStrategy` is the fallback for hosts without visibility
//! observation: every element is loaded as soon as it is enrolled.

use crate::dom::{DocumentAdapter, ElementId};
use crate::observer::{ObserverOptions, VisibilityObserver};

/// What the loader should do with a freshly enrolled element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enrollment {
    /// Wait for a visibility trigger.
    Deferred,
    /// Load right away.
    Immediate,
}

pub trait LoadStrategy {
    fn name(&self) -> &'static str;

    /// Whether enrolled elements wait behind a placeholder.
    fn defers(&self) -> bool;

    fn enroll(&mut self, id: ElementId) -> Enrollment;

    /// Remove an element from observation. Returns `true` if it was enrolled.
    fn withdraw(&mut self, id: ElementId) -> bool;

    fn is_enrolled(&self, id: ElementId) -> bool;

    /// Elements that should start loading now. Each is withdrawn before it
    /// is returned.
    fn collect_triggers(&mut self, doc: &dyn DocumentAdapter) -> Vec<ElementId>;
}

/// Pick the strategy for this host.
pub fn select(doc: &dyn DocumentAdapter, options: ObserverOptions) -> Box<dyn LoadStrategy> {
    if doc.supports_visibility_observation() {
        Box::new(ObservedStrategy::new(options))
    } else {
        Box::new(ImmediateStrategy)
    }
}

pub struct ObservedStrategy {
    observer: VisibilityObserver,
}

impl ObservedStrategy {
    pub fn new(options: ObserverOptions) -> Self {
        Self {
            observer: VisibilityObserver::new(options),
        }
    }
}

impl LoadStrategy for ObservedStrategy {
    fn name(&self) -> &'static str {
        "observed"
    }

    fn defers(&self) -> bool {
        true
    }

    fn enroll(&mut self, id: ElementId) -> Enrollment {
        self.observer.observe(id);
        Enrollment::Deferred
    }

    fn withdraw(&mut self, id: ElementId) -> bool {
        self.observer.unobserve(id)
    }

    fn is_enrolled(&self, id: ElementId) -> bool {
        self.observer.is_observed(id)
    }

    fn collect_triggers(&mut self, doc: &dyn DocumentAdapter) -> Vec<ElementId> {
        self.observer
            .take_triggered(doc)
            .into_iter()
            .map(|entry| entry.target)
            .collect()
    }
}

pub struct ImmediateStrategy;

impl LoadStrategy for ImmediateStrategy {
    fn name(&self) -> &'static str {
        "immediate"
    }

    fn defers(&self) -> bool {
        false
    }

    fn enroll(&mut self, _id: ElementId) -> Enrollment {
        Enrollment::Immediate
    }

    fn withdraw(&mut self, _id: ElementId) -> bool {
        false
    }

    fn is_enrolled(&self, _id: ElementId) -> bool {
        false
    }

    fn collect_triggers(&mut self, _doc: &dyn DocumentAdapter) -> Vec<ElementId> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::html::HtmlDocument;

    #[test]
    fn test_select_by_capability() {
        let mut doc = HtmlDocument::parse("<p>hi</p>").unwrap();
        assert_eq!(select(&doc, ObserverOptions::default()).name(), "observed");
        doc.set_observation_supported(false);
        assert_eq!(select(&doc, ObserverOptions::default()).name(), "immediate");
    }

    #[test]
    fn test_observed_enroll_and_withdraw() {
        let mut strategy = ObservedStrategy::new(ObserverOptions::default());
        assert_eq!(strategy.enroll(ElementId(3)), Enrollment::Deferred);
        assert!(strategy.is_enrolled(ElementId(3)));
        assert!(strategy.withdraw(ElementId(3)));
        assert!(!strategy.withdraw(ElementId(3)));
    }

    #[test]
    fn test_immediate_never_enrolls() {
        let doc = HtmlDocument::parse(r#"<img data-src="/a.jpg">"#).unwrap();
        let mut strategy = ImmediateStrategy;
        assert_eq!(strategy.enroll(ElementId(3)), Enrollment::Immediate);
        assert!(!strategy.is_enrolled(ElementId(3)));
        assert!(strategy.collect_triggers(&doc).is_empty());
    }
}
