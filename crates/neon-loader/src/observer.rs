//! Visibility observation with IntersectionObserver semantics.
//!
//! The observer keeps a registration table and, when asked to evaluate a
//! frame, reports every registered element whose intersection ratio with
//! the (margin-expanded) root reaches the threshold. Triggered elements are
//! removed from the table before they are returned, so an element can fire
//! at most once no matter how often it re-enters the look-ahead region.

use crate::dom::{DocumentAdapter, ElementId, Rect};
use std::collections::BTreeSet;

/// Observation parameters. `root: None` means the viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverOptions {
    pub root: Option<Rect>,
    pub root_margin: f64,
    pub threshold: f64,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            root: None,
            root_margin: 50.0,
            threshold: 0.1,
        }
    }
}

/// Visibility measurement for one element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    pub target: ElementId,
    pub is_intersecting: bool,
    pub ratio: f64,
}

/// Registration table plus trigger evaluation.
#[derive(Debug, Clone, Default)]
pub struct VisibilityObserver {
    options: ObserverOptions,
    targets: BTreeSet<ElementId>,
}

impl VisibilityObserver {
    pub fn new(options: ObserverOptions) -> Self {
        Self {
            options,
            targets: BTreeSet::new(),
        }
    }

    pub fn options(&self) -> &ObserverOptions {
        &self.options
    }

    /// Register an element. Returns `false` if it was already registered.
    pub fn observe(&mut self, target: ElementId) -> bool {
        self.targets.insert(target)
    }

    /// Deregister an element. Returns `false` if it was not registered.
    pub fn unobserve(&mut self, target: ElementId) -> bool {
        self.targets.remove(&target)
    }

    pub fn is_observed(&self, target: ElementId) -> bool {
        self.targets.contains(&target)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn disconnect(&mut self) {
        self.targets.clear();
    }

    /// Measure one element against the root bounds.
    pub fn measure(&self, target: ElementId, rect: Option<Rect>, viewport: Rect) -> IntersectionEntry {
        let root = self
            .options
            .root
            .unwrap_or(viewport)
            .expand(self.options.root_margin);

        let Some(rect) = rect else {
            return IntersectionEntry {
                target,
                is_intersecting: false,
                ratio: 0.0,
            };
        };

        match rect.intersection(&root) {
            Some(hit) => {
                let ratio = if rect.area() > 0.0 {
                    hit.area() / rect.area()
                } else {
                    // Zero-area targets count as fully visible when touching the root.
                    1.0
                };
                IntersectionEntry {
                    target,
                    is_intersecting: true,
                    ratio,
                }
            }
            None => IntersectionEntry {
                target,
                is_intersecting: false,
                ratio: 0.0,
            },
        }
    }

    /// Evaluate all registrations against the document's current viewport.
    ///
    /// Triggered elements are deregistered before being returned.
    pub fn take_triggered(&mut self, doc: &dyn DocumentAdapter) -> Vec<IntersectionEntry> {
        let viewport = doc.viewport();
        let triggered: Vec<IntersectionEntry> = self
            .targets
            .iter()
            .map(|id| self.measure(*id, doc.bounding_rect(*id), viewport))
            .filter(|e| e.is_intersecting && e.ratio >= self.options.threshold)
            .collect();

        for entry in &triggered {
            self.targets.remove(&entry.target);
        }
        triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::html::HtmlDocument;

    fn viewport() -> Rect {
        Rect::new(0.0, 0.0, 1000.0, 800.0)
    }

    #[test]
    fn test_measure_inside_margin() {
        let observer = VisibilityObserver::new(ObserverOptions::default());
        // Starts 40px below the viewport: inside the 50px look-ahead margin.
        let rect = Rect::new(0.0, 840.0, 300.0, 100.0);
        let entry = observer.measure(ElementId(1), Some(rect), viewport());
        assert!(entry.is_intersecting);
        assert!((entry.ratio - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_measure_outside_margin() {
        let observer = VisibilityObserver::new(ObserverOptions::default());
        let rect = Rect::new(0.0, 900.0, 300.0, 100.0);
        let entry = observer.measure(ElementId(1), Some(rect), viewport());
        assert!(!entry.is_intersecting);
        assert_eq!(entry.ratio, 0.0);
    }

    #[test]
    fn test_measure_unrendered() {
        let observer = VisibilityObserver::new(ObserverOptions::default());
        let entry = observer.measure(ElementId(1), None, viewport());
        assert!(!entry.is_intersecting);
    }

    #[test]
    fn test_measure_explicit_root() {
        let observer = VisibilityObserver::new(ObserverOptions {
            root: Some(Rect::new(0.0, 2000.0, 500.0, 500.0)),
            root_margin: 0.0,
            threshold: 0.5,
        });
        let entry = observer.measure(ElementId(1), Some(Rect::new(0.0, 2100.0, 100.0, 100.0)), viewport());
        assert_eq!(entry.ratio, 1.0);
    }

    #[test]
    fn test_below_threshold_does_not_trigger() {
        let mut doc = HtmlDocument::parse(r#"<img data-src="/a.jpg">"#).unwrap();
        let img = doc.select("img").unwrap()[0];
        doc.set_viewport(Rect::new(0.0, 0.0, 1000.0, 800.0));
        // 60px of a 1000px image lies inside the look-ahead region.
        doc.set_rect(img, Rect::new(0.0, 790.0, 300.0, 1000.0));

        let mut observer = VisibilityObserver::new(ObserverOptions::default());
        observer.observe(img);
        assert!(observer.take_triggered(&doc).is_empty());
        assert!(observer.is_observed(img));

        doc.scroll_to(100.0);
        let hits = observer.take_triggered(&doc);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].ratio - 0.16).abs() < 1e-9);
    }

    #[test]
    fn test_trigger_deregisters_once() {
        let mut doc = HtmlDocument::parse(r#"<img data-src="/a.jpg">"#).unwrap();
        let img = doc.select("img").unwrap()[0];

        let mut observer = VisibilityObserver::new(ObserverOptions::default());
        assert!(observer.observe(img));
        assert!(!observer.observe(img));

        let hits = observer.take_triggered(&doc);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target, img);
        assert!(!observer.is_observed(img));

        // Leaving and re-entering the region fires nothing further.
        doc.scroll_to(5000.0);
        assert!(observer.take_triggered(&doc).is_empty());
        doc.scroll_to(0.0);
        assert!(observer.take_triggered(&doc).is_empty());
    }

    #[test]
    fn test_unobserve_and_disconnect() {
        let mut observer = VisibilityObserver::new(ObserverOptions::default());
        observer.observe(ElementId(1));
        observer.observe(ElementId(2));
        assert!(observer.unobserve(ElementId(1)));
        assert!(!observer.unobserve(ElementId(1)));
        assert_eq!(observer.len(), 1);
        observer.disconnect();
        assert!(observer.is_empty());
    }
}
