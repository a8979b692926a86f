//! Lazy asset groups: widgets whose "resource" is an initialization routine.

use crate::dom::{DocumentAdapter, ElementId};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of deferred widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Chart,
    Carousel,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Chart => f.write_str("chart"),
            AssetKind::Carousel => f.write_str("carousel"),
        }
    }
}

/// Runs the one-time setup of a widget once it becomes visible.
pub trait AssetInitializer {
    fn initialize(
        &self,
        doc: &mut dyn DocumentAdapter,
        id: ElementId,
        kind: AssetKind,
    ) -> Result<()>;
}

/// Marks the widget as initialized, recording its kind and (for charts)
/// the declared chart type. Stands in for the real widget constructors
/// when running outside a browser.
#[derive(Debug, Clone, Default)]
pub struct MarkerInitializer {
    chart_attr: String,
}

impl MarkerInitializer {
    pub fn new(chart_attr: &str) -> Self {
        Self {
            chart_attr: chart_attr.to_string(),
        }
    }
}

impl AssetInitializer for MarkerInitializer {
    fn initialize(
        &self,
        doc: &mut dyn DocumentAdapter,
        id: ElementId,
        kind: AssetKind,
    ) -> Result<()> {
        let label = match kind {
            AssetKind::Chart => {
                let chart_type = doc
                    .attribute(id, &self.chart_attr)
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| "default".to_string());
                format!("chart:{chart_type}")
            }
            AssetKind::Carousel => "carousel".to_string(),
        };
        doc.set_attribute(id, "data-initialized", &label);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::html::HtmlDocument;

    #[test]
    fn test_marker_initializer() {
        let mut doc = HtmlDocument::parse(
            r#"<div data-lazy-chart="line"></div><div class="carousel"></div><div data-lazy-chart=""></div>"#,
        )
        .unwrap();
        let charts = doc.select("[data-lazy-chart]").unwrap();
        let carousel = doc.select(".carousel").unwrap()[0];

        let init = MarkerInitializer::new("data-lazy-chart");
        init.initialize(&mut doc, charts[0], AssetKind::Chart).unwrap();
        init.initialize(&mut doc, charts[1], AssetKind::Chart).unwrap();
        init.initialize(&mut doc, carousel, AssetKind::Carousel).unwrap();

        assert_eq!(doc.attribute(charts[0], "data-initialized").as_deref(), Some("chart:line"));
        assert_eq!(doc.attribute(charts[1], "data-initialized").as_deref(), Some("chart:default"));
        assert_eq!(doc.attribute(carousel, "data-initialized").as_deref(), Some("carousel"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(AssetKind::Chart.to_string(), "chart");
        assert_eq!(AssetKind::Carousel.to_string(), "carousel");
    }
}
