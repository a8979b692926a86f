//! Document adapter abstraction.
//!
//! The loader never touches a concrete DOM. Everything it needs (selecting
//! nodes, reading and writing attributes, geometry, style injection and
//! paint-frame requests) goes through [`DocumentAdapter`], so the core can
//! run against a real page binding or the in-memory [`html::HtmlDocument`].

pub mod html;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to an element, stable for the lifetime of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub usize);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Axis-aligned box in CSS pixels, document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Grow the box by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Rect {
        Rect::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    /// Intersection of two boxes. Edge-adjacent boxes yield a zero-area
    /// rectangle rather than `None`.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right < left || bottom < top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

/// Operations the loader needs from a rendered document.
pub trait DocumentAdapter {
    /// Whether the host can deliver visibility notifications.
    fn supports_visibility_observation(&self) -> bool;

    /// All elements matching a CSS selector, in document order.
    fn select(&self, selector: &str) -> Result<Vec<ElementId>>;

    /// Lower-case tag name of an element.
    fn tag_name(&self, id: ElementId) -> Option<String>;

    fn attribute(&self, id: ElementId, name: &str) -> Option<String>;

    fn set_attribute(&mut self, id: ElementId, name: &str, value: &str);

    fn remove_attribute(&mut self, id: ElementId, name: &str);

    /// Layout box of the element, `None` when it is not rendered.
    fn bounding_rect(&self, id: ElementId) -> Option<Rect>;

    /// Currently visible region of the document.
    fn viewport(&self) -> Rect;

    /// Append a `<style>` block with the given id to the document head.
    fn append_style_block(&mut self, block_id: &str, css: &str);

    /// Ask the host to run the next paint-frame callback.
    fn request_animation_frame(&mut self);

    fn has_attribute(&self, id: ElementId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    fn has_class(&self, id: ElementId, class: &str) -> bool {
        self.attribute(id, "class")
            .map(|c| c.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    fn add_class(&mut self, id: ElementId, class: &str) {
        if self.has_class(id, class) {
            return;
        }
        let classes = match self.attribute(id, "class") {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{} {class}", existing.trim())
            }
            _ => class.to_string(),
        };
        self.set_attribute(id, "class", &classes);
    }

    fn remove_class(&mut self, id: ElementId, class: &str) {
        let Some(existing) = self.attribute(id, "class") else {
            return;
        };
        let kept: Vec<&str> = existing
            .split_whitespace()
            .filter(|c| *c != class)
            .collect();
        self.set_attribute(id, "class", &kept.join(" "));
    }

    /// Read one property from the inline `style` attribute.
    fn style_property(&self, id: ElementId, property: &str) -> Option<String> {
        let style = self.attribute(id, "style")?;
        parse_inline_style(&style)
            .into_iter()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v)
    }

    /// Set one property of the inline `style` attribute, keeping the others.
    fn set_style_property(&mut self, id: ElementId, property: &str, value: &str) {
        let mut decls = self
            .attribute(id, "style")
            .map(|s| parse_inline_style(&s))
            .unwrap_or_default();
        match decls.iter_mut().find(|(k, _)| k == property) {
            Some(decl) => decl.1 = value.to_string(),
            None => decls.push((property.to_string(), value.to_string())),
        }
        let style = decls
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("; ");
        self.set_attribute(id, "style", &style);
    }
}

fn parse_inline_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let k = k.trim();
            if k.is_empty() {
                return None;
            }
            Some((k.to_ascii_lowercase(), v.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(50.0, 50.0, 100.0, 100.0);
        let i = a.intersection(&b).unwrap();
        assert_eq!(i, Rect::new(50.0, 50.0, 50.0, 50.0));
        assert_eq!(i.area(), 2500.0);
    }

    #[test]
    fn test_rect_edge_adjacent_is_zero_area() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(0.0, 100.0, 100.0, 100.0);
        let i = a.intersection(&b).unwrap();
        assert_eq!(i.area(), 0.0);

        let c = Rect::new(0.0, 101.0, 10.0, 10.0);
        assert!(a.intersection(&c).is_none());
    }

    #[test]
    fn test_rect_expand() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0).expand(50.0);
        assert_eq!(r, Rect::new(-50.0, -50.0, 110.0, 110.0));
    }

    #[test]
    fn test_parse_inline_style() {
        let decls = parse_inline_style("opacity: 0; Transition: opacity 300ms ease;;");
        assert_eq!(
            decls,
            vec![
                ("opacity".to_string(), "0".to_string()),
                ("transition".to_string(), "opacity 300ms ease".to_string()),
            ]
        );
    }
}
