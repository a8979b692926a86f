//! In-memory document adapter backed by `scraper`.
//!
//! Parses a page once into a mutable element table. Selectors are evaluated
//! against the *current* attribute state: the table is re-serialized with a
//! node marker attribute, re-parsed, and matches are mapped back to ids.
//! Layout is a simple vertical flow of media boxes, enough to drive
//! visibility decisions while scrolling.

use super::{DocumentAdapter, ElementId, Rect};
use crate::error::{LoaderError, Result};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Attribute carrying the table index while matching selectors.
const NODE_MARKER: &str = "data-neon-node";

/// Media elements that always get their own layout box.
pub const MEDIA_BOX_SELECTOR: &str = "img, picture, video, iframe, canvas";

/// Media plus the default chart and carousel markers.
pub const DEFAULT_BOX_SELECTOR: &str =
    "img, picture, video, iframe, canvas, [data-lazy-chart], .carousel";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "noscript"];

const DEFAULT_BOX_WIDTH: f64 = 300.0;
const DEFAULT_BOX_HEIGHT: f64 = 200.0;
const BOX_GAP: f64 = 16.0;

#[derive(Debug, Clone)]
enum Child {
    Element(usize),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: Vec<(String, String)>,
    parent: Option<usize>,
    children: Vec<Child>,
}

/// A parsed page the loader can run against without a browser.
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    nodes: Vec<Node>,
    rects: Vec<Option<Rect>>,
    viewport: Rect,
    observation_supported: bool,
    frame_requests: usize,
}

impl HtmlDocument {
    /// Parse a page using the default layout boxes.
    pub fn parse(source: &str) -> Result<Self> {
        Self::parse_with_boxes(source, DEFAULT_BOX_SELECTOR)
    }

    /// Parse a page, laying out every element matching `box_selector`.
    pub fn parse_with_boxes(source: &str, box_selector: &str) -> Result<Self> {
        let html = Html::parse_document(source);
        let mut nodes = Vec::new();
        collect_node(html.root_element(), None, &mut nodes);

        let mut doc = Self {
            rects: vec![None; nodes.len()],
            nodes,
            viewport: Rect::new(0.0, 0.0, 1280.0, 800.0),
            observation_supported: true,
            frame_requests: 0,
        };
        doc.relayout(box_selector)?;
        Ok(doc)
    }

    /// Recompute the vertical flow layout.
    pub fn relayout(&mut self, box_selector: &str) -> Result<()> {
        let boxed: HashSet<usize> = self.select(box_selector)?.into_iter().map(|id| id.0).collect();
        let mut rects = vec![None; self.nodes.len()];
        let mut cursor = 0.0;

        // Node indices are in pre-order, so ancestors are always laid out first.
        for idx in 0..self.nodes.len() {
            if let Some(anc) = self.boxed_ancestor(idx, &boxed) {
                rects[idx] = rects[anc];
                continue;
            }
            if !boxed.contains(&idx) {
                continue;
            }
            let (width, height) = self.declared_box(idx);
            rects[idx] = Some(Rect::new(0.0, cursor, width, height));
            cursor += height + BOX_GAP;
        }

        self.rects = rects;
        Ok(())
    }

    /// Override the layout box of a single element.
    pub fn set_rect(&mut self, id: ElementId, rect: Rect) {
        if let Some(slot) = self.rects.get_mut(id.0) {
            *slot = Some(rect);
        }
    }

    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }

    /// Scroll vertically so the viewport starts at `y`.
    pub fn scroll_to(&mut self, y: f64) {
        self.viewport.y = y;
    }

    /// Simulate a host without visibility observation support.
    pub fn set_observation_supported(&mut self, supported: bool) {
        self.observation_supported = supported;
    }

    /// Number of paint frames requested so far.
    pub fn frame_requests(&self) -> usize {
        self.frame_requests
    }

    /// Total height of the laid-out content.
    pub fn content_height(&self) -> f64 {
        self.rects
            .iter()
            .flatten()
            .map(|r| r.bottom())
            .fold(0.0, f64::max)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serialize the current state back to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<!DOCTYPE html>");
        if !self.nodes.is_empty() {
            self.write_node(0, false, &mut out);
        }
        out
    }

    fn write_node(&self, idx: usize, with_marker: bool, out: &mut String) {
        let node = &self.nodes[idx];
        out.push('<');
        out.push_str(&node.tag);
        for (name, value) in &node.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        if with_marker {
            out.push_str(&format!(" {NODE_MARKER}=\"{idx}\""));
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&node.tag.as_str()) {
            return;
        }

        let raw = RAW_TEXT_ELEMENTS.contains(&node.tag.as_str());
        for child in &node.children {
            match child {
                Child::Element(c) => self.write_node(*c, with_marker, out),
                Child::Text(t) if raw => out.push_str(t),
                Child::Text(t) => out.push_str(&escape_text(t)),
            }
        }

        out.push_str("</");
        out.push_str(&node.tag);
        out.push('>');
    }

    fn boxed_ancestor(&self, idx: usize, boxed: &HashSet<usize>) -> Option<usize> {
        let mut cur = self.nodes[idx].parent;
        while let Some(p) = cur {
            if boxed.contains(&p) {
                return Some(p);
            }
            cur = self.nodes[p].parent;
        }
        None
    }

    /// Declared width/height of a box, falling back to the first `img`
    /// descendant and then to 300x200.
    fn declared_box(&self, idx: usize) -> (f64, f64) {
        let own = self.dimensions(idx);
        let nested = self.first_descendant(idx, "img").map(|d| self.dimensions(d));
        let width = own
            .0
            .or(nested.and_then(|d| d.0))
            .unwrap_or(DEFAULT_BOX_WIDTH);
        let height = own
            .1
            .or(nested.and_then(|d| d.1))
            .unwrap_or(DEFAULT_BOX_HEIGHT);
        (width, height)
    }

    fn dimensions(&self, idx: usize) -> (Option<f64>, Option<f64>) {
        let read = |name: &str| {
            self.raw_attr(idx, name)
                .and_then(|v| v.trim().trim_end_matches("px").parse::<f64>().ok())
                .filter(|v| *v > 0.0)
        };
        (read("width"), read("height"))
    }

    fn first_descendant(&self, idx: usize, tag: &str) -> Option<usize> {
        for child in &self.nodes[idx].children {
            if let Child::Element(c) = child {
                if self.nodes[*c].tag == tag {
                    return Some(*c);
                }
                if let Some(found) = self.first_descendant(*c, tag) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn raw_attr(&self, idx: usize, name: &str) -> Option<&str> {
        self.nodes
            .get(idx)?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn head(&self) -> Option<usize> {
        self.nodes.iter().position(|n| n.tag == "head")
    }
}

impl DocumentAdapter for HtmlDocument {
    fn supports_visibility_observation(&self) -> bool {
        self.observation_supported
    }

    fn select(&self, selector: &str) -> Result<Vec<ElementId>> {
        let parsed = Selector::parse(selector)
            .map_err(|e| LoaderError::InvalidSelector(format!("{selector}: {e:?}")))?;
        if self.nodes.is_empty() {
            return Ok(Vec::new());
        }

        let mut marked = String::from("<!DOCTYPE html>");
        self.write_node(0, true, &mut marked);
        let snapshot = Html::parse_document(&marked);

        let ids = snapshot
            .select(&parsed)
            .filter_map(|el| el.value().attr(NODE_MARKER))
            .filter_map(|v| v.parse::<usize>().ok())
            .map(ElementId)
            .collect();
        Ok(ids)
    }

    fn tag_name(&self, id: ElementId) -> Option<String> {
        self.nodes.get(id.0).map(|n| n.tag.clone())
    }

    fn attribute(&self, id: ElementId, name: &str) -> Option<String> {
        self.raw_attr(id.0, name).map(str::to_string)
    }

    fn set_attribute(&mut self, id: ElementId, name: &str, value: &str) {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return;
        };
        match node.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(attr) => attr.1 = value.to_string(),
            None => node.attrs.push((name.to_string(), value.to_string())),
        }
    }

    fn remove_attribute(&mut self, id: ElementId, name: &str) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.attrs.retain(|(k, _)| k != name);
        }
    }

    fn bounding_rect(&self, id: ElementId) -> Option<Rect> {
        self.rects.get(id.0).copied().flatten()
    }

    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn append_style_block(&mut self, block_id: &str, css: &str) {
        let Some(head) = self.head() else {
            return;
        };
        let idx = self.nodes.len();
        self.nodes.push(Node {
            tag: "style".to_string(),
            attrs: vec![("id".to_string(), block_id.to_string())],
            parent: Some(head),
            children: vec![Child::Text(css.to_string())],
        });
        self.nodes[head].children.push(Child::Element(idx));
        self.rects.push(None);
    }

    fn request_animation_frame(&mut self) {
        self.frame_requests += 1;
    }
}

/// Walk the parsed tree in pre-order, recording elements and text.
fn collect_node(el: ElementRef<'_>, parent: Option<usize>, nodes: &mut Vec<Node>) -> usize {
    let idx = nodes.len();
    nodes.push(Node {
        tag: el.value().name().to_ascii_lowercase(),
        attrs: el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        parent,
        children: Vec::new(),
    });

    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            let c = collect_node(child_el, Some(idx), nodes);
            nodes[idx].children.push(Child::Element(c));
        } else if let Some(text) = child.value().as_text() {
            let text: &str = text;
            nodes[idx].children.push(Child::Text(text.to_string()));
        }
    }

    idx
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
