//! The progressive media loader.
//!
//! `LazyLoader` is a synchronous state machine over a [`DocumentAdapter`].
//! It never performs I/O itself: starting a load queues a [`FetchRequest`]
//! that the driver executes, and the outcome comes back through
//! [`LazyLoader::complete_fetch`]. Fade-ins are queued until the host
//! delivers the next paint frame via [`LazyLoader::on_animation_frame`].
//!
//! Per element:
//!
//! ```text
//! Unloaded -> Placeholder -> Loading -> Loaded
//!                                   \-> Error
//! ```
//!
//! Loaded and Error are terminal. At most one Loading attempt is started
//! per element.

use crate::assets::{AssetInitializer, AssetKind, MarkerInitializer};
use crate::config::LoaderConfig;
use crate::dom::{DocumentAdapter, ElementId};
use crate::error::{LoaderError, Result};
use crate::fetch::FetchedResource;
use crate::placeholder::Placeholder;
use crate::strategy::{self, Enrollment, LoadStrategy};
use crate::styles;
use crate::srcset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Display state of a deferred element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    Unloaded,
    Placeholder,
    Loading,
    Loaded,
    Error,
}

impl DisplayState {
    /// Not yet requested: the element still carries its pending reference.
    pub fn is_pending(self) -> bool {
        matches!(self, DisplayState::Unloaded | DisplayState::Placeholder)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DisplayState::Loaded | DisplayState::Error)
    }
}

/// What a tracked element defers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Deferred {
    Image {
        src: Option<String>,
        srcset: Option<String>,
    },
    Source {
        srcset: String,
    },
    Asset {
        asset: AssetKind,
    },
}

impl Deferred {
    /// URL fetched before the resource is applied.
    fn fetch_url(&self) -> Option<String> {
        match self {
            Deferred::Image { src, srcset } => src
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .or_else(|| srcset.as_deref().and_then(srcset::primary_url)),
            Deferred::Source { srcset } => srcset::primary_url(srcset),
            Deferred::Asset { .. } => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Deferred::Image { .. } => "img".to_string(),
            Deferred::Source { .. } => "source".to_string(),
            Deferred::Asset { asset } => asset.to_string(),
        }
    }

    /// Human-readable resource reference.
    pub fn resource(&self) -> Option<String> {
        match self {
            Deferred::Image { src, srcset } => src.clone().or_else(|| srcset.clone()),
            Deferred::Source { srcset } => Some(srcset.clone()),
            Deferred::Asset { .. } => None,
        }
    }
}

/// A fetch the driver should start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: ElementId,
    pub url: String,
}

/// Snapshot of one tracked element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementStatus {
    pub id: ElementId,
    pub target: Deferred,
    pub state: DisplayState,
    pub attempts: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
struct Entry {
    target: Deferred,
    state: DisplayState,
    /// A synthesized placeholder is currently shown.
    placeholder: bool,
    attempts: u32,
    error: Option<LoaderError>,
}

impl Entry {
    fn new(target: Deferred, state: DisplayState, placeholder: bool) -> Self {
        Self {
            target,
            state,
            placeholder,
            attempts: 0,
            error: None,
        }
    }
}

pub struct LazyLoader {
    config: LoaderConfig,
    strategy: Option<Box<dyn LoadStrategy>>,
    initializer: Box<dyn AssetInitializer>,
    entries: BTreeMap<ElementId, Entry>,
    outbox: Vec<FetchRequest>,
    fades: Vec<ElementId>,
}

impl LazyLoader {
    pub fn new(config: LoaderConfig) -> Result<Self> {
        config.validate()?;
        let initializer = Box::new(MarkerInitializer::new(&config.markers.chart_attr));
        Ok(Self {
            config,
            strategy: None,
            initializer,
            entries: BTreeMap::new(),
            outbox: Vec::new(),
            fades: Vec::new(),
        })
    }

    /// Replace the routine that sets up charts and carousels.
    pub fn with_initializer(mut self, initializer: Box<dyn AssetInitializer>) -> Self {
        self.initializer = initializer;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Name of the selected strategy, once initialized.
    pub fn strategy_name(&self) -> Option<&'static str> {
        self.strategy.as_ref().map(|s| s.name())
    }

    /// Inject styles, choose the strategy, and register every deferred
    /// element and asset group. Safe to call again: styles are not
    /// duplicated and already tracked elements are skipped.
    pub fn initialize(&mut self, doc: &mut dyn DocumentAdapter) {
        self.inject_styles(doc);
        self.ensure_strategy(doc);

        let media = self.register_deferred_elements(doc);
        let assets = self.register_deferred_asset_groups(doc);
        info!(
            strategy = self.strategy_name().unwrap_or("none"),
            media, assets, "lazy loader initialized"
        );
    }

    /// Track every element carrying a pending source or source-set.
    /// Returns the number of newly registered elements.
    pub fn register_deferred_elements(&mut self, doc: &mut dyn DocumentAdapter) -> usize {
        self.ensure_strategy(doc);
        let m = &self.config.markers;
        let selector = format!(
            "img[{src}], img[{srcset}], source[{srcset}]",
            src = m.pending_src,
            srcset = m.pending_srcset
        );
        let ids = match doc.select(&selector) {
            Ok(ids) => ids,
            Err(e) => {
                warn!("skipping deferred media: {e}");
                return 0;
            }
        };

        let mut registered = 0;
        let mut immediate = false;
        for id in ids {
            if self.entries.contains_key(&id) {
                continue;
            }
            let tag = doc.tag_name(id).unwrap_or_default();
            let src = doc.attribute(id, &self.config.markers.pending_src);
            let srcset = doc.attribute(id, &self.config.markers.pending_srcset);
            let target = if tag == "source" {
                Deferred::Source {
                    srcset: srcset.unwrap_or_default(),
                }
            } else {
                Deferred::Image { src, srcset }
            };

            let Some(strategy) = self.strategy.as_mut() else {
                return registered;
            };
            // Deferred elements wait in Placeholder; only images without an
            // applied source get a synthesized one.
            let mut state = DisplayState::Unloaded;
            let mut placeholder = false;
            if strategy.defers() {
                state = DisplayState::Placeholder;
                if tag == "img" && !has_applied_source(doc, id) {
                    let synthesized = placeholder_for(&self.config, doc, id);
                    doc.set_attribute(id, "src", &synthesized.to_data_uri());
                    placeholder = true;
                }
            }
            if strategy.enroll(id) == Enrollment::Immediate {
                immediate = true;
            }

            debug!(element = %id, tag = %tag, ?state, "registered deferred element");
            self.entries.insert(id, Entry::new(target, state, placeholder));
            registered += 1;
        }

        if immediate {
            self.load_all_immediately(doc);
        }
        registered
    }

    /// Track charts and carousels. Returns the number of newly registered groups.
    pub fn register_deferred_asset_groups(&mut self, doc: &mut dyn DocumentAdapter) -> usize {
        self.ensure_strategy(doc);
        let groups = [
            (format!("[{}]", self.config.markers.chart_attr), AssetKind::Chart),
            (self.config.markers.carousel_selector.clone(), AssetKind::Carousel),
        ];

        let mut registered = 0;
        let mut immediate = false;
        for (selector, kind) in groups {
            let ids = match doc.select(&selector) {
                Ok(ids) => ids,
                Err(e) => {
                    warn!("skipping {kind} groups: {e}");
                    continue;
                }
            };
            for id in ids {
                if self.entries.contains_key(&id) {
                    continue;
                }
                let Some(strategy) = self.strategy.as_mut() else {
                    return registered;
                };
                let state = if strategy.defers() {
                    DisplayState::Placeholder
                } else {
                    DisplayState::Unloaded
                };
                if strategy.enroll(id) == Enrollment::Immediate {
                    immediate = true;
                }
                debug!(element = %id, %kind, "registered lazy asset group");
                self.entries
                    .insert(id, Entry::new(Deferred::Asset { asset: kind }, state, false));
                registered += 1;
            }
        }

        if immediate {
            self.load_all_immediately(doc);
        }
        registered
    }

    /// Evaluate visibility and start loading every triggered element.
    pub fn check_visibility(&mut self, doc: &mut dyn DocumentAdapter) -> usize {
        let triggered = match self.strategy.as_mut() {
            Some(strategy) => strategy.collect_triggers(doc),
            None => return 0,
        };
        self.on_visibility(doc, &triggered)
    }

    /// Handle a batch of visibility triggers.
    pub fn on_visibility(&mut self, doc: &mut dyn DocumentAdapter, triggered: &[ElementId]) -> usize {
        let mut started = 0;
        for &id in triggered {
            // Deregister before loading so a re-entry cannot trigger twice.
            if let Some(strategy) = self.strategy.as_mut() {
                strategy.withdraw(id);
            }
            if self.load_element(doc, id) {
                started += 1;
            }
        }
        started
    }

    /// Start loading one element. Returns `false` when the element is
    /// unknown or already past the pending states.
    pub fn load_element(&mut self, doc: &mut dyn DocumentAdapter, id: ElementId) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            debug!(element = %id, "load requested for untracked element");
            return false;
        };
        if !entry.state.is_pending() {
            debug!(element = %id, state = ?entry.state, "load already started");
            return false;
        }

        entry.state = DisplayState::Loading;
        entry.attempts += 1;
        let target = entry.target.clone();
        doc.add_class(id, &self.config.classes.loading);

        match target {
            Deferred::Asset { asset } => self.run_initializer(doc, id, asset),
            other => match other.fetch_url() {
                Some(url) => {
                    debug!(element = %id, %url, "fetch started");
                    self.outbox.push(FetchRequest { id, url });
                }
                None => self.fail(doc, id, LoaderError::EmptyResource),
            },
        }
        true
    }

    /// Fallback path: load every element that has not been requested yet.
    pub fn load_all_immediately(&mut self, doc: &mut dyn DocumentAdapter) -> usize {
        let pending: Vec<ElementId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.state.is_pending())
            .map(|(id, _)| *id)
            .collect();
        let mut started = 0;
        for id in pending {
            if self.load_element(doc, id) {
                started += 1;
            }
        }
        started
    }

    /// Load every tracked element matching `selector` now, bypassing
    /// visibility. Returns how many loads were started.
    pub fn force_load(&mut self, doc: &mut dyn DocumentAdapter, selector: &str) -> Result<usize> {
        let ids = doc.select(selector)?;
        let mut started = 0;
        for id in ids {
            if !self.entries.contains_key(&id) {
                continue;
            }
            if let Some(strategy) = self.strategy.as_mut() {
                strategy.withdraw(id);
            }
            if self.load_element(doc, id) {
                started += 1;
            }
        }
        info!(selector, started, "force load");
        Ok(started)
    }

    /// Fetches queued since the last call.
    pub fn take_fetch_requests(&mut self) -> Vec<FetchRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Apply the outcome of a fetch started by [`load_element`](Self::load_element).
    pub fn complete_fetch(
        &mut self,
        doc: &mut dyn DocumentAdapter,
        id: ElementId,
        outcome: Result<FetchedResource>,
    ) {
        match self.state(id) {
            None => {
                warn!(element = %id, "completion for untracked element");
                return;
            }
            Some(DisplayState::Loading) => {}
            Some(state) => {
                debug!(element = %id, ?state, "ignoring stale completion");
                return;
            }
        }

        let resource = match outcome {
            Ok(resource) => resource,
            Err(e) => {
                self.fail(doc, id, e);
                return;
            }
        };
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };

        match &entry.target {
            Deferred::Image { src, srcset } => {
                match src.as_deref().filter(|s| !s.trim().is_empty()) {
                    Some(src) => doc.set_attribute(id, "src", src),
                    // Set-only image: replace the synthesized placeholder
                    // with the candidate that was fetched.
                    None if entry.placeholder => doc.set_attribute(id, "src", &resource.url),
                    None => {}
                }
                if let Some(srcset) = srcset {
                    doc.set_attribute(id, "srcset", srcset);
                }
            }
            Deferred::Source { srcset } => doc.set_attribute(id, "srcset", srcset),
            Deferred::Asset { .. } => {}
        }
        entry.state = DisplayState::Loaded;
        entry.placeholder = false;

        let c = &self.config.classes;
        doc.remove_attribute(id, &self.config.markers.pending_src);
        doc.remove_attribute(id, &self.config.markers.pending_srcset);
        doc.remove_class(id, &c.loading);
        doc.add_class(id, &c.loaded);

        // Resource first, then fade on the next frame.
        doc.set_style_property(id, "opacity", "0");
        doc.set_style_property(
            id,
            "transition",
            &format!("opacity {}ms ease-in", self.config.fade_ms),
        );
        self.fades.push(id);
        doc.request_animation_frame();

        debug!(
            element = %id,
            url = %resource.url,
            bytes = resource.bytes,
            "resource loaded"
        );
    }

    /// Paint-frame callback: complete queued fade-ins.
    pub fn on_animation_frame(&mut self, doc: &mut dyn DocumentAdapter) -> usize {
        let fades = std::mem::take(&mut self.fades);
        for id in &fades {
            doc.set_style_property(*id, "opacity", "1");
        }
        fades.len()
    }

    pub fn has_pending_frame(&self) -> bool {
        !self.fades.is_empty()
    }

    pub fn state(&self, id: ElementId) -> Option<DisplayState> {
        self.entries.get(&id).map(|e| e.state)
    }

    /// Number of loads started for an element (0 or 1).
    pub fn load_attempts(&self, id: ElementId) -> u32 {
        self.entries.get(&id).map(|e| e.attempts).unwrap_or(0)
    }

    pub fn is_observed(&self, id: ElementId) -> bool {
        self.strategy
            .as_ref()
            .map(|s| s.is_enrolled(id))
            .unwrap_or(false)
    }

    pub fn tracked(&self) -> usize {
        self.entries.len()
    }

    pub fn statuses(&self) -> Vec<ElementStatus> {
        self.entries
            .iter()
            .map(|(id, e)| ElementStatus {
                id: *id,
                target: e.target.clone(),
                state: e.state,
                attempts: e.attempts,
                error: e.error.as_ref().map(|err| err.to_string()),
            })
            .collect()
    }

    fn inject_styles(&self, doc: &mut dyn DocumentAdapter) {
        let existing = doc
            .select(&format!("style#{}", styles::STYLE_BLOCK_ID))
            .map(|ids| !ids.is_empty())
            .unwrap_or(false);
        if existing {
            debug!("loader styles already present");
            return;
        }
        doc.append_style_block(styles::STYLE_BLOCK_ID, &styles::render(&self.config));
    }

    fn ensure_strategy(&mut self, doc: &dyn DocumentAdapter) {
        if self.strategy.is_none() {
            let selected = strategy::select(doc, self.config.observer_options());
            if !selected.defers() {
                info!("visibility observation unavailable, loading everything immediately");
            }
            self.strategy = Some(selected);
        }
    }

    fn run_initializer(&mut self, doc: &mut dyn DocumentAdapter, id: ElementId, kind: AssetKind) {
        match self.initializer.initialize(doc, id, kind) {
            Ok(()) => {
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.state = DisplayState::Loaded;
                }
                doc.remove_class(id, &self.config.classes.loading);
                doc.add_class(id, &self.config.classes.loaded);
                debug!(element = %id, %kind, "asset group initialized");
            }
            Err(e) => self.fail(doc, id, e),
        }
    }

    /// Terminal failure: no retry, nothing propagates past this element.
    fn fail(&mut self, doc: &mut dyn DocumentAdapter, id: ElementId, error: LoaderError) {
        warn!(element = %id, error = %error, "deferred resource failed");

        let is_img = doc.tag_name(id).as_deref() == Some("img");
        let had_placeholder = self.entries.get(&id).is_some_and(|e| e.placeholder);

        let c = &self.config.classes;
        doc.remove_attribute(id, &self.config.markers.pending_src);
        doc.remove_attribute(id, &self.config.markers.pending_srcset);
        doc.remove_class(id, &c.loading);
        doc.add_class(id, &c.error);
        doc.set_attribute(id, "data-load-error", &error.to_string());
        if had_placeholder {
            let placeholder = placeholder_for(&self.config, doc, id);
            doc.set_attribute(id, "src", &placeholder.to_error_data_uri());
        }
        if is_img && doc.attribute(id, "alt").map_or(true, |a| a.trim().is_empty()) {
            doc.set_attribute(id, "alt", "Image unavailable");
        }

        if let Some(entry) = self.entries.get_mut(&id) {
            entry.state = DisplayState::Error;
            entry.error = Some(error);
        }
    }
}

fn placeholder_for(config: &LoaderConfig, doc: &dyn DocumentAdapter, id: ElementId) -> Placeholder {
    Placeholder::from_declared(
        doc.attribute(id, "width").as_deref(),
        doc.attribute(id, "height").as_deref(),
        config.placeholder_width,
        config.placeholder_height,
    )
}

fn has_applied_source(doc: &dyn DocumentAdapter, id: ElementId) -> bool {
    doc.attribute(id, "src")
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false)
}
