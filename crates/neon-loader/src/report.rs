//! Serializable summary of a loader run.

use crate::loader::{DisplayState, ElementStatus, LazyLoader};
use serde::Serialize;

/// Count of elements per display state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateTotals {
    pub unloaded: usize,
    pub placeholder: usize,
    pub loading: usize,
    pub loaded: usize,
    pub error: usize,
}

impl StateTotals {
    fn record(&mut self, state: DisplayState) {
        match state {
            DisplayState::Unloaded => self.unloaded += 1,
            DisplayState::Placeholder => self.placeholder += 1,
            DisplayState::Loading => self.loading += 1,
            DisplayState::Loaded => self.loaded += 1,
            DisplayState::Error => self.error += 1,
        }
    }

    /// Elements that reached Loaded or Error.
    pub fn settled(&self) -> usize {
        self.loaded + self.error
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub strategy: String,
    pub totals: StateTotals,
    pub elements: Vec<ElementStatus>,
}

impl LoadReport {
    pub fn from_loader(loader: &LazyLoader) -> Self {
        let elements = loader.statuses();
        let mut totals = StateTotals::default();
        for status in &elements {
            totals.record(status.state);
        }
        Self {
            strategy: loader.strategy_name().unwrap_or("none").to_string(),
            totals,
            elements,
        }
    }

    /// Elements that ended in a terminal state.
    pub fn terminal(&self) -> impl Iterator<Item = &ElementStatus> {
        self.elements.iter().filter(|e| e.state.is_terminal())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ElementStatus> {
        self.elements
            .iter()
            .filter(|e| e.state == DisplayState::Error)
    }
}
