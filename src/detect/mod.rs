//! Sound event detection domain types
//!
//! Classification output arrives as scored category indices from the
//! audio model's label space. The watch table maps the handful of
//! indices this application cares about onto the events it reports.

use serde::{Deserialize, Serialize};

mod notifier;

pub use notifier::{evaluate, EventToggles, NotificationCounter, ID_WINDOW};

/// One scored category from a classification pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    /// Index into the model's label space
    pub index: u32,
    /// Confidence score in [0.0, 1.0]
    pub score: f32,
}

/// One inference cycle's worth of classification output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationUpdate {
    /// Categories that cleared the score threshold, best first
    pub results: Vec<CategoryResult>,
    /// Inference latency reported by the engine
    pub latency_ms: f64,
}

/// A classification engine failure surfaced to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierFault {
    pub message: String,
    /// Milliseconds since engine start
    pub timestamp_ms: u64,
}

/// The sound events this application watches for
///
/// `ALL` fixes the scan order: each emitted batch reports baby cries
/// first, then glass breaks, then gunshots, regardless of where the
/// matching entries sit in the result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BabyCrying,
    GlassBreak,
    Gunshot,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::BabyCrying,
        EventKind::GlassBreak,
        EventKind::Gunshot,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EventKind::BabyCrying => "baby_crying",
            EventKind::GlassBreak => "glass_break",
            EventKind::Gunshot => "gunshot",
        }
    }
}

// YAMNet label indices for the watched categories
pub const INDEX_CRYING: u32 = 19;
pub const INDEX_BABY: u32 = 20;
pub const INDEX_GUNSHOT: u32 = 421;
pub const INDEX_GLASS: u32 = 435;

/// Immutable mapping from category indices to watched events
///
/// Built once at engine start; evaluation only reads it.
#[derive(Debug, Clone)]
pub struct WatchTable {
    entries: Vec<(u32, EventKind)>,
}

impl WatchTable {
    pub fn new(entries: Vec<(u32, EventKind)>) -> Self {
        Self { entries }
    }

    /// The event a category index maps to, if it is watched.
    pub fn kind_for(&self, index: u32) -> Option<EventKind> {
        self.entries
            .iter()
            .find(|(watched, _)| *watched == index)
            .map(|(_, kind)| *kind)
    }

    pub fn watched_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|(index, _)| *index)
    }
}

impl Default for WatchTable {
    /// The stock YAMNet mapping: two crying labels, one glass, one gunshot.
    fn default() -> Self {
        Self::new(vec![
            (INDEX_CRYING, EventKind::BabyCrying),
            (INDEX_BABY, EventKind::BabyCrying),
            (INDEX_GLASS, EventKind::GlassBreak),
            (INDEX_GUNSHOT, EventKind::Gunshot),
        ])
    }
}
