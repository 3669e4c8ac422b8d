//! Engine module housing the reusable classification core.
//!
//! This module exposes trait-based backends (`backend`) and the
//! `SentryHandle` orchestration layer (`core`) shared by the CLI, HTTP,
//! and replay surfaces.

pub mod backend;
pub mod core;

pub use backend::{
    ClassifierBackend, ClassifierStartContext, EngineMessage, ReplayBackend, ReplayCycle,
    StubTimeSource, SyntheticBackend, SystemTimeSource, TimeSource,
};
pub use core::{ClassifierPatch, SentryHandle, TelemetryEvent, TelemetryEventKind};
