//! Fixture utilities for the deterministic CLI harness.
//!
//! This module discovers replay fixtures, loads their cycle scripts,
//! parses optional expectation JSON, and evaluates the notification
//! policy over the scripted cycles. It is intentionally desktop-focused
//! to support CI and QA workflows.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::detect::{evaluate, EventKind, EventToggles, NotificationCounter, WatchTable};
use crate::engine::backend::ReplayCycle;
use crate::notify::NotificationRequest;

/// Default location for replay fixture assets.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

const REPLAY_SUFFIX: &str = ".replay.json";
const EXPECT_SUFFIX: &str = ".expect.json";

/// Spacing applied between scripted cycles when stamping timestamps.
const CYCLE_SPACING_MS: u64 = 500;

/// Metadata describing an available fixture.
#[derive(Clone, Debug)]
pub struct FixtureMetadata {
    pub name: String,
    pub replay_path: PathBuf,
    pub expect_path: Option<PathBuf>,
}

/// Loaded fixture with its cycle script and optional expectations.
pub struct FixtureData {
    pub metadata: FixtureMetadata,
    pub definition: ReplayDefinition,
    pub expectations: Option<FixtureExpectations>,
}

/// JSON schema of one replay script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayDefinition {
    /// Toggle state held for the whole replay
    #[serde(default)]
    pub toggles: EventToggles,
    /// Counter position at the start of the replay
    #[serde(default)]
    pub start_counter: u64,
    pub cycles: Vec<ReplayCycle>,
}

/// JSON expectation schema for fixture verification.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureExpectations {
    pub fixture: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub notifications: Vec<ExpectedNotification>,
    #[serde(default)]
    pub final_counter: Option<u64>,
}

impl FixtureExpectations {
    pub fn verify(&self, outcome: &ReplayOutcome) -> std::result::Result<(), ExpectationDiff> {
        let mut failures = Vec::new();

        for (index, expected) in self.notifications.iter().enumerate() {
            match outcome.notifications.get(index) {
                Some(actual) => {
                    if actual.kind != Some(expected.kind) || actual.id != expected.id {
                        failures.push(ExpectationFailure {
                            index,
                            expected: Some(expected.clone()),
                            actual: Some(actual.clone()),
                        });
                    }
                }
                None => failures.push(ExpectationFailure {
                    index,
                    expected: Some(expected.clone()),
                    actual: None,
                }),
            }
        }

        if outcome.notifications.len() > self.notifications.len() {
            for (index, actual) in outcome
                .notifications
                .iter()
                .enumerate()
                .skip(self.notifications.len())
            {
                failures.push(ExpectationFailure {
                    index,
                    expected: None,
                    actual: Some(actual.clone()),
                });
            }
        }

        let counter = self.final_counter.and_then(|expected| {
            (outcome.final_counter != expected).then_some(CounterMismatch {
                expected,
                actual: outcome.final_counter,
            })
        });

        if failures.is_empty() && counter.is_none() {
            Ok(())
        } else {
            Err(ExpectationDiff { failures, counter })
        }
    }
}

/// Expected notification definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedNotification {
    pub kind: EventKind,
    pub id: u32,
}

/// Outcome of comparing a replay run with expectations.
#[derive(Debug)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
    pub counter: Option<CounterMismatch>,
}

impl ExpectationDiff {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "failures": self.failures.iter().map(|failure| {
                serde_json::json!({
                    "index": failure.index,
                    "expected": failure.expected,
                    "actual": failure.actual,
                })
            }).collect::<Vec<_>>(),
            "counter": self.counter.as_ref().map(|mismatch| {
                serde_json::json!({
                    "expected": mismatch.expected,
                    "actual": mismatch.actual,
                })
            }),
        })
    }
}

/// Detailed diff entry for a single failure.
#[derive(Debug)]
pub struct ExpectationFailure {
    pub index: usize,
    /// None marks an unexpected extra notification
    pub expected: Option<ExpectedNotification>,
    /// None marks a missing notification
    pub actual: Option<NotificationRequest>,
}

/// Final counter disagreement between replay and expectations.
#[derive(Debug)]
pub struct CounterMismatch {
    pub expected: u64,
    pub actual: u64,
}

/// Catalog responsible for discovering fixtures on disk.
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all fixtures by their metadata.
    pub fn discover(&self) -> Result<Vec<FixtureMetadata>> {
        let mut fixtures = Vec::new();
        if !self.root.exists() {
            return Ok(fixtures);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                let file_name = entry.file_name();
                let Some(file_name) = file_name.to_str() else {
                    continue;
                };
                if let Some(name) = file_name.strip_suffix(REPLAY_SUFFIX) {
                    let expect = self.root.join(format!("{name}{EXPECT_SUFFIX}"));
                    fixtures.push(FixtureMetadata {
                        name: name.to_string(),
                        replay_path: path.clone(),
                        expect_path: expect.exists().then_some(expect),
                    });
                }
            }
        }

        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fixtures)
    }

    /// Load a fixture script + expectations for the provided name or path.
    pub fn load(&self, fixture: &str, override_expect: Option<PathBuf>) -> Result<FixtureData> {
        let replay_path = self.resolve_fixture_path(fixture)?;
        let metadata = self.metadata_for_path(&replay_path)?;

        let script = fs::read_to_string(&replay_path)
            .with_context(|| format!("reading replay {}", replay_path.display()))?;
        let definition: ReplayDefinition = serde_json::from_str(&script)
            .with_context(|| format!("parsing {}", replay_path.display()))?;

        let expectation_path = override_expect.or(metadata.expect_path.clone());
        let expectations = match expectation_path {
            Some(path) => {
                let json = fs::read_to_string(&path)
                    .with_context(|| format!("reading expectation {}", path.display()))?;
                Some(
                    serde_json::from_str(&json)
                        .with_context(|| format!("parsing {}", path.display()))?,
                )
            }
            None => None,
        };

        Ok(FixtureData {
            metadata,
            definition,
            expectations,
        })
    }

    fn resolve_fixture_path(&self, fixture: &str) -> Result<PathBuf> {
        let as_path = Path::new(fixture);
        if as_path.exists() {
            return Ok(as_path.to_path_buf());
        }

        let candidate = self.root.join(format!("{fixture}{REPLAY_SUFFIX}"));
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(anyhow!(
                "Fixture '{fixture}' not found in {}",
                self.root.display()
            ))
        }
    }

    fn metadata_for_path(&self, replay_path: &Path) -> Result<FixtureMetadata> {
        let file_name = replay_path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Invalid fixture name for {}", replay_path.display()))?;
        let name = file_name
            .strip_suffix(REPLAY_SUFFIX)
            .unwrap_or(file_name)
            .to_string();
        let expect_path = replay_path.with_file_name(format!("{name}{EXPECT_SUFFIX}"));
        Ok(FixtureMetadata {
            name,
            replay_path: replay_path.to_path_buf(),
            expect_path: expect_path.exists().then_some(expect_path),
        })
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_ROOT)
    }
}

/// Everything a replay run produced, for reporting and verification.
#[derive(Debug, Serialize)]
pub struct ReplayOutcome {
    pub notifications: Vec<NotificationRequest>,
    pub final_counter: u64,
    pub cycles: usize,
    pub faults: Vec<String>,
}

/// Evaluates the notification policy over a scripted cycle sequence.
///
/// This is the pure-policy twin of the live dispatch worker: no queue,
/// no sink, just the decision path, which makes expectation diffs exact.
pub struct FixtureProcessor {
    table: WatchTable,
}

impl FixtureProcessor {
    pub fn new() -> Self {
        Self {
            table: WatchTable::default(),
        }
    }

    pub fn run(&self, definition: &ReplayDefinition) -> ReplayOutcome {
        let mut counter = NotificationCounter::at(definition.start_counter);
        let mut notifications = Vec::new();
        let mut faults = Vec::new();

        for (index, cycle) in definition.cycles.iter().enumerate() {
            let now_ms = index as u64 * CYCLE_SPACING_MS;

            if let Some(message) = &cycle.fault {
                // Faults clear the display but never touch the counter
                faults.push(message.clone());
                continue;
            }

            let (pending, advanced) = evaluate(
                &self.table,
                &cycle.results,
                &definition.toggles,
                counter,
                now_ms,
            );
            counter = advanced;
            notifications.extend(pending);
        }

        ReplayOutcome {
            notifications,
            final_counter: counter.value(),
            cycles: definition.cycles.len(),
            faults,
        }
    }
}

impl Default for FixtureProcessor {
    fn default() -> Self {
        Self::new()
    }
}
