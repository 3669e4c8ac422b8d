use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::config::SyntheticConfig;
use crate::detect::{
    CategoryResult, ClassificationUpdate, INDEX_BABY, INDEX_CRYING, INDEX_GLASS, INDEX_GUNSHOT,
};
use crate::error::ClassifyError;

use super::{ClassifierBackend, ClassifierStartContext, EngineMessage};

// YAMNet's label space; background categories are drawn from the full range
const LABEL_SPACE: u32 = 521;
const WATCHED: [u32; 4] = [INDEX_CRYING, INDEX_BABY, INDEX_GUNSHOT, INDEX_GLASS];

/// Backend that fabricates classification cycles on a real-time cadence.
///
/// Stands in for the on-device model during desktop runs: cycles arrive
/// at the hop interval implied by the window length and overlap, and a
/// configurable fraction of them contain a watched category.
pub struct SyntheticBackend {
    config: SyntheticConfig,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl SyntheticBackend {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

impl ClassifierBackend for SyntheticBackend {
    fn start(&self, ctx: ClassifierStartContext) -> Result<(), ClassifyError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ClassifyError::AlreadyRunning);
        }

        // Consecutive windows advance by the non-overlapping remainder
        let hop_ms = (self.config.window_ms as f64 * (1.0 - f64::from(ctx.params.overlap)))
            .round()
            .max(1.0) as u64;
        let threshold = ctx.params.score_threshold;
        let max_results = ctx.params.max_results;
        let watched_weight = self.config.watched_weight;
        let events = ctx.events;
        let running = Arc::clone(&self.running);

        tracing::info!(
            "[SyntheticBackend] Starting with hop {}ms, threshold {:.1}, max {} results",
            hop_ms,
            threshold,
            max_results
        );

        let handle = thread::spawn(move || {
            let mut rng = rand::thread_rng();
            while running.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(hop_ms));
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let update = synth_cycle(&mut rng, threshold, max_results, watched_weight);
                if events.blocking_send(EngineMessage::Cycle(update)).is_err() {
                    break;
                }
            }
        });

        *self.worker.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn stop(&self) -> Result<(), ClassifyError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(ClassifyError::NotRunning);
        }
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

fn synth_cycle(
    rng: &mut impl Rng,
    threshold: f32,
    max_results: usize,
    watched_weight: f32,
) -> ClassificationUpdate {
    let mut results = Vec::new();

    if rng.gen::<f32>() < watched_weight {
        let index = WATCHED[rng.gen_range(0..WATCHED.len())];
        results.push(CategoryResult {
            index,
            score: rng.gen_range(threshold..1.0),
        });
    }

    while results.len() < max_results && rng.gen::<f32>() < 0.7 {
        let index = loop {
            let candidate = rng.gen_range(0..LABEL_SPACE);
            if !WATCHED.contains(&candidate) {
                break candidate;
            }
        };
        results.push(CategoryResult {
            index,
            score: rng.gen_range(threshold..1.0),
        });
    }

    results.truncate(max_results);

    ClassificationUpdate {
        results,
        latency_ms: rng.gen_range(2.0..20.0),
    }
}
