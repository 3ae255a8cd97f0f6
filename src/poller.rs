use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::builds::BuildView;
use crate::config::CycleConfig;
use crate::error::Result;
use crate::providers::circleci::{CircleApi, CircleCiProvider, TransitionTracker, Transitions};

/// What the poller hands to the presentation layer.
#[derive(Debug)]
pub enum PollEvent {
    /// Workflows of `fetched` pipelines have been fetched so far.
    Progress { generation: u64, fetched: usize },
    Updated {
        generation: u64,
        builds: Vec<BuildView>,
        transitions: Transitions,
    },
    /// The cycle failed as a whole; the previous result should be cleared.
    Failed { generation: u64, message: String },
}

#[derive(Default)]
struct PollState {
    generation: u64,
    tracker: TransitionTracker,
}

/// Runs poll cycles on a timer and on demand, one at a time.
///
/// Ticks that arrive while a cycle is in flight are skipped. A manual refresh
/// aborts the in-flight cycle and starts a new generation; results carrying an
/// older generation are dropped before publishing.
pub struct Poller<A: CircleApi + 'static> {
    provider: CircleCiProvider<A>,
    config: Arc<CycleConfig>,
    interval: Duration,
    state: Arc<Mutex<PollState>>,
}

impl<A: CircleApi + 'static> Poller<A> {
    pub fn new(provider: CircleCiProvider<A>, config: CycleConfig, interval: Duration) -> Self {
        Self {
            provider,
            config: Arc::new(config),
            interval,
            state: Arc::new(Mutex::new(PollState::default())),
        }
    }

    /// Polls until `refresh` is closed or `events` has no receiver.
    pub async fn run(
        self,
        mut refresh: mpsc::Receiver<()>,
        events: mpsc::UnboundedSender<PollEvent>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: Option<JoinHandle<()>> = None;

        info!("Polling every {}s", self.interval.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if in_flight.as_ref().is_some_and(|handle| !handle.is_finished()) {
                        debug!("Tick skipped, previous cycle still running");
                        continue;
                    }
                    in_flight = Some(self.spawn_cycle(&events));
                }
                request = refresh.recv() => {
                    if request.is_none() {
                        break;
                    }
                    if let Some(handle) = in_flight.take() {
                        handle.abort();
                    }
                    debug!("Manual refresh requested");
                    in_flight = Some(self.spawn_cycle(&events));
                    ticker.reset();
                }
                () = events.closed() => break,
            }
        }

        if let Some(handle) = in_flight {
            handle.abort();
        }
        debug!("Poller stopped");
    }

    fn spawn_cycle(&self, events: &mpsc::UnboundedSender<PollEvent>) -> JoinHandle<()> {
        let generation = begin_cycle(&self.state);
        let provider = self.provider.clone();
        let config = Arc::clone(&self.config);
        let state = Arc::clone(&self.state);
        let events = events.clone();

        tokio::spawn(async move {
            let progress_events = events.clone();
            let progress = move |fetched: usize| {
                let _ = progress_events.send(PollEvent::Progress {
                    generation,
                    fetched,
                });
            };

            let outcome = provider.collect_builds(&config, &progress).await;
            if let Some(event) = publish(&state, generation, outcome) {
                let _ = events.send(event);
            }
        })
    }
}

/// Starts a new generation, superseding any cycle still running.
fn begin_cycle(state: &Mutex<PollState>) -> u64 {
    let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    state.generation += 1;
    state.generation
}

/// Turns a finished cycle into an event, unless a newer cycle has started.
///
/// Transition tracking only advances for published cycles.
fn publish(
    state: &Mutex<PollState>,
    generation: u64,
    outcome: Result<Vec<BuildView>>,
) -> Option<PollEvent> {
    let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if state.generation != generation {
        debug!(
            "Discarding cycle {generation}, superseded by {}",
            state.generation
        );
        return None;
    }

    Some(match outcome {
        Ok(builds) => {
            let transitions = state.tracker.observe(&builds);
            PollEvent::Updated {
                generation,
                builds,
                transitions,
            }
        }
        Err(e) => {
            warn!("Poll cycle {generation} failed: {e}");
            PollEvent::Failed {
                generation,
                message: e.user_message(),
            }
        }
    })
}
