//! Simulated position feed that drifts around on a background thread.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use token_trek_core::{GridFrame, WorldPosition};
use token_trek_system_movement::{FeedError, FeedMessage, PositionFeed, SubscriptionHandle};
use tracing::{debug, warn};

const SAMPLE_PERIOD: Duration = Duration::from_millis(400);
/// Largest drift per sample along each axis, in cells.
const MAX_DRIFT: f64 = 0.6;

#[derive(Debug)]
struct Worker {
    handle: SubscriptionHandle,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Wandering stand-in for a hardware position sensor.
#[derive(Debug)]
pub(crate) struct WanderFeed {
    position: Arc<Mutex<WorldPosition>>,
    step_degrees: f64,
    seed: u64,
    period: Duration,
    issued: u64,
    worker: Option<Worker>,
}

impl WanderFeed {
    /// Starts wandering from the center of the origin cell.
    pub(crate) fn new(frame: GridFrame, seed: u64) -> Self {
        let half = frame.tile_degrees() / 2.0;
        Self::with_period(frame.origin().offset(half, half), frame, seed, SAMPLE_PERIOD)
    }

    fn with_period(start: WorldPosition, frame: GridFrame, seed: u64, period: Duration) -> Self {
        Self {
            position: Arc::new(Mutex::new(start)),
            step_degrees: frame.tile_degrees() * MAX_DRIFT,
            seed,
            period,
            issued: 0,
            worker: None,
        }
    }

    fn halt(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.stop.store(true, Ordering::Relaxed);
        if worker.thread.join().is_err() {
            warn!(subscription = worker.handle.get(), "wander_feed_panicked");
        }
        debug!(subscription = worker.handle.get(), "wander_feed_stopped");
    }
}

impl PositionFeed for WanderFeed {
    fn is_present(&self) -> bool {
        true
    }

    fn subscribe(&mut self, sink: Sender<FeedMessage>) -> Result<SubscriptionHandle, FeedError> {
        self.halt();
        self.issued += 1;
        let handle = SubscriptionHandle::new(self.issued);

        let stop = Arc::new(AtomicBool::new(false));
        let position = Arc::clone(&self.position);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed ^ self.issued);
        let step = self.step_degrees;
        let period = self.period;
        let flag = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("wander-feed".to_owned())
            .spawn(move || {
                while !flag.load(Ordering::Relaxed) {
                    thread::sleep(period);
                    let sample = {
                        let Ok(mut current) = position.lock() else {
                            break;
                        };
                        *current = current.offset(
                            rng.gen_range(-step..=step),
                            rng.gen_range(-step..=step),
                        );
                        *current
                    };
                    if sink.send(FeedMessage::Sample(sample)).is_err() {
                        break;
                    }
                }
            })
            .map_err(|error| FeedError::Transient(error.to_string()))?;

        debug!(subscription = handle.get(), "wander_feed_started");
        self.worker = Some(Worker {
            handle,
            stop,
            thread,
        });
        Ok(handle)
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle) {
        if self.worker.as_ref().map(|worker| worker.handle) == Some(handle) {
            self.halt();
        }
    }
}

impl Drop for WanderFeed {
    fn drop(&mut self) {
        self.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn feed() -> WanderFeed {
        let frame = GridFrame::default();
        WanderFeed::with_period(frame.origin(), frame, 3, Duration::from_millis(1))
    }

    #[test]
    fn samples_stay_within_the_drift_bound() {
        let mut feed = feed();
        let (sink, source) = mpsc::channel();
        let handle = feed.subscribe(sink).expect("subscribe");

        let bound = GridFrame::default().tile_degrees() * MAX_DRIFT;
        let FeedMessage::Sample(first) = source
            .recv_timeout(Duration::from_secs(5))
            .expect("sample")
        else {
            panic!("wander feed does not report errors");
        };
        assert!((first.lat() - GridFrame::default().origin().lat()).abs() <= bound + 1e-12);

        feed.unsubscribe(handle);
    }

    #[test]
    fn unsubscribe_ends_delivery() {
        let mut feed = feed();
        let (sink, source) = mpsc::channel();
        let handle = feed.subscribe(sink).expect("subscribe");
        let _ = source.recv_timeout(Duration::from_secs(5)).expect("sample");

        feed.unsubscribe(handle);

        while source.try_recv().is_ok() {}
        assert!(source.recv().is_err());
    }

    #[test]
    fn stale_handles_are_ignored() {
        let mut feed = feed();
        let (first_sink, _first) = mpsc::channel();
        let stale = feed.subscribe(first_sink).expect("subscribe");
        let (sink, source) = mpsc::channel();
        let _current = feed.subscribe(sink).expect("resubscribe");

        feed.unsubscribe(stale);

        assert!(source.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
