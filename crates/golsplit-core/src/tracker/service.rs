use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use super::{Tracker, TrackerConfig};
use crate::error::{Error, Result};
use crate::events::{self, EventStream};
use crate::memory::ProcessProvider;
use crate::shutdown::ShutdownSignal;

struct Worker {
    shutdown: Arc<ShutdownSignal>,
    handle: JoinHandle<()>,
}

/// Owns the background thread running a [`Tracker`].
///
/// At most one loop runs at a time. Dropping the service stops the loop.
#[derive(Default)]
pub struct TrackerService {
    worker: Option<Worker>,
}

impl TrackerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the poll loop and return the stream its events arrive on.
    ///
    /// Fails with [`Error::AlreadyRunning`] while a previous loop is alive.
    pub fn start<P>(&mut self, provider: P, config: TrackerConfig) -> Result<EventStream>
    where
        P: ProcessProvider + Send + 'static,
    {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }
        // a loop that died on its own still needs joining
        self.stop();

        let (sink, stream) = events::channel();
        let shutdown = Arc::new(ShutdownSignal::new());
        let handle = {
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("golsplit-tracker".to_string())
                .spawn(move || Tracker::new(provider, config, sink, shutdown).run())?
        };

        self.worker = Some(Worker { shutdown, handle });
        Ok(stream)
    }

    /// Request cancellation and block until the loop thread has exited
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        worker.shutdown.trigger();
        if worker.handle.join().is_err() {
            error!("Tracker thread panicked");
        } else {
            debug!("Tracker thread joined");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }
}

impl Drop for TrackerService {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::GameEvent;
    use crate::game::fixture::GameMemory;
    use crate::memory::MockProcessProvider;
    use std::time::{Duration, Instant};

    #[test]
    fn test_start_twice_is_rejected() {
        let mut service = TrackerService::new();
        let _stream = service
            .start(MockProcessProvider::new(), TrackerConfig::default())
            .unwrap();

        let err = service
            .start(MockProcessProvider::new(), TrackerConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyRunning));

        service.stop();
        assert!(!service.is_running());
    }

    #[test]
    fn test_restart_after_stop() {
        let mut service = TrackerService::new();
        service
            .start(MockProcessProvider::new(), TrackerConfig::default())
            .unwrap();
        service.stop();

        assert!(service
            .start(MockProcessProvider::new(), TrackerConfig::default())
            .is_ok());
        assert!(service.is_running());
    }

    #[test]
    fn test_stop_while_searching_is_prompt() {
        let search_interval = Duration::from_millis(250);
        let provider = MockProcessProvider::new();
        let mut service = TrackerService::new();
        service
            .start(
                provider.clone(),
                TrackerConfig::builder()
                    .search_interval(search_interval)
                    .build(),
            )
            .unwrap();

        let start = Instant::now();
        while provider.searches() == 0 {
            assert!(start.elapsed() < Duration::from_secs(2));
            thread::sleep(Duration::from_millis(1));
        }

        let start = Instant::now();
        service.stop();
        assert!(start.elapsed() < search_interval);
        assert!(!service.is_running());
    }

    #[test]
    fn test_stream_ends_after_stop() {
        let game = GameMemory::new();
        let provider = MockProcessProvider::new();
        provider.push(Some(game.reader.clone()));

        let mut service = TrackerService::new();
        let stream = service
            .start(
                provider,
                TrackerConfig::builder()
                    .poll_interval(Duration::from_millis(2))
                    .build(),
            )
            .unwrap();

        let start = Instant::now();
        while game.reader.read_count() < 100 {
            assert!(start.elapsed() < Duration::from_secs(2));
            thread::sleep(Duration::from_millis(1));
        }
        game.set_game_time(16);

        let delivery = stream.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(delivery.event(), &GameEvent::FirstLevelStarted);

        service.stop();
        assert!(stream.recv().is_none());
    }
}
