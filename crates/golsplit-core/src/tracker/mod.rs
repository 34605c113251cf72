//! The attach/poll loop.
//!
//! A [`Tracker`] cycles through three states:
//! - `Searching`: look for the game process, retry after the search interval
//! - `Attached`: sample one [`Snapshot`] per tick and dispatch its events
//! - `Faulted`: an unexpected error happened, wait out the cooldown
//!
//! Losing the process is not a fault; the loop simply goes back to searching.
//! A panic inside a search or a session is handled like any other fault.
//! Only the [`ShutdownSignal`] ends the loop.

mod service;

pub use service::TrackerService;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use strum::Display;
use tracing::{debug, error, info, trace, warn};

use crate::error::Result;
use crate::events::{Acknowledgement, EventSink, GameEvent};
use crate::game::{
    DetectorOptions, GameLayout, PersonalBestLedger, Snapshot, StateChangeDetector, ZoneNameTable,
};
use crate::memory::{GameProcess, ProcessProvider};
use crate::shutdown::ShutdownSignal;

/// Executable the tracker looks for by default
pub const DEFAULT_PROCESS_NAME: &str = "lcgol";

/// How often the loop checks for shutdown while a blocking event is pending
const ACK_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub process_name: String,
    /// Sleep between ticks while attached
    pub poll_interval: Duration,
    /// Sleep between process searches
    pub search_interval: Duration,
    /// Sleep after an unexpected error
    pub fault_cooldown: Duration,
    pub layout: GameLayout,
    pub zones: ZoneNameTable,
    pub detector: DetectorOptions,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            poll_interval: Duration::from_millis(15),
            search_interval: Duration::from_millis(250),
            fault_cooldown: Duration::from_secs(1),
            layout: GameLayout::builtin(),
            zones: ZoneNameTable::builtin(),
            detector: DetectorOptions::default(),
        }
    }
}

impl TrackerConfig {
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder::default()
    }
}

/// Builder for [`TrackerConfig`]
#[derive(Debug, Clone, Default)]
pub struct TrackerConfigBuilder {
    process_name: Option<String>,
    poll_interval: Option<Duration>,
    search_interval: Option<Duration>,
    fault_cooldown: Option<Duration>,
    layout: Option<GameLayout>,
    zones: Option<ZoneNameTable>,
    track_game_time: Option<bool>,
}

impl TrackerConfigBuilder {
    pub fn process_name<S: Into<String>>(mut self, name: S) -> Self {
        self.process_name = Some(name.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn search_interval(mut self, interval: Duration) -> Self {
        self.search_interval = Some(interval);
        self
    }

    pub fn fault_cooldown(mut self, cooldown: Duration) -> Self {
        self.fault_cooldown = Some(cooldown);
        self
    }

    /// Replace the built-in memory layout
    pub fn layout(mut self, layout: GameLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn zones(mut self, zones: ZoneNameTable) -> Self {
        self.zones = Some(zones);
        self
    }

    pub fn track_game_time(mut self, enabled: bool) -> Self {
        self.track_game_time = Some(enabled);
        self
    }

    pub fn build(self) -> TrackerConfig {
        let default = TrackerConfig::default();
        TrackerConfig {
            process_name: self.process_name.unwrap_or(default.process_name),
            poll_interval: self.poll_interval.unwrap_or(default.poll_interval),
            search_interval: self.search_interval.unwrap_or(default.search_interval),
            fault_cooldown: self.fault_cooldown.unwrap_or(default.fault_cooldown),
            layout: self.layout.unwrap_or(default.layout),
            zones: self.zones.unwrap_or(default.zones),
            detector: DetectorOptions {
                track_game_time: self
                    .track_game_time
                    .unwrap_or(default.detector.track_game_time),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LoopState {
    Searching,
    Attached,
    Faulted,
}

pub struct Tracker<P: ProcessProvider> {
    provider: P,
    config: TrackerConfig,
    sink: EventSink,
    shutdown: Arc<ShutdownSignal>,
    detector: StateChangeDetector,
    ledger: PersonalBestLedger,
    state: LoopState,
    /// Set once a post finds the consumer gone; the channel cannot reopen
    stream_closed: bool,
}

impl<P: ProcessProvider> Tracker<P> {
    pub fn new(
        provider: P,
        config: TrackerConfig,
        sink: EventSink,
        shutdown: Arc<ShutdownSignal>,
    ) -> Self {
        let detector = StateChangeDetector::new(config.zones.clone(), config.detector);
        let ledger = PersonalBestLedger::from_layout(&config.layout);
        Self {
            provider,
            config,
            sink,
            shutdown,
            detector,
            ledger,
            state: LoopState::Searching,
            stream_closed: false,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run until shutdown is requested
    pub fn run(&mut self) {
        info!("Searching for {}...", self.config.process_name);

        while !self.shutdown.is_shutdown() {
            let fault = match panic::catch_unwind(AssertUnwindSafe(|| self.step())) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) if e.is_process_gone() => {
                    info!("Process went away: {}", e);
                    self.set_state(LoopState::Searching);
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };

            error!("Tracker fault: {}", fault);
            self.set_state(LoopState::Faulted);
            if self.shutdown.wait(self.config.fault_cooldown) {
                break;
            }
            self.set_state(LoopState::Searching);
        }

        debug!("Tracker stopped in state {}", self.state);
    }

    /// One search, followed by a full session if the process was found
    fn step(&mut self) -> Result<()> {
        match self.provider.find(&self.config.process_name)? {
            Some(process) => {
                self.attached(process);
                Ok(())
            }
            None => {
                trace!("{} not running", self.config.process_name);
                self.shutdown.wait(self.config.search_interval);
                Ok(())
            }
        }
    }

    /// Poll an attached process until it exits or shutdown is requested.
    ///
    /// The process handle is dropped on return.
    fn attached(&mut self, process: P::Process) {
        let info = process.info();
        info!(
            "Attached to {} (pid {}, base {:#x})",
            info.name, info.pid, info.base_address
        );
        self.set_state(LoopState::Attached);
        self.detector.reset();

        let image_base = process.base_address();
        let fallback = Snapshot::default();

        loop {
            if process.has_exited() {
                info!("{} (pid {}) exited", info.name, info.pid);
                self.set_state(LoopState::Searching);
                return;
            }

            let snapshot = Snapshot::sample(
                &process,
                image_base,
                &self.config.layout,
                self.detector.previous().unwrap_or(&fallback),
            );

            let mut events = self.ledger.update(&process, image_base);
            events.extend(self.detector.observe(snapshot));
            self.dispatch(events);

            if self.shutdown.wait(self.config.poll_interval) {
                return;
            }
        }
    }

    fn dispatch(&mut self, events: Vec<GameEvent>) {
        for event in events {
            info!("Event {}: {:?}", event.kind(), event);

            let delivered = if event.is_blocking() {
                match self.sink.post_blocking(event) {
                    Some(ack) => {
                        self.await_ack(ack);
                        true
                    }
                    None => false,
                }
            } else {
                self.sink.post(event)
            };

            if delivered {
                continue;
            }
            if self.stream_closed {
                trace!("Event stream closed, event dropped");
            } else {
                warn!("Event stream closed, further events are dropped");
                self.stream_closed = true;
            }
        }
    }

    fn await_ack(&self, ack: Acknowledgement) {
        while !ack.wait_timeout(ACK_POLL_INTERVAL) {
            if self.shutdown.is_shutdown() {
                debug!("Shutdown while waiting for the consumer");
                return;
            }
        }
    }

    fn set_state(&mut self, state: LoopState) {
        if self.state != state {
            debug!("Tracker state: {} -> {}", self.state, state);
            self.state = state;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{self, LoadCause};
    use crate::game::fixture::GameMemory;
    use crate::memory::{MockMemoryReader, MockProcessProvider, ProcessInfo, ReadMemory};
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Instant;

    fn fast_config() -> TrackerConfig {
        TrackerConfig::builder()
            .poll_interval(Duration::from_millis(2))
            .search_interval(Duration::from_millis(5))
            .fault_cooldown(Duration::from_millis(200))
            .build()
    }

    fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    /// Run a tracker on its own thread, returning the handles needed to stop it
    fn spawn<P: ProcessProvider + Send + 'static>(
        provider: P,
        config: TrackerConfig,
    ) -> (
        Arc<ShutdownSignal>,
        events::EventStream,
        thread::JoinHandle<LoopState>,
    ) {
        let (sink, stream) = events::channel();
        let shutdown = Arc::new(ShutdownSignal::new());
        let handle = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                let mut tracker = Tracker::new(provider, config, sink, shutdown);
                tracker.run();
                tracker.state()
            })
        };
        (shutdown, stream, handle)
    }

    /// Game process whose reads panic once `broken` is set
    struct BrokenReader {
        inner: MockMemoryReader,
        broken: Arc<AtomicBool>,
    }

    impl ReadMemory for BrokenReader {
        fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
            if self.broken.load(Ordering::SeqCst) {
                panic!("read through a broken handle");
            }
            self.inner.read_bytes(address, size)
        }
    }

    impl GameProcess for BrokenReader {
        fn info(&self) -> ProcessInfo {
            self.inner.info()
        }

        fn has_exited(&self) -> bool {
            self.inner.has_exited()
        }
    }

    /// Hands out one process, then finds nothing
    struct OneShotProvider {
        process: Option<BrokenReader>,
        searches: Arc<AtomicUsize>,
    }

    impl ProcessProvider for OneShotProvider {
        type Process = BrokenReader;

        fn find(&mut self, _name: &str) -> Result<Option<Self::Process>> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(self.process.take())
        }
    }

    /// Log output collected by a test subscriber
    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn invalid_settings() -> GameEvent {
        GameEvent::InvalidSettings {
            refresh_rate: 75,
            present_interval: 1,
        }
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = TrackerConfig::builder().process_name("other").build();
        assert_eq!(config.process_name, "other");
        assert_eq!(config.poll_interval, Duration::from_millis(15));
        assert_eq!(config.search_interval, Duration::from_millis(250));
        assert_eq!(config.fault_cooldown, Duration::from_secs(1));
        assert!(!config.detector.track_game_time);
    }

    #[test]
    fn test_keeps_searching_until_found() {
        let provider = MockProcessProvider::new();
        let (shutdown, _stream, handle) = spawn(provider.clone(), fast_config());

        assert!(wait_for(Duration::from_secs(2), || provider.searches() >= 3));
        shutdown.trigger();
        assert_eq!(handle.join().unwrap(), LoopState::Searching);
    }

    #[test]
    fn test_events_flow_after_first_tick() {
        let game = GameMemory::new();
        let provider = MockProcessProvider::new();
        provider.push(Some(game.reader.clone()));
        let (shutdown, stream, handle) = spawn(provider, fast_config());

        // a couple of full ticks so the detector has a baseline
        assert!(wait_for(Duration::from_secs(2), || game.reader.read_count() > 100));
        game.set_sp_loading(1);

        let delivery = stream.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            delivery.event(),
            &GameEvent::LoadStarted {
                cause: LoadCause::SinglePlayer
            }
        );

        shutdown.trigger();
        assert_eq!(handle.join().unwrap(), LoopState::Attached);
    }

    #[test]
    fn test_coop_session_events() {
        let game = GameMemory::new();
        game.set_players(2);
        game.set_map("alc_4_toxic_swamp");
        game.set_mp_loading(1);
        let provider = MockProcessProvider::new();
        provider.push(Some(game.reader.clone()));
        let config = TrackerConfig::builder()
            .poll_interval(Duration::from_millis(2))
            .track_game_time(true)
            .build();
        let (shutdown, stream, handle) = spawn(provider, config);

        assert!(wait_for(Duration::from_secs(2), || game.reader.read_count() > 100));
        game.set_game_time(61_500);
        game.set_end_screen(true);
        let delivery = stream.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            delivery.event(),
            &GameEvent::LevelFinished {
                map: "alc_4_toxic_swamp".to_string(),
                level: Some("Toxic Swamp".to_string()),
                game_time: Some(Duration::from_millis(61_500)),
            }
        );

        game.set_end_screen(false);
        game.set_mp_loading(2);
        let delivery = stream.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            delivery.event(),
            &GameEvent::LoadStarted {
                cause: LoadCause::LevelChange
            }
        );

        shutdown.trigger();
        handle.join().unwrap();
    }

    #[test]
    fn test_state_at_attach_produces_no_events() {
        let game = GameMemory::new();
        // already loading, on the end screen and on the clock when we attach
        game.set_sp_loading(1);
        game.set_end_screen(true);
        game.set_game_time(5000);

        let provider = MockProcessProvider::new();
        provider.push(Some(game.reader.clone()));
        let (shutdown, stream, handle) = spawn(provider, fast_config());

        assert!(wait_for(Duration::from_secs(2), || game.reader.read_count() > 200));
        assert!(stream.try_recv().is_none());

        shutdown.trigger();
        handle.join().unwrap();
    }

    #[test]
    fn test_exit_returns_to_searching() {
        let game = GameMemory::new();
        let provider = MockProcessProvider::new();
        provider.push(Some(game.reader.clone()));
        let (shutdown, _stream, handle) = spawn(provider.clone(), fast_config());

        assert!(wait_for(Duration::from_secs(2), || game.reader.read_count() > 0));
        let searches = provider.searches();
        game.reader.exit();

        assert!(wait_for(Duration::from_secs(2), || provider.searches() > searches));
        shutdown.trigger();
        assert_eq!(handle.join().unwrap(), LoopState::Searching);
    }

    #[test]
    fn test_reattach_skips_first_tick_again() {
        let first = GameMemory::new();
        let second = GameMemory::new();
        second.set_sp_loading(1);

        let provider = MockProcessProvider::new();
        provider.push(Some(first.reader.clone()));
        provider.push(Some(second.reader.clone()));
        let (shutdown, stream, handle) = spawn(provider, fast_config());

        assert!(wait_for(Duration::from_secs(2), || first.reader.read_count() > 0));
        first.reader.exit();

        // the new session starts mid-load: no edge against the old session
        assert!(wait_for(Duration::from_secs(2), || second.reader.read_count() > 200));
        assert!(stream.try_recv().is_none());

        shutdown.trigger();
        handle.join().unwrap();
    }

    #[test]
    fn test_fault_waits_cooldown() {
        let provider = MockProcessProvider::new();
        provider.push_failure("access denied");
        let start = Instant::now();
        let (shutdown, _stream, handle) = spawn(provider.clone(), fast_config());

        assert!(wait_for(Duration::from_secs(2), || provider.searches() >= 2));
        assert!(start.elapsed() >= Duration::from_millis(200));

        shutdown.trigger();
        handle.join().unwrap();
    }

    #[test]
    fn test_shutdown_during_fault_cooldown() {
        let provider = MockProcessProvider::new();
        provider.push_failure("access denied");
        let config = TrackerConfig::builder()
            .fault_cooldown(Duration::from_secs(30))
            .build();
        let (shutdown, _stream, handle) = spawn(provider.clone(), config);

        assert!(wait_for(Duration::from_secs(2), || provider.searches() >= 1));
        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        shutdown.trigger();
        assert_eq!(handle.join().unwrap(), LoopState::Faulted);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_settings_blocks_until_acknowledged() {
        let game = GameMemory::new();
        game.set_game_time(5000);
        let provider = MockProcessProvider::new();
        provider.push(Some(game.reader.clone()));
        let (shutdown, stream, handle) = spawn(provider, fast_config());

        assert!(wait_for(Duration::from_secs(2), || game.reader.read_count() > 100));
        game.set_refresh_rate(75);

        let delivery = stream.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(delivery.requires_ack());

        // no further ticks while the consumer holds the delivery
        let reads = game.reader.read_count();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(game.reader.read_count(), reads);
        assert!(stream.try_recv().is_none());

        // consumer fixes the settings before releasing the loop
        game.set_refresh_rate(60);
        delivery.acknowledge();
        assert!(wait_for(Duration::from_secs(2), || game.reader.read_count() > reads));
        thread::sleep(Duration::from_millis(50));
        assert!(stream.try_recv().is_none());

        shutdown.trigger();
        handle.join().unwrap();
    }

    #[test]
    fn test_shutdown_while_waiting_for_ack() {
        let game = GameMemory::new();
        game.set_game_time(5000);
        let provider = MockProcessProvider::new();
        provider.push(Some(game.reader.clone()));
        let (shutdown, stream, handle) = spawn(provider, fast_config());

        assert!(wait_for(Duration::from_secs(2), || game.reader.read_count() > 100));
        game.set_present_interval(0);

        let _held = stream.recv_timeout(Duration::from_secs(2)).unwrap();
        let start = Instant::now();
        shutdown.trigger();
        handle.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_panic_while_attached_faults_and_keeps_searching() {
        let game = GameMemory::new();
        let broken = Arc::new(AtomicBool::new(false));
        let searches = Arc::new(AtomicUsize::new(0));
        let provider = OneShotProvider {
            process: Some(BrokenReader {
                inner: game.reader.clone(),
                broken: Arc::clone(&broken),
            }),
            searches: Arc::clone(&searches),
        };
        let (shutdown, _stream, handle) = spawn(provider, fast_config());

        assert!(wait_for(Duration::from_secs(2), || game.reader.read_count() > 0));
        assert_eq!(searches.load(Ordering::SeqCst), 1);

        let broke_at = Instant::now();
        broken.store(true, Ordering::SeqCst);

        // the session dies, the loop waits out the cooldown and searches again
        assert!(wait_for(Duration::from_secs(2), || {
            searches.load(Ordering::SeqCst) >= 3
        }));
        assert!(broke_at.elapsed() >= Duration::from_millis(200));

        shutdown.trigger();
        assert_eq!(handle.join().unwrap(), LoopState::Searching);
    }

    #[test]
    fn test_closed_stream_warns_once() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();

        let (sink, stream) = events::channel();
        drop(stream);
        let mut tracker = Tracker::new(
            MockProcessProvider::new(),
            fast_config(),
            sink,
            Arc::new(ShutdownSignal::new()),
        );

        tracing::subscriber::with_default(subscriber, || {
            for _ in 0..10 {
                tracker.dispatch(vec![invalid_settings(), GameEvent::LoadFinished]);
            }
        });

        assert!(tracker.stream_closed);
        assert_eq!(log.contents().matches("Event stream closed").count(), 1);
    }

    #[test]
    fn test_loop_keeps_ticking_without_consumer() {
        let game = GameMemory::new();
        game.set_game_time(5000);
        let provider = MockProcessProvider::new();
        provider.push(Some(game.reader.clone()));
        let (shutdown, stream, handle) = spawn(provider, fast_config());

        assert!(wait_for(Duration::from_secs(2), || game.reader.read_count() > 100));
        drop(stream);
        game.set_refresh_rate(75);

        let reads = game.reader.read_count();
        assert!(wait_for(Duration::from_secs(2), || {
            game.reader.read_count() > reads + 500
        }));

        shutdown.trigger();
        assert_eq!(handle.join().unwrap(), LoopState::Attached);
    }
}
