//! Controller module - the transport controller and its side channels
//!
//! [`PlayerController`] is a cheap, cloneable handle over the playback
//! session and the one live backend. It is organized into submodules by
//! responsibility:
//!
//! - `playback`: Transport operations (play content, pause, seek, queue moves, modes)
//! - `player_events`: Backend event listener and the state machine it drives
//! - `telemetry`: Play records and local history
//!
//! Two locks guard the state. `backend` is held across every operation that
//! talks to the live backend, including a whole teardown-and-initialize
//! transition, so at most one backend is ever live and overlapping
//! `play_content` calls run one after another. `session` is only held for
//! short, await-free updates so snapshots stay responsive during slow
//! initialization. Lock order is always `backend` then `session`.

mod playback;
mod player_events;
pub mod telemetry;

use std::sync::{Arc, Mutex as StdMutex};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

pub use telemetry::{DeviceInfo, NullTelemetrySink, PlayAction, PlayRecord, TelemetrySink};

use crate::backend::{ArticleOptions, BackendContext, PlaybackBackend};
use crate::error::PlayerError;
use crate::model::{
    DEFAULT_HISTORY_CAPACITY, History, HistoryEntry, HistoryStore, PlaybackSession,
    PlaybackSettings, PlaybackState, PlayerSnapshot,
};
use crate::platform::{AudioEngine, BackendEvent, EventSink, Notifier, SpeechSynthesizer, ViewBridge};

/// Everything the player drives but does not own
#[derive(Clone)]
pub struct Capabilities {
    pub audio: Arc<dyn AudioEngine>,
    pub view: Arc<dyn ViewBridge>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub history: Arc<dyn HistoryStore>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Clone, Debug)]
pub struct PlayerOptions {
    pub settings: PlaybackSettings,
    pub article: ArticleOptions,
    pub history_capacity: usize,
    pub device: DeviceInfo,
    /// Fixed seed for shuffle selection
    pub shuffle_seed: Option<u64>,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            settings: PlaybackSettings::default(),
            article: ArticleOptions::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            device: DeviceInfo::detect(),
            shuffle_seed: None,
        }
    }
}

#[derive(Clone)]
pub struct PlayerController {
    pub(crate) session: Arc<Mutex<PlaybackSession>>,
    pub(crate) backend: Arc<Mutex<Option<Box<dyn PlaybackBackend>>>>,
    pub(crate) history: Arc<Mutex<History>>,
    pub(crate) caps: Arc<Capabilities>,
    pub(crate) options: Arc<PlayerOptions>,
    events_tx: mpsc::UnboundedSender<BackendEvent>,
    rng: Arc<StdMutex<StdRng>>,
    listener: Arc<StdMutex<Option<JoinHandle<()>>>>,
}

impl PlayerController {
    /// Build a controller and start its backend event listener. Must be called inside a tokio runtime.
    pub fn new(caps: Capabilities, options: PlayerOptions) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let rng = match options.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let controller = Self {
            session: Arc::new(Mutex::new(PlaybackSession::new(options.settings.clone()))),
            backend: Arc::new(Mutex::new(None)),
            history: Arc::new(Mutex::new(History::new(options.history_capacity))),
            caps: Arc::new(caps),
            options: Arc::new(options),
            events_tx,
            rng: Arc::new(StdMutex::new(rng)),
            listener: Arc::new(StdMutex::new(None)),
        };

        let handle = controller.start_event_listener(events_rx);
        if let Ok(mut listener) = controller.listener.lock() {
            *listener = Some(handle);
        }
        controller
    }

    /// Load persisted history. A missing or unreadable store leaves it empty.
    pub async fn restore_history(&self) {
        match self.caps.history.load().await {
            Ok(entries) => {
                let mut history = self.history.lock().await;
                *history = History::from_entries(entries, self.options.history_capacity);
                tracing::info!(entries = history.len(), "History restored");
            }
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "History could not be loaded");
            }
        }
    }

    pub async fn snapshot(&self) -> PlayerSnapshot {
        self.session.lock().await.snapshot()
    }

    pub async fn state(&self) -> PlaybackState {
        self.session.lock().await.state()
    }

    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().await.entries().to_vec()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
        self.persist_history(&[]).await;
        tracing::info!("History cleared");
    }

    /// Stop the event listener. The controller is unusable for playback afterwards.
    pub async fn shutdown(&self) {
        self.destroy().await;
        let handle = self.listener.lock().ok().and_then(|mut l| l.take());
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("Backend event listener stopped");
        }
    }

    pub(crate) fn backend_context(&self, generation: u64, settings: &PlaybackSettings) -> BackendContext {
        BackendContext {
            audio: self.caps.audio.clone(),
            view: self.caps.view.clone(),
            speech: self.caps.speech.clone(),
            events: EventSink::new(generation, self.events_tx.clone()),
            volume: settings.volume,
            playback_rate: settings.playback_rate,
            tts_enabled: settings.tts_enabled,
            article: self.options.article.clone(),
        }
    }

    /// Run `f` with the shuffle generator.
    pub(crate) fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        match self.rng.lock() {
            Ok(mut rng) => f(&mut rng),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Record `error` on the session, move to `state` and tell the user.
    pub(crate) async fn surface_error(&self, error: PlayerError, state: PlaybackState) -> PlayerError {
        tracing::error!(error = %error, state = ?state, "Playback error");
        {
            let mut session = self.session.lock().await;
            session.error = Some(error.to_string());
            session.state = state;
            session.buffering = false;
        }
        self.caps.notifier.notify(&error.user_message());
        error
    }
}
