use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::report::{ReportClient, Transport};
use crate::state::DisplayState;
use crate::types::{PlaybackState, ReportPayload, SourceMessage, TrackInfo};

/// One handler per kind of host notification
pub trait MediaEventHandler {
    fn now_playing_item_changed(&mut self, title: Option<String>, artist: Option<String>);
    fn now_playing_item_cleared(&mut self);
    fn playback_state_changed(&mut self, state: PlaybackState);
}

/// Route a source message to the matching handler
pub fn dispatch<H: MediaEventHandler>(message: SourceMessage, handler: &mut H) {
    match message {
        SourceMessage::NowPlaying { title, artist } => {
            handler.now_playing_item_changed(title, artist);
        }
        SourceMessage::NothingPlaying => handler.now_playing_item_cleared(),
        SourceMessage::PlaybackState { state } => handler.playback_state_changed(state),
        SourceMessage::Status { state, message } => match message {
            Some(message) => log::info!("Media source status: {} - {}", state, message),
            None => log::info!("Media source status: {}", state),
        },
        SourceMessage::Error { message } => {
            log::error!("Media source error: {}", message);
        }
    }
}

/// Forwards accepted now-playing changes to the reporting endpoint.
///
/// All state lives here and is only touched from the event loop, so no
/// locking is needed. Each accepted change fires its own request without
/// waiting on it; nothing is deduplicated, retried or cancelled. Requests
/// still in flight are kept in `reports` until [`drain`](Self::drain).
pub struct NowPlayingReporter<T> {
    display: DisplayState,
    current_track: Option<TrackInfo>,
    client: Arc<ReportClient<T>>,
    reports: JoinSet<()>,
}

impl<T: Transport> NowPlayingReporter<T> {
    pub fn new(client: ReportClient<T>) -> Self {
        Self {
            display: DisplayState::default(),
            current_track: None,
            client: Arc::new(client),
            reports: JoinSet::new(),
        }
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn current_track(&self) -> Option<&TrackInfo> {
        self.current_track.as_ref()
    }

    /// Handle a title/artist pair from the host. Placeholder values are
    /// dropped without touching any state.
    pub fn on_track_changed(&mut self, title: Option<String>, artist: Option<String>) {
        let track = TrackInfo::from_host(title, artist);

        if track.is_placeholder() {
            log::debug!(
                "Ignoring placeholder track: {} - {}",
                track.title,
                track.artist
            );
            return;
        }

        self.display.show_track(&track.title, &track.artist);
        log::info!("Now playing: {}", self.display);

        let payload = ReportPayload::from(&track);
        self.current_track = Some(track);
        self.report(payload);
    }

    pub fn on_playback_state_changed(&mut self, is_playing: bool) {
        self.display.is_playing = is_playing;
        log::debug!("Playback state: {}", self.display);
    }

    /// Fire and forget. Must be called from within a tokio runtime.
    pub fn report(&mut self, payload: ReportPayload) {
        // Reap finished sends so the set only holds in-flight ones
        while self.reports.try_join_next().is_some() {}

        let client = Arc::clone(&self.client);
        self.reports.spawn(async move {
            client.deliver(payload).await;
        });
    }

    /// Wait for every report still in flight. Dropping the reporter instead
    /// would abort them.
    pub async fn drain(&mut self) {
        if !self.reports.is_empty() {
            log::info!("Waiting for {} report(s) in flight", self.reports.len());
        }
        while let Some(result) = self.reports.join_next().await {
            if let Err(e) = result {
                log::error!("Report task failed: {}", e);
            }
        }
    }
}

impl<T: Transport> MediaEventHandler for NowPlayingReporter<T> {
    fn now_playing_item_changed(&mut self, title: Option<String>, artist: Option<String>) {
        self.on_track_changed(title, artist);
    }

    fn now_playing_item_cleared(&mut self) {
        self.display.clear_track();
        log::info!("Now playing: {}", self.display);
    }

    fn playback_state_changed(&mut self, state: PlaybackState) {
        self.on_playback_state_changed(state.is_playing());
    }
}

/// Drain the event queue until it closes or shutdown is requested
pub async fn run<H: MediaEventHandler>(
    mut events: mpsc::Receiver<SourceMessage>,
    handler: &mut H,
    mut shutdown: watch::Receiver<bool>,
) {
    log::info!("Waiting for now-playing events");

    loop {
        tokio::select! {
            message = events.recv() => match message {
                Some(message) => dispatch(message, handler),
                None => {
                    log::warn!("Media source closed its event stream");
                    break;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    log::info!("Shutdown requested, leaving event loop");
                    break;
                }
            }
        }
    }
}
