use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use crate::{NotificationConfig, NotificationError};
use crate::notifications::{
    self, Channel, DeliveredNotification, NotificationBackend, NotificationRequest,
    PlatformBackend, ReceivedNotification, MIN_FIRE_DELAY,
};

/// Uniform entry point for local notifications.
///
/// The host drives it from a single thread: `initialize` once at start, `update` every
/// tick with the elapsed time, and `on_pause` on every pause/resume transition.
/// Every `poll_interval` the backend is asked which notification was last opened,
/// and `last_opened_notification` is replaced when the id differs from the held one.
pub struct NotificationService<B: NotificationBackend = PlatformBackend> {
    backend: B,
    config: NotificationConfig,
    last_opened: Option<DeliveredNotification>,
    check_timer: Duration,
    received: Option<Receiver<ReceivedNotification>>,
    initialized: bool,
}

impl NotificationService<PlatformBackend> {
    /// Service over the backend for the platform this crate was compiled for.
    pub fn new(config: NotificationConfig) -> Result<Self, NotificationError> {
        let backend = notifications::platform_backend(&config)?;
        Ok(Self::with_backend(backend, config))
    }
}

impl<B: NotificationBackend> NotificationService<B> {
    pub fn with_backend(backend: B, config: NotificationConfig) -> Self {
        NotificationService{
            backend,
            config,
            last_opened: None,
            check_timer: Duration::ZERO,
            received: None,
            initialized: false,
        }
    }

    /// Registers the default channel, subscribes to foreground deliveries and clears the badge
    /// left over from a previous run. Later calls do nothing, and a retry after a failure does
    /// not subscribe a second time.
    pub fn initialize(&mut self) -> Result<(), NotificationError> {
        if self.initialized {
            log::debug!("notification service already initialized");
            return Ok(());
        }

        self.backend.register_channel(&self.config.default_channel())?;

        if self.received.is_none() {
            let (sender, receiver) = mpsc::channel();
            self.backend.subscribe(sender)?;
            self.received = Some(receiver);
        }

        self.clear_badge()?;
        self.initialized = true;
        Ok(())
    }

    pub fn is_supported_platform(&self) -> bool {
        self.backend.is_supported()
    }

    pub fn register_channel(&mut self, id: &str, name: &str, description: &str) -> Result<(), NotificationError> {
        self.backend.register_channel(&Channel::new(id, name, description))
    }

    /// Schedules a local notification. Delays under one second are raised to one second and an
    /// empty channel id falls back to the configured default channel.
    pub fn send(&mut self, mut request: NotificationRequest) -> Result<(), NotificationError> {
        if request.fire_delay_seconds < MIN_FIRE_DELAY {
            request.fire_delay_seconds = MIN_FIRE_DELAY;
        }
        if request.channel_id.is_empty() {
            request.channel_id = self.config.default_channel.id.clone();
        }
        self.backend.schedule(&request)
    }

    /// Cancels pending notifications, removes delivered ones and resets the badge.
    pub fn clear_all(&mut self) -> Result<(), NotificationError> {
        self.backend.cancel_all()?;
        self.clear_badge()
    }

    pub fn clear_badge(&mut self) -> Result<(), NotificationError> {
        self.backend.set_badge(0)
    }

    pub fn last_opened_notification(&self) -> Option<&DeliveredNotification> {
        self.last_opened.as_ref()
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    /// Per tick hook. Returns the record when this tick detected a newly opened notification.
    pub fn update(&mut self, delta: Duration) -> Result<Option<&DeliveredNotification>, NotificationError> {
        if !self.is_supported_platform() {
            return Ok(None);
        }

        self.log_received();

        self.check_timer += delta;
        if self.check_timer < self.config.poll_interval() {
            return Ok(None);
        }
        self.check_timer = Duration::ZERO;

        self.backend.poll_received()?;
        self.log_received();

        let updated = match self.backend.last_opened()? {
            Some(opened) if self.last_opened.as_ref().is_none_or(|held| held.id != opened.id) => {
                log::info!(
                    "notification opened: id={} title={} body={} badge={} payload={}",
                    opened.id, opened.title, opened.body, opened.badge_count, opened.payload
                );
                self.last_opened = Some(opened);
                true
            }
            _ => false,
        };

        Ok(if updated {self.last_opened.as_ref()} else {None})
    }

    /// Host pause/resume hook. Resuming clears the badge and makes the next tick poll at once.
    pub fn on_pause(&mut self, paused: bool) -> Result<(), NotificationError> {
        if paused {return Ok(());}
        self.clear_badge()?;
        self.check_timer = self.config.poll_interval();
        Ok(())
    }

    fn log_received(&self) {
        if let Some(receiver) = &self.received {
            for received in receiver.try_iter() {
                log::info!(
                    "notification received: id={} channel={} title={} body={} payload={}",
                    received.id, received.channel, received.title, received.body, received.payload
                );
            }
        }
    }
}
