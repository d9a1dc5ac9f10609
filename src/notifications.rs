// Cross platform local notifications.

//System:

//<Android>: NotificationManager channels, AlarmManager for delayed delivery, launch intent extras
//      to find the notification the user opened.

//<iOS>: UNUserNotificationCenter with a delegate that records responses and foreground deliveries.

//<Everything else>: NullBackend, every call succeeds and does nothing.

// The active backend is picked at compile time through PlatformBackend.

use std::sync::mpsc::Sender;

use serde::{Serialize, Deserialize};

use crate::{NotificationConfig, NotificationError};

#[cfg(target_os = "android")]
mod android;
#[cfg(target_os = "android")]
pub use android::AndroidBackend;

#[cfg(target_os = "ios")]
mod apple;
#[cfg(target_os = "ios")]
pub use apple::IosBackend;

#[cfg(target_os = "android")]
pub type PlatformBackend = AndroidBackend;
#[cfg(target_os = "ios")]
pub type PlatformBackend = IosBackend;
#[cfg(not(any(target_os = "android", target_os = "ios")))]
pub type PlatformBackend = NullBackend;

/// Shortest delay a notification can be scheduled with. Anything sooner may fire before the
/// opened check is able to see it.
pub const MIN_FIRE_DELAY: i64 = 1;

/// True only when built for a mobile target with a real backend.
pub const fn is_supported_platform() -> bool {
    cfg!(any(target_os = "android", target_os = "ios"))
}

/// Builds the backend for the platform this crate was compiled for.
pub fn platform_backend(config: &NotificationConfig) -> Result<PlatformBackend, NotificationError> {
    #[cfg(target_os = "android")]
    {
        AndroidBackend::new(config)
    }

    #[cfg(target_os = "ios")]
    {
        let _ = config;
        IosBackend::new()
    }

    #[cfg(not(any(target_os = "android", target_os = "ios")))]
    {
        let _ = config;
        Ok(NullBackend)
    }
}

#[cfg_attr(not(any(target_os = "android", target_os = "ios")), allow(dead_code))]
pub(crate) fn next_id() -> i32 {
    // Positive so it can double as an Android request code.
    rand::random_range(1..i32::MAX)
}

/// Hands a foreground delivery to the service. Fails only once the service has been dropped.
#[cfg_attr(not(any(target_os = "android", target_os = "ios")), allow(dead_code))]
pub(crate) fn forward(observer: &Sender<ReceivedNotification>, received: ReceivedNotification) {
    if let Err(e) = observer.send(received) {
        log::debug!("dropped received notification {}: service is gone", e.0.id);
    }
}

/// Channels are always registered at high importance so notifications show as heads-up banners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Importance {
    High,
}

/// A delivery channel. Only Android groups notifications this way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub description: String,
    pub importance: Importance,
    pub shows_badge: bool,
}

impl Channel {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Channel {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            importance: Importance::High,
            shows_badge: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    ///Empty means the configured default channel
    pub channel_id: String,
    pub title: String,
    pub body: String,
    pub badge_count: u32,
    pub fire_delay_seconds: i64,
    pub payload: String,
}

impl NotificationRequest {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        NotificationRequest {
            channel_id: String::new(),
            title: title.into(),
            body: body.into(),
            badge_count: 0,
            fire_delay_seconds: MIN_FIRE_DELAY,
            payload: String::new(),
        }
    }

    pub fn channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    pub fn badge(mut self, badge_count: u32) -> Self {
        self.badge_count = badge_count;
        self
    }

    pub fn fire_delay(mut self, seconds: i64) -> Self {
        self.fire_delay_seconds = seconds;
        self
    }

    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }
}

/// The notification the user most recently opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredNotification {
    pub id: String,
    pub title: String,
    pub body: String,
    pub badge_count: u32,
    pub payload: String,
}

/// A notification delivered while the app was in the foreground.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedNotification {
    pub id: String,
    pub channel: String,
    pub title: String,
    pub body: String,
    pub payload: String,
}

/// Capability interface every platform implements. Backends translate their native
/// notification objects into the value types above so callers never branch on platform.
pub trait NotificationBackend {
    fn is_supported(&self) -> bool;

    ///Create or update a channel, a no-op where channels do not exist
    fn register_channel(&mut self, channel: &Channel) -> Result<(), NotificationError>;

    ///The request arrives with its delay already clamped
    fn schedule(&mut self, request: &NotificationRequest) -> Result<(), NotificationError>;

    ///Cancel pending notifications and remove delivered ones
    fn cancel_all(&mut self) -> Result<(), NotificationError>;

    ///A no-op where the platform has no app badge
    fn set_badge(&mut self, count: u32) -> Result<(), NotificationError>;

    ///Foreground deliveries are sent here for the rest of the process lifetime
    fn subscribe(&mut self, observer: Sender<ReceivedNotification>) -> Result<(), NotificationError>;

    ///Backends that cannot push deliveries look for them here
    fn poll_received(&mut self) -> Result<(), NotificationError> {Ok(())}

    fn last_opened(&mut self) -> Result<Option<DeliveredNotification>, NotificationError>;
}

/// Backend for platforms without local notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl NotificationBackend for NullBackend {
    fn is_supported(&self) -> bool {false}
    fn register_channel(&mut self, _channel: &Channel) -> Result<(), NotificationError> {Ok(())}
    fn schedule(&mut self, _request: &NotificationRequest) -> Result<(), NotificationError> {Ok(())}
    fn cancel_all(&mut self) -> Result<(), NotificationError> {Ok(())}
    fn set_badge(&mut self, _count: u32) -> Result<(), NotificationError> {Ok(())}
    fn subscribe(&mut self, _observer: Sender<ReceivedNotification>) -> Result<(), NotificationError> {Ok(())}
    fn last_opened(&mut self) -> Result<Option<DeliveredNotification>, NotificationError> {Ok(None)}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_defaults() {
        let request = NotificationRequest::new("Title", "Body");
        assert_eq!(request.channel_id, "");
        assert_eq!(request.badge_count, 0);
        assert_eq!(request.fire_delay_seconds, MIN_FIRE_DELAY);
        assert_eq!(request.payload, "");

        let request = request.channel("alerts").badge(3).fire_delay(10).payload("x");
        assert_eq!(request.channel_id, "alerts");
        assert_eq!(request.badge_count, 3);
        assert_eq!(request.fire_delay_seconds, 10);
        assert_eq!(request.payload, "x");
    }

    #[test]
    fn null_backend_does_nothing() {
        let mut backend = NullBackend;
        let (tx, _rx) = std::sync::mpsc::channel();
        assert!(!backend.is_supported());
        backend.register_channel(&Channel::new("x", "n", "d")).unwrap();
        backend.schedule(&NotificationRequest::new("t", "b")).unwrap();
        backend.cancel_all().unwrap();
        backend.set_badge(0).unwrap();
        backend.subscribe(tx).unwrap();
        backend.poll_received().unwrap();
        assert_eq!(backend.last_opened().unwrap(), None);
    }

    #[test]
    fn generated_ids_are_positive() {
        for _ in 0..64 {
            assert!(next_id() > 0);
        }
    }

    #[test]
    fn forward_to_dropped_service_is_logged() {
        crate::logger::tests::capture_logs();
        let received = ReceivedNotification{
            id: "R".to_string(),
            channel: "default".to_string(),
            title: "t".to_string(),
            body: "b".to_string(),
            payload: "p".to_string(),
        };

        let (tx, rx) = std::sync::mpsc::channel();
        forward(&tx, received.clone());
        assert_eq!(rx.try_recv().unwrap(), received);

        drop(rx);
        forward(&tx, received);
        assert_eq!(
            crate::logger::tests::captured("dropped received notification"),
            vec!["dropped received notification R: service is gone".to_string()]
        );
    }

    #[cfg(not(any(target_os = "android", target_os = "ios")))]
    #[test]
    fn desktop_is_unsupported() {
        assert!(!is_supported_platform());
        let backend = platform_backend(&NotificationConfig::default()).unwrap();
        assert!(!backend.is_supported());
    }
}
