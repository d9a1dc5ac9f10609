mod error;
pub use error::NotificationError;

mod config;
pub use config::{NotificationConfig, ChannelConfig, AndroidConfig};

pub mod notifications;
pub use notifications::{
    Channel,
    Importance,
    NotificationRequest,
    DeliveredNotification,
    ReceivedNotification,
    NotificationBackend,
    NullBackend,
    PlatformBackend,
    is_supported_platform,
};

mod service;
pub use service::NotificationService;

mod logger;
pub use logger::Logger;

pub mod demo;

pub mod prelude {
    pub use crate::{NotificationService, NotificationRequest, NotificationConfig, Logger};
}
