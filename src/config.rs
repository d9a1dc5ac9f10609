use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::NotificationError;
use crate::notifications::Channel;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Settings for the notification service and its platform backend.
/// Every field has a default so a partial JSON document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub default_channel: ChannelConfig,
    ///Seconds between checks for a newly opened notification
    pub poll_interval: f64,
    pub android: AndroidConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AndroidConfig {
    ///Drawable resource name used as the status bar icon
    pub small_icon: String,
    pub large_icon: String,
    ///Fully qualified BroadcastReceiver that posts scheduled notifications
    pub publisher_class: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig {
            default_channel: ChannelConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL.as_secs_f64(),
            android: AndroidConfig::default(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            id: "default".to_string(),
            name: "default_channel".to_string(),
            description: "default_description".to_string(),
        }
    }
}

impl Default for AndroidConfig {
    fn default() -> Self {
        AndroidConfig {
            small_icon: "icon_small".to_string(),
            large_icon: "icon_large".to_string(),
            publisher_class: "org.ramp.notifications.NotificationPublisher".to_string(),
        }
    }
}

impl NotificationConfig {
    pub fn from_json(json: &str) -> Result<Self, NotificationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Poll interval as a duration. Values that are not positive or do not fit a `Duration`
    /// fall back to one second, and the result is never shorter than one millisecond.
    pub fn poll_interval(&self) -> Duration {
        if self.poll_interval > 0.0 {
            if let Ok(interval) = Duration::try_from_secs_f64(self.poll_interval) {
                return interval.max(Duration::from_millis(1));
            }
        }
        DEFAULT_POLL_INTERVAL
    }

    pub fn default_channel(&self) -> Channel {
        Channel::new(
            &self.default_channel.id,
            &self.default_channel.name,
            &self.default_channel.description,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::notifications::Importance;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = NotificationConfig::from_json(r#"{"poll_interval": 0.5}"#).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.default_channel.id, "default");
        assert_eq!(config.android.small_icon, "icon_small");
    }

    #[test]
    fn nested_overrides() {
        let config = NotificationConfig::from_json(
            r#"{"default_channel": {"id": "alerts"}, "android": {"publisher_class": "com.example.Publisher"}}"#
        ).unwrap();
        assert_eq!(config.default_channel.id, "alerts");
        assert_eq!(config.default_channel.name, "default_channel");
        assert_eq!(config.android.publisher_class, "com.example.Publisher");
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = NotificationConfig::from_json("{poll").unwrap_err();
        assert!(matches!(err, NotificationError::Config(_)));
    }

    #[test]
    fn bad_interval_falls_back() {
        for poll_interval in [-3.0, 0.0, f64::NAN, f64::INFINITY] {
            let config = NotificationConfig { poll_interval, ..Default::default() };
            assert_eq!(config.poll_interval(), Duration::from_secs(1));
        }
    }

    #[test]
    fn huge_interval_falls_back() {
        let config = NotificationConfig::from_json(r#"{"poll_interval": 1e30}"#).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn tiny_interval_is_floored() {
        let config = NotificationConfig { poll_interval: 1e-9, ..Default::default() };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn default_channel_is_high_importance() {
        let channel = NotificationConfig::default().default_channel();
        assert_eq!(channel.id, "default");
        assert_eq!(channel.importance, Importance::High);
        assert!(channel.shows_badge);
    }
}
