//! Support for a manual test screen: raw text fields turned into a request, and a scrolling
//! log the screen can render.

use std::num::ParseIntError;

use thiserror::Error;

use crate::notifications::{NotificationBackend, NotificationRequest};
use crate::{NotificationError, NotificationService};

const RULE: &str = "-----";

/// Text fields of the test screen, exactly as the user typed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationForm {
    pub title: String,
    pub body: String,
    pub badge: String,
    pub payload: String,
    pub delay: String,
}

impl Default for NotificationForm {
    fn default() -> Self {
        NotificationForm {
            title: "Test notification".to_string(),
            body: "Test message".to_string(),
            badge: "0".to_string(),
            payload: "test data".to_string(),
            delay: "5".to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Invalid number: {0}")]
    Parse(#[from] ParseIntError),

    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl NotificationForm {
    pub fn to_request(&self) -> Result<NotificationRequest, ParseIntError> {
        Ok(NotificationRequest::new(&self.title, &self.body)
            .badge(self.badge.trim().parse()?)
            .fire_delay(self.delay.trim().parse()?)
            .payload(&self.payload))
    }

    /// Sends the form through `service`. Returns false without sending when the platform has
    /// no notifications.
    pub fn submit<B: NotificationBackend>(&self, service: &mut NotificationService<B>) -> Result<bool, FormError> {
        if !service.is_supported_platform() {
            log::warn!("invalid platform.");
            return Ok(false);
        }
        service.send(self.to_request()?)?;
        log::info!("send notification.");
        Ok(true)
    }
}

/// Text log for the test screen, every entry followed by a rule.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer(String);

impl LogBuffer {
    pub fn push(&mut self, line: &str) {
        if self.0.is_empty() {
            self.0.push_str(RULE);
            self.0.push('\n');
        }
        self.0.push_str(line);
        self.0.push('\n');
        self.0.push_str(RULE);
        self.0.push('\n');
    }

    pub fn text(&self) -> &str {&self.0}

    pub fn clear(&mut self) {self.0.clear()}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NotificationConfig;
    use crate::service::tests::RecordingBackend;

    #[test]
    fn default_form_parses() {
        let request = NotificationForm::default().to_request().unwrap();
        assert_eq!(request.title, "Test notification");
        assert_eq!(request.badge_count, 0);
        assert_eq!(request.fire_delay_seconds, 5);
        assert_eq!(request.payload, "test data");
    }

    #[test]
    fn non_numeric_fields_fail() {
        let form = NotificationForm{badge: "many".to_string(), ..Default::default()};
        assert!(form.to_request().is_err());

        let form = NotificationForm{delay: "".to_string(), ..Default::default()};
        assert!(form.to_request().is_err());

        let form = NotificationForm{badge: "-1".to_string(), ..Default::default()};
        assert!(form.to_request().is_err());
    }

    #[test]
    fn submit_sends_on_supported_platform() {
        let mut service = NotificationService::with_backend(RecordingBackend::default(), NotificationConfig::default());
        let form = NotificationForm{delay: "0".to_string(), ..Default::default()};
        assert!(form.submit(&mut service).unwrap());
    }

    #[test]
    fn submit_skips_unsupported_platform() {
        let backend = RecordingBackend{unsupported: true, ..Default::default()};
        let mut service = NotificationService::with_backend(backend, NotificationConfig::default());
        let form = NotificationForm{badge: "oops".to_string(), ..Default::default()};
        assert!(!form.submit(&mut service).unwrap());
    }

    #[test]
    fn submit_propagates_parse_errors() {
        let mut service = NotificationService::with_backend(RecordingBackend::default(), NotificationConfig::default());
        let form = NotificationForm{badge: "oops".to_string(), ..Default::default()};
        assert!(matches!(form.submit(&mut service), Err(FormError::Parse(_))));
    }

    #[test]
    fn log_buffer_separates_entries() {
        let mut buffer = LogBuffer::default();
        buffer.push("one");
        buffer.push("two");
        assert_eq!(buffer.text(), "-----\none\n-----\ntwo\n-----\n");
        buffer.clear();
        assert_eq!(buffer.text(), "");
    }
}
