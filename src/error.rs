use thiserror::Error;

/// Errors surfaced by a notification backend or by configuration loading.
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification backend failed: {0}")]
    Backend(String),

    #[cfg(target_os = "android")]
    #[error("JNI call failed: {0}")]
    Jni(#[from] jni::errors::Error),

    #[error("Notification center must be used from the main thread")]
    NotMainThread,

    #[error("Invalid notification config: {0}")]
    Config(#[from] serde_json::Error),
}
