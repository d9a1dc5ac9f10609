// Starts the log backend for the current platform so notification diagnostics end up somewhere
//      readable.

//<Android>>>: android_logger, messages go to logcat under the "notifications" tag.

//<iOS, Linux, macOS, Windows>>> env_logger to std output. RUST_LOG still applies on top of the level.

// Level defaults to Warn when None is passed. Opened/received notifications are logged at Info.

pub struct Logger;

impl Logger {
    pub fn start(level: Option<log::Level>) {
        let level = level.unwrap_or(log::Level::Warn);
        #[cfg(target_os="android")]
        {
            android_logger::init_once(
                android_logger::Config::default()
                    .with_max_level(level.to_level_filter())
                    .with_tag("notifications"),
            );
        }

        #[cfg(not(any(target_os="android", target_arch="wasm32")))]
        {
            // A host may already own the global logger.
            if let Err(e) = env_logger::builder().filter_level(level.to_level_filter()).parse_default_env().try_init() {
                log::debug!("logger already started: {}", e);
            }
        }

        #[cfg(target_arch="wasm32")]
        {
            let _ = level;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::sync::{Mutex, Once};
    use std::thread::{self, ThreadId};

    use log::{LevelFilter, Log, Metadata, Record};

    static LINES: Mutex<Vec<(ThreadId, String)>> = Mutex::new(Vec::new());

    /// Global logger for tests. Lines are tagged with the emitting thread so parallel tests
    /// only ever see their own output.
    struct CaptureLogger;

    impl Log for CaptureLogger {
        fn enabled(&self, _metadata: &Metadata) -> bool {true}

        fn log(&self, record: &Record) {
            if let Ok(mut lines) = LINES.lock() {
                lines.push((thread::current().id(), record.args().to_string()));
            }
        }

        fn flush(&self) {}
    }

    static CAPTURE: CaptureLogger = CaptureLogger;

    /// Installs the capturing logger, must run before anything else claims the global slot.
    pub(crate) fn capture_logs() {
        static INSTALL: Once = Once::new();
        INSTALL.call_once(|| {
            if log::set_logger(&CAPTURE).is_ok() {
                log::set_max_level(LevelFilter::Trace);
            }
        });
    }

    /// Lines logged so far by the calling thread that start with `prefix`.
    pub(crate) fn captured(prefix: &str) -> Vec<String> {
        let id = thread::current().id();
        LINES.lock().unwrap().iter()
            .filter(|(thread, line)| *thread == id && line.starts_with(prefix))
            .map(|(_, line)| line.clone())
            .collect()
    }

    #[test]
    fn starting_twice_is_harmless() {
        capture_logs();
        Logger::start(Some(log::Level::Info));
        Logger::start(None);
        log::info!("logger test");
        assert_eq!(captured("logger test"), vec!["logger test".to_string()]);
    }
}
