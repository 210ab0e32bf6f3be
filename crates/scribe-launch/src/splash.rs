use scribe_core::{AppConfig, SplashScreen};
use std::io::Write;
use std::time::Instant;
use tracing::debug;

/// Startup banner on stderr, standing in for the editor's splash window.
pub struct ConsoleSplash {
    shown_at: Instant,
    open: bool,
}

impl ConsoleSplash {
    pub fn show() -> Self {
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "{} is starting...", AppConfig::APP_NAME);
        Self {
            shown_at: Instant::now(),
            open: true,
        }
    }
}

impl SplashScreen for ConsoleSplash {
    fn close(&mut self) {
        if std::mem::take(&mut self.open) {
            debug!("Splash closed after {:?}", self.shown_at.elapsed());
        }
    }
}

impl Drop for ConsoleSplash {
    fn drop(&mut self) {
        self.close();
    }
}
