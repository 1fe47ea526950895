//! Watchdog heartbeat (§11.5): writes the current time to a file at a
//! fixed interval so an external supervisor (systemd, a process monitor)
//! can detect a wedged daemon that's still alive but no longer servicing.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct Watchdog {
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl Watchdog {
    pub fn start(heartbeat_path: PathBuf, interval: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = shutdown.clone();
        let handle = std::thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                if let Ok(mut f) = std::fs::File::create(&heartbeat_path) {
                    let now = std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_secs();
                    let _ = writeln!(f, "{now}");
                }
                std::thread::sleep(interval);
            }
        });
        Watchdog { shutdown, handle: Some(handle) }
    }

    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}
