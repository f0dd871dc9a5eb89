//! Progress reporting decoupled from fetch logic.
//!
//! Workers call [`ProgressObserver::inc`] with every chunk of bytes that
//! becomes available, whether freshly downloaded or reused from scratch
//! storage. Calls arrive concurrently from several workers.
use indicatif::ProgressBar;

pub trait ProgressObserver: Send + Sync {
    /// `bytes` just became available.
    fn inc(&self, bytes: u64);

    /// Short human-facing status line. Ignored by default.
    fn message(&self, _msg: String) {}
}

impl<F> ProgressObserver for F
where
    F: Fn(u64) + Send + Sync,
{
    fn inc(&self, bytes: u64) {
        self(bytes)
    }
}

/// Renders progress on an `indicatif` bar.
pub struct ConsoleObserver {
    pub pb: ProgressBar,
}

impl ProgressObserver for ConsoleObserver {
    fn inc(&self, bytes: u64) {
        self.pb.inc(bytes);
    }

    fn message(&self, msg: String) {
        self.pb.set_message(msg);
    }
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn inc(&self, _bytes: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_closure_observer_accumulates() {
        let total = Arc::new(AtomicU64::new(0));
        let counter = total.clone();
        let observer: Arc<dyn ProgressObserver> = Arc::new(move |n: u64| {
            counter.fetch_add(n, Ordering::Relaxed);
        });

        observer.inc(10);
        observer.inc(32);
        observer.message("ignored".into());

        assert_eq!(total.load(Ordering::Relaxed), 42);
    }

    #[test]
    fn test_console_observer_drives_bar() {
        let observer = ConsoleObserver {
            pb: ProgressBar::hidden(),
        };
        observer.inc(5);
        observer.inc(7);
        assert_eq!(observer.pb.position(), 12);
    }
}
