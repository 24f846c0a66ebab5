use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
///
/// Clones share the same window, so one limiter can pace every caller of a
/// vendor across concurrent requests.
#[derive(Clone)]
pub struct RateLimiter {
    name: &'static str,
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(name: &'static str, max_requests: usize, window: Duration) -> Self {
        Self {
            name,
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    pub fn per_minute(name: &'static str, max_requests: usize) -> Self {
        Self::new(name, max_requests, Duration::from_secs(60))
    }

    pub async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let sleep_dur = match ts.front() {
                Some(&oldest) => (oldest + self.window).saturating_duration_since(now),
                None => Duration::ZERO,
            } + Duration::from_millis(50);
            drop(ts);
            tracing::debug!(
                "Rate limiter: waiting {:.1}s for {} slot",
                sleep_dur.as_secs_f64(),
                self.name
            );
            tokio::time::sleep(sleep_dur).await;
        }
    }
}
