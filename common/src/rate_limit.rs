// Standard library imports
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

// Third party imports
use async_trait::async_trait;
use tokio::{
    sync::Mutex,
    time::{sleep, Instant},
};
use tracing::trace;

/// Khoảng cách mặc định giữa hai RPC call
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(300);

/// Bộ điều tiết dùng chung cho mọi RPC call đi ra ngoài
#[async_trait]
pub trait RateLimiter: Send + Sync + 'static {
    /// Chờ tới lượt được phát một call mới
    async fn await_turn(&self);
}

/// Rate limiter toàn cục: hai lượt liên tiếp cách nhau ít nhất `min_interval`.
///
/// Lock được giữ trong lúc sleep nên các lượt được cấp tuần tự.
#[derive(Debug)]
pub struct IntervalRateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
    granted: AtomicU64,
}

impl IntervalRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
            granted: AtomicU64::new(0),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Số lượt đã cấp kể từ khi khởi tạo
    pub fn turns_granted(&self) -> u64 {
        self.granted.load(Ordering::Relaxed)
    }
}

impl Default for IntervalRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

#[async_trait]
impl RateLimiter for IntervalRateLimiter {
    async fn await_turn(&self) {
        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                trace!("Rate limiter waiting {:?}", wait);
                sleep(wait).await;
            }
        }

        *last_call = Some(Instant::now());
        self.granted.fetch_add(1, Ordering::Relaxed);
    }
}

/// Không chờ, dùng cho test
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRateLimiter;

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn await_turn(&self) {}
}
