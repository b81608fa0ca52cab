// Standard library imports
use std::{
    any::Any,
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

// Third party imports
use chrono::{DateTime, Utc};
use futures::FutureExt;
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::{watch, Semaphore},
    task::JoinSet,
};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

// Internal imports
use walletscan_blockchain::classify;
use walletscan_wallet::{BalanceSheet, WalletResolver, WalletResult};

/// Số worker mặc định cho mỗi job
pub const DEFAULT_MAX_WORKERS: usize = 20;

/// Lỗi của job manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(String),
}

/// Trạng thái job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Done,
}

/// Một dòng trong log lỗi của job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobErrorEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub error: String,
}

/// Snapshot thống kê của job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStats {
    pub total: usize,
    pub valid: usize,
    pub checked: usize,
    /// Số kết quả đã ghi vào log
    pub positive_shown: usize,
    pub status: JobState,
    pub errors_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub total: usize,
    pub valid: usize,
    pub invalid: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollResponse {
    pub new_results: Vec<WalletResult>,
    pub stats: JobStats,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub stats: JobStats,
    pub invalid: Vec<String>,
    pub errors: Vec<JobErrorEntry>,
}

/// Job trong registry
struct Job {
    /// Địa chỉ hợp lệ (đã trim) chờ tra cứu
    addresses: Vec<String>,
    include_empty: bool,
    total: usize,
    valid: usize,
    checked: usize,
    results: Vec<WalletResult>,
    invalid: Vec<String>,
    errors: Vec<JobErrorEntry>,
    state: JobState,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    completion: watch::Sender<bool>,
}

impl Job {
    fn stats(&self) -> JobStats {
        JobStats {
            total: self.total,
            valid: self.valid,
            checked: self.checked,
            positive_shown: self.results.len(),
            status: self.state,
            errors_count: self.errors.len(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

struct Inner {
    jobs: Mutex<HashMap<String, Job>>,
    resolver: Arc<dyn WalletResolver>,
    max_workers: usize,
}

impl Inner {
    fn jobs(&self) -> MutexGuard<'_, HashMap<String, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_result(&self, job_id: &str, mut result: WalletResult) {
        result.positive = result.balances.is_positive();

        let mut jobs = self.jobs();
        if let Some(job) = jobs.get_mut(job_id) {
            job.checked += 1;
            if result.positive || job.include_empty {
                job.results.push(result);
            }
        }
    }

    fn record_error(&self, job_id: &str, address: Option<String>, error: String, counts_as_checked: bool) {
        let mut jobs = self.jobs();
        if let Some(job) = jobs.get_mut(job_id) {
            if counts_as_checked {
                job.checked += 1;
            }
            job.errors.push(JobErrorEntry { address, error });
        }
    }

    fn finish(&self, job_id: &str) {
        let mut jobs = self.jobs();
        if let Some(job) = jobs.get_mut(job_id) {
            if job.state == JobState::Done {
                return;
            }
            job.state = JobState::Done;
            job.finished_at = Some(Utc::now());
            job.completion.send_replace(true);
            counter!("jobs_completed_total", 1);
            info!(
                "Job {} done: {}/{} checked, {} shown, {} errors",
                job_id,
                job.checked,
                job.valid,
                job.results.len(),
                job.errors.len()
            );
        }
    }
}

/// Quản lý job kiểm tra số dư: nhận địa chỉ, chạy nền với pool worker giới hạn,
/// cho phép poll kết quả theo cursor.
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
    tracker: TaskTracker,
}

impl JobManager {
    /// Tạo job manager mới
    pub fn new(resolver: Arc<dyn WalletResolver>, max_workers: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(HashMap::new()),
                resolver,
                max_workers: max_workers.max(1),
            }),
            tracker: TaskTracker::new(),
        }
    }

    /// Nhận danh sách địa chỉ và chạy nền, trả về ngay.
    ///
    /// Phải gọi trong tokio runtime.
    pub fn submit(&self, addresses: Vec<String>, include_empty: bool) -> SubmitResponse {
        let total = addresses.len();
        let mut valid = Vec::new();
        let mut invalid = Vec::new();

        for raw in addresses {
            let trimmed = raw.trim();
            if trimmed.is_empty() || !classify(trimmed).is_supported() {
                invalid.push(raw);
            } else {
                valid.push(trimmed.to_string());
            }
        }

        let job_id = Uuid::new_v4().simple().to_string();
        let (completion, _) = watch::channel(false);
        let queued = valid.len();
        let job = Job {
            addresses: valid,
            include_empty,
            total,
            valid: queued,
            checked: 0,
            results: Vec::new(),
            invalid: invalid.clone(),
            errors: Vec::new(),
            state: JobState::Running,
            started_at: Utc::now(),
            finished_at: None,
            completion,
        };
        self.inner.jobs().insert(job_id.clone(), job);

        counter!("jobs_submitted_total", 1);
        info!(
            "Job {} submitted: {} addresses, {} valid, {} invalid",
            job_id,
            total,
            queued,
            invalid.len()
        );

        let response = SubmitResponse {
            job_id: job_id.clone(),
            total,
            valid: queued,
            invalid,
        };

        let inner = self.inner.clone();
        self.tracker.spawn(Self::dispatch(inner, job_id));
        response
    }

    /// Kết quả từ vị trí `since` trở đi
    pub fn poll(&self, job_id: &str, since: usize) -> Result<PollResponse, JobError> {
        let jobs = self.inner.jobs();
        let job = jobs
            .get(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        let new_results = job.results.get(since..).map(<[_]>::to_vec).unwrap_or_default();
        Ok(PollResponse {
            new_results,
            stats: job.stats(),
            done: job.state == JobState::Done,
        })
    }

    /// Snapshot thống kê và danh sách địa chỉ không hợp lệ
    pub fn status(&self, job_id: &str) -> Result<StatusResponse, JobError> {
        let jobs = self.inner.jobs();
        let job = jobs
            .get(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        Ok(StatusResponse {
            stats: job.stats(),
            invalid: job.invalid.clone(),
            errors: job.errors.clone(),
        })
    }

    /// Chờ tới khi job chuyển sang `done`
    pub async fn wait(&self, job_id: &str) -> Result<(), JobError> {
        let mut receiver = {
            let jobs = self.inner.jobs();
            let job = jobs
                .get(job_id)
                .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
            job.completion.subscribe()
        };

        loop {
            if *receiver.borrow_and_update() {
                return Ok(());
            }
            if receiver.changed().await.is_err() {
                return Ok(());
            }
        }
    }

    /// Số job đang chạy nền
    pub fn running_jobs(&self) -> usize {
        self.tracker.len()
    }

    /// Ngừng nhận job mới vào tracker và chờ các job đang chạy, tối đa `grace`.
    ///
    /// Trả về `true` nếu mọi job đã xong.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let running = self.tracker.len();
        if running > 0 {
            info!("Waiting up to {:?} for {} running jobs", grace, running);
        }

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    "Shutdown grace period elapsed with {} jobs still running",
                    self.tracker.len()
                );
                false
            }
        }
    }

    async fn dispatch(inner: Arc<Inner>, job_id: String) {
        let outcome = AssertUnwindSafe(Self::run_workers(inner.clone(), &job_id))
            .catch_unwind()
            .await;

        if let Err(panic) = outcome {
            let message = panic_message(panic.as_ref());
            error!("Job {} dispatch failed: {}", job_id, message);
            inner.record_error(&job_id, None, format!("job-failed: {}", message), false);
        }
        inner.finish(&job_id);
    }

    async fn run_workers(inner: Arc<Inner>, job_id: &str) {
        let addresses = inner
            .jobs()
            .get(job_id)
            .map(|job| job.addresses.clone())
            .unwrap_or_default();
        let workers = inner.max_workers.min(addresses.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        debug!("Job {} dispatching with {} workers", job_id, workers);

        let mut set = JoinSet::new();
        for address in addresses {
            let semaphore = semaphore.clone();
            let resolver = inner.resolver.clone();

            set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (address, Err(format!("worker pool closed: {}", e))),
                };

                let outcome = AssertUnwindSafe(resolver.get_balance(&address))
                    .catch_unwind()
                    .await;
                let outcome = match outcome {
                    Ok(Ok(result)) => Ok(result),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(panic) => Err(format!("worker panicked: {}", panic_message(panic.as_ref()))),
                };
                (address, outcome)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(result))) => inner.record_result(job_id, result),
                Ok((address, Err(e))) => {
                    warn!("Job {} failed to check {}: {}", job_id, address, e);
                    inner.record_error(job_id, Some(address), e, true);
                }
                Err(e) => {
                    warn!("Job {} worker task failed: {}", job_id, e);
                    inner.record_error(job_id, None, format!("worker-failed: {}", e), true);
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ethers::types::{Address, U256};
    use mockall::mock;
    use std::{
        str::FromStr,
        sync::atomic::{AtomicUsize, Ordering},
    };
    use walletscan_blockchain::{
        chain_adapters::mock::{FakeEvmRpc, FakeSolanaRpc, FakeTronApi},
        RpcError, WalletFamily,
    };
    use walletscan_common::{EvmChainConfig, NoopRateLimiter, ScannerConfig, TokenConfig};
    use walletscan_wallet::{
        BalanceItem, BalanceResolver, FamilyBalances, OverallStatus, ResolveError, TronBalances,
    };

    const EVM_ZERO: &str = "0x0000000000000000000000000000000000000000";
    const TRON_ADDRESS: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
    const SOL_ADDRESS: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
    const USDT_ETH: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";

    mock! {
        pub Resolver {}

        #[async_trait]
        impl WalletResolver for Resolver {
            async fn get_balance(&self, address: &str) -> Result<WalletResult, ResolveError>;
        }
    }

    fn fake_resolver(
        config: &ScannerConfig,
        evm: FakeEvmRpc,
        tron: FakeTronApi,
        solana: FakeSolanaRpc,
    ) -> Arc<dyn WalletResolver> {
        Arc::new(
            BalanceResolver::new(
                config,
                Arc::new(NoopRateLimiter),
                Arc::new(evm),
                Arc::new(tron),
                Arc::new(solana),
            )
            .unwrap(),
        )
    }

    fn eth_only_config() -> ScannerConfig {
        let mut config = ScannerConfig::new();
        config.evm_chains = vec![EvmChainConfig {
            name: "ETH".to_string(),
            endpoints: vec!["http://a".to_string(), "http://b".to_string()],
            tokens: vec![
                TokenConfig::new("USDT", USDT_ETH, 6),
                TokenConfig::new("USDC", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6),
            ],
        }];
        config
    }

    fn tron_result(address: &str, trx: f64) -> WalletResult {
        WalletResult::new(
            address,
            WalletFamily::Trx,
            FamilyBalances::Tron(TronBalances {
                native: BalanceItem::success("TRX", trx),
                tokens: Default::default(),
            }),
        )
    }

    async fn run(manager: &JobManager, addresses: &[&str], include_empty: bool) -> String {
        let submitted = manager.submit(
            addresses.iter().map(|a| a.to_string()).collect(),
            include_empty,
        );
        manager.wait(&submitted.job_id).await.unwrap();
        submitted.job_id
    }

    #[tokio::test]
    async fn test_all_zero_evm_wallet_hidden_unless_include_empty() {
        let config = ScannerConfig::new();
        let resolver = fake_resolver(
            &config,
            FakeEvmRpc::new(),
            FakeTronApi::new(),
            FakeSolanaRpc::new(),
        );
        let manager = JobManager::new(resolver, DEFAULT_MAX_WORKERS);

        let hidden = run(&manager, &[EVM_ZERO], false).await;
        let poll = manager.poll(&hidden, 0).unwrap();
        assert!(poll.done);
        assert!(poll.new_results.is_empty());
        assert_eq!(poll.stats.checked, 1);
        assert_eq!(poll.stats.status, JobState::Done);
        assert!(poll.stats.finished_at.is_some());

        let shown = run(&manager, &[EVM_ZERO], true).await;
        let poll = manager.poll(&shown, 0).unwrap();
        assert!(poll.done);
        assert_eq!(poll.new_results.len(), 1);
        assert!(!poll.new_results[0].positive);
        assert_eq!(poll.stats.positive_shown, 1);
    }

    #[tokio::test]
    async fn test_tron_wallet_end_to_end() {
        let config = ScannerConfig::new();
        let tron = FakeTronApi::new()
            .with_account(Ok(1_000_000))
            .with_constant(&config.tron.usdt_contract, Ok(format!("{:0>64}", "2625a0")));
        let resolver = fake_resolver(&config, FakeEvmRpc::new(), tron, FakeSolanaRpc::new());
        let manager = JobManager::new(resolver, DEFAULT_MAX_WORKERS);

        let job_id = run(&manager, &[TRON_ADDRESS], false).await;
        let poll = manager.poll(&job_id, 0).unwrap();

        assert_eq!(poll.new_results.len(), 1);
        let result = &poll.new_results[0];
        assert_eq!(result.family, WalletFamily::Trx);
        assert_eq!(result.balances.native()["TRX"].balance, 1.0);
        assert_eq!(result.balances.tokens()["TRX"]["USDT"].balance, 2.5);
        assert_eq!(result.status, OverallStatus::Success);
        assert!(result.positive);
    }

    #[tokio::test]
    async fn test_batch_with_one_failed_token() {
        let config = eth_only_config();
        let failing = Address::from_str(USDT_ETH).unwrap();
        let evm = FakeEvmRpc::new()
            .with_native(|_, _| Ok(U256::exp10(18)))
            .with_token(move |_, token, _| {
                if token == failing {
                    Err(RpcError::Rpc("execution reverted".into()))
                } else {
                    Ok(U256::from(1_000_000u64))
                }
            });
        let tron = FakeTronApi::new()
            .with_account(Ok(3_000_000))
            .with_constant(&config.tron.usdt_contract, Ok(format!("{:0>64}", "0")));
        let solana = FakeSolanaRpc::new().with_balance(Ok(1_000_000_000));
        let resolver = fake_resolver(&config, evm, tron, solana);
        let manager = JobManager::new(resolver, DEFAULT_MAX_WORKERS);

        let job_id = run(&manager, &[EVM_ZERO, TRON_ADDRESS, SOL_ADDRESS], true).await;
        let poll = manager.poll(&job_id, 0).unwrap();

        assert!(poll.done);
        assert_eq!(poll.stats.checked, 3);
        assert_eq!(poll.new_results.len(), 3);

        for result in &poll.new_results {
            match result.family {
                WalletFamily::Evm => {
                    assert_eq!(result.status, OverallStatus::Partial);
                    let tokens = result.balances.tokens();
                    assert!(tokens["ETH"]["USDT"].status.is_error());
                    assert_eq!(tokens["ETH"]["USDC"].balance, 1.0);
                }
                _ => assert_eq!(result.status, OverallStatus::Success),
            }
            assert!(result.positive);
        }
    }

    #[tokio::test]
    async fn test_submit_splits_invalid_inputs() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_get_balance()
            .withf(|address| address.to_string() == TRON_ADDRESS)
            .times(1)
            .returning(|address| Ok(tron_result(address, 0.0)));
        let manager = JobManager::new(Arc::new(resolver), DEFAULT_MAX_WORKERS);

        let submitted = manager.submit(
            vec![
                "".to_string(),
                "   ".to_string(),
                "hello".to_string(),
                format!("  {}  ", TRON_ADDRESS),
            ],
            false,
        );
        assert_eq!(submitted.total, 4);
        assert_eq!(submitted.valid, 1);
        assert_eq!(submitted.invalid, vec!["", "   ", "hello"]);

        manager.wait(&submitted.job_id).await.unwrap();
        let status = manager.status(&submitted.job_id).unwrap();
        assert_eq!(status.invalid.len(), 3);
        assert_eq!(status.stats.checked, 1);
        assert_eq!(status.stats.total, 4);
    }

    #[tokio::test]
    async fn test_empty_job_finishes() {
        let manager = JobManager::new(Arc::new(MockResolver::new()), DEFAULT_MAX_WORKERS);
        let job_id = run(&manager, &["nope"], false).await;
        let status = manager.status(&job_id).unwrap();
        assert_eq!(status.stats.valid, 0);
        assert_eq!(status.stats.status, JobState::Done);
    }

    #[tokio::test]
    async fn test_resolver_errors_are_logged_and_counted() {
        let mut resolver = MockResolver::new();
        resolver.expect_get_balance().returning(|address| {
            if address.ends_with('t') {
                Err(ResolveError::Config("boom".to_string()))
            } else {
                Ok(tron_result(address, 5.0))
            }
        });
        let manager = JobManager::new(Arc::new(resolver), DEFAULT_MAX_WORKERS);

        let job_id = run(
            &manager,
            &[TRON_ADDRESS, "TJCnKsPa7y5okkXvQAidZBzqx3QyQ6sxMW"],
            false,
        )
        .await;

        let status = manager.status(&job_id).unwrap();
        assert_eq!(status.stats.checked, 2);
        assert_eq!(status.stats.errors_count, 1);
        assert_eq!(status.errors[0].address.as_deref(), Some(TRON_ADDRESS));
        assert!(status.errors[0].error.contains("boom"));
        assert_eq!(status.stats.positive_shown, 1);
    }

    struct PanickingResolver;

    #[async_trait]
    impl WalletResolver for PanickingResolver {
        async fn get_balance(&self, address: &str) -> Result<WalletResult, ResolveError> {
            if address.starts_with("0x") {
                panic!("resolver exploded");
            }
            Ok(tron_result(address, 1.0))
        }
    }

    #[tokio::test]
    async fn test_worker_panic_does_not_stop_job() {
        let manager = JobManager::new(Arc::new(PanickingResolver), DEFAULT_MAX_WORKERS);

        let job_id = run(&manager, &[TRON_ADDRESS, EVM_ZERO], true).await;
        let status = manager.status(&job_id).unwrap();
        assert_eq!(status.stats.status, JobState::Done);
        assert_eq!(status.stats.checked, 2);
        assert_eq!(status.stats.errors_count, 1);
        assert_eq!(status.stats.positive_shown, 1);
        assert_eq!(status.errors[0].address.as_deref(), Some(EVM_ZERO));
        assert!(status.errors[0].error.contains("resolver exploded"));
    }

    #[tokio::test]
    async fn test_poll_is_idempotent_and_cursor_bounded() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_get_balance()
            .returning(|address| Ok(tron_result(address, 1.0)));
        let manager = JobManager::new(Arc::new(resolver), DEFAULT_MAX_WORKERS);

        let job_id = run(&manager, &[TRON_ADDRESS], false).await;

        let first = manager.poll(&job_id, 1).unwrap();
        let second = manager.poll(&job_id, 1).unwrap();
        assert!(first.new_results.is_empty());
        assert_eq!(first.new_results, second.new_results);
        assert_eq!(first.stats, second.stats);

        let everything = manager.poll(&job_id, 0).unwrap();
        assert_eq!(everything.new_results.len(), 1);
        assert!(manager.poll(&job_id, 100).unwrap().new_results.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let manager = JobManager::new(Arc::new(MockResolver::new()), DEFAULT_MAX_WORKERS);
        assert_eq!(
            manager.poll("missing", 0).unwrap_err(),
            JobError::NotFound("missing".to_string())
        );
        assert!(manager.status("missing").is_err());
        assert!(manager.wait("missing").await.is_err());
    }

    struct SlowResolver {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl WalletResolver for SlowResolver {
        async fn get_balance(&self, address: &str) -> Result<WalletResult, ResolveError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(tron_result(address, 1.0))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_worker_pool_is_bounded() {
        let resolver = Arc::new(SlowResolver {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let manager = JobManager::new(resolver.clone(), 2);

        let addresses = vec![TRON_ADDRESS; 8];
        let job_id = run(&manager, &addresses, true).await;

        assert!(resolver.peak.load(Ordering::SeqCst) <= 2);
        let poll = manager.poll(&job_id, 0).unwrap();
        assert_eq!(poll.stats.checked, 8);
        assert_eq!(poll.new_results.len(), 8);
    }

    #[tokio::test]
    async fn test_shutdown_drains_running_jobs() {
        let resolver = Arc::new(SlowResolver {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let manager = JobManager::new(resolver, 4);
        let submitted = manager.submit(vec![TRON_ADDRESS.to_string(); 4], false);

        assert!(manager.shutdown(Duration::from_secs(5)).await);
        assert_eq!(manager.running_jobs(), 0);
        let poll = manager.poll(&submitted.job_id, 0).unwrap();
        assert!(poll.done);
        assert_eq!(poll.stats.checked, 4);
    }
}
