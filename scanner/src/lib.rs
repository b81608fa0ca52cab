//! Dịch vụ kiểm tra số dư ví: job manager, HTTP API và CLI.

pub mod api;
pub mod cli;
pub mod job_manager;

pub use api::{router, serve, AppState};
pub use job_manager::{
    JobError, JobErrorEntry, JobManager, JobState, JobStats, PollResponse, StatusResponse,
    SubmitResponse, DEFAULT_MAX_WORKERS,
};
