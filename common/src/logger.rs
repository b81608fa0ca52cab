// Standard library imports
use std::{fs, path::Path};

// Third party imports
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

// Internal imports
use crate::error::{CommonError, CommonResult};

/// Tên file log trong thư mục log
pub const LOG_FILE_PREFIX: &str = "walletscan.log";

/// Khởi tạo tracing subscriber.
///
/// Luôn ghi ra stderr; nếu có `log_dir` thì ghi thêm file xoay vòng theo ngày.
/// Guard trả về phải được giữ tới khi tiến trình kết thúc để flush log file.
pub fn init_logging(log_dir: Option<&str>) -> CommonResult<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::Layer::new()
        .with_writer(std::io::stderr)
        .with_ansi(true);

    match log_dir {
        Some(dir) => {
            if !Path::new(dir).exists() {
                fs::create_dir_all(dir).map_err(|e| CommonError::Logging(e.to_string()))?;
            }
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(
                    fmt::Layer::new()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .try_init()
                .map_err(|e| CommonError::Logging(e.to_string()))?;

            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init()
                .map_err(|e| CommonError::Logging(e.to_string()))?;

            Ok(None)
        }
    }
}
