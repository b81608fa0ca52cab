// Standard library imports
use std::sync::atomic::{AtomicUsize, Ordering};

// Third party imports
use tracing::trace;

// Internal imports
use walletscan_common::error::{CommonError, CommonResult};

/// Danh sách RPC endpoint của một chain, chọn theo vòng tròn (round-robin).
///
/// Cursor được cập nhật nguyên tử nên nhiều worker có thể xoay cùng lúc
/// mà không bỏ sót hay lặp chỉ số.
#[derive(Debug)]
pub struct EndpointPool {
    chain: String,
    endpoints: Vec<String>,
    cursor: AtomicUsize,
}

impl EndpointPool {
    /// Tạo pool mới, danh sách endpoint không được rỗng
    pub fn new(chain: impl Into<String>, endpoints: Vec<String>) -> CommonResult<Self> {
        let chain = chain.into();
        if endpoints.is_empty() {
            return Err(CommonError::InvalidConfig(format!(
                "endpoint pool for {} is empty",
                chain
            )));
        }

        Ok(Self {
            chain,
            endpoints,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Tiến cursor và trả về endpoint kế tiếp
    pub fn rotate(&self) -> &str {
        let len = self.endpoints.len();
        let previous = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
            .unwrap_or_else(|c| c);
        let index = (previous + 1) % len;

        trace!("{} rotated to endpoint #{}", self.chain, index);
        &self.endpoints[index]
    }

    /// Endpoint tại vị trí cursor hiện tại, không xoay
    pub fn current(&self) -> &str {
        &self.endpoints[self.cursor.load(Ordering::Acquire) % self.endpoints.len()]
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
