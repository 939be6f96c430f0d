//! 실행 계층 에러 타입.

use reversal_ledger::LedgerError;
use reversal_venue::VenueError;
use thiserror::Error;

/// 실행 계층 에러.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// 장부 에러
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// venue 에러
    #[error("Venue error: {0}")]
    Venue(#[from] VenueError),

    /// 사전 검증 실패
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// 실행 작업을 위한 Result 타입.
pub type ExecutionResult<T> = Result<T, ExecutionError>;
