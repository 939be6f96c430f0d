//! 장부 에러 타입.

use reversal_core::OrderState;
use thiserror::Error;

/// 장부 관련 에러.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// 데이터베이스 에러
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 레코드를 찾을 수 없음
    #[error("Not found: {0}")]
    NotFound(String),

    /// 허용되지 않는 상태 전이
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: OrderState, to: OrderState },

    /// 저장된 값을 도메인 타입으로 변환 실패
    #[error("Decode error: {0}")]
    Decode(String),
}

/// 장부 작업을 위한 Result 타입.
pub type LedgerResult<T> = Result<T, LedgerError>;
