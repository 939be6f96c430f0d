//! # Reversal Venue
//!
//! venue 중립적인 실행 게이트웨이를 제공합니다.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `ExecutionVenue` trait - 발주/조회/취소/정정의 통합 인터페이스
//! - venue 응답의 정규화 타입 (상태, 체결 수량, 거부 사유)
//! - 재시도 가능성 분류를 포함한 에러 분류 체계
//! - 제한된 지수 백오프 정책
//! - HMAC 서명 기반 범용 REST 어댑터
//! - 테스트용 스크립트형 venue

pub mod backoff;
pub mod error;
pub mod rest;
pub mod scripted;
pub mod traits;

pub use backoff::{RetryDecision, RetryPolicy};
pub use error::VenueError;
pub use rest::{RestVenue, RestVenueConfig};
pub use scripted::{RecordedCall, ScriptedVenue};
pub use traits::{
    ExecutionVenue, HistoryRange, VenueExecution, VenueOrderState, VenueOrderStatus, VenueResult,
};
