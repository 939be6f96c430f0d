//! # Reversal Execution
//!
//! 발주와 정합성 점검의 실행 계층입니다.
//!
//! - `PlacementService` - 거래 의도 검증 및 발주
//! - `ReconciliationEngine` - 주문/포지션 정합 사이클
//! - `SellSideSynchronizer` - 포지션 변동에 따른 미체결 주문 동기화
//! - `RetryRunner` - 실패 주문의 제한된 재시도
//! - `FilledQuantityResolver` - 체결 수량의 단계적 확정

pub mod error;
pub mod locks;
pub mod placement;
pub mod reconciler;
pub mod resolver;
pub mod retry;
pub mod sync;

pub use error::{ExecutionError, ExecutionResult};
pub use locks::SymbolLocks;
pub use placement::PlacementService;
pub use reconciler::ReconciliationEngine;
pub use resolver::{FillSource, FilledQuantityResolver, ResolvedFill};
pub use retry::RetryRunner;
pub use sync::SellSideSynchronizer;
