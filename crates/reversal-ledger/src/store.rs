//! 저장소 trait 정의.
//!
//! 정합 엔진과 발주 서비스는 이 trait에만 의존합니다.
//! 운영은 `PgLedger`, 테스트는 `MemoryLedger`가 구현합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reversal_core::{
    NewPosition, OrderFilter, OrderRecord, PositionEvent, PositionRecord, Price, Quantity,
    ReviewFlag, Symbol,
};
use uuid::Uuid;

use crate::error::LedgerResult;

/// 체결 반영 결과.
///
/// 체결 반영은 (스냅샷 당시 체결 수량)을 기대값으로 하는 CAS입니다.
/// 락 해제 구간 동안 다른 경로가 주문을 변이시켰다면 `Stale`을 돌려주고,
/// 호출자는 이번 사이클에서 해당 주문을 건너뜁니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// 반영됨. 전량 체결로 `Executed` 전이가 일어났으면 `fully_filled`.
    Applied { fully_filled: bool },
    /// 기대한 체결 수량과 불일치 (동시 변이 감지)
    Stale,
    /// 주문이 더 이상 `Pending`이 아님
    NotOpen,
}

/// 주문 저장소.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// 새 주문을 저장합니다.
    async fn create_order(&self, order: &OrderRecord) -> LedgerResult<()>;

    /// 주문을 ID로 조회합니다.
    async fn get_order(&self, id: Uuid) -> LedgerResult<Option<OrderRecord>>;

    /// 필터에 일치하는 주문을 발주 시각 순으로 조회합니다.
    async fn list_orders(&self, filter: &OrderFilter) -> LedgerResult<Vec<OrderRecord>>;

    /// venue가 발급한 주문 ID를 기록합니다.
    async fn set_broker_order_id(&self, id: Uuid, broker_order_id: &str) -> LedgerResult<()>;

    /// 마지막 상태 조회 시각을 갱신합니다.
    async fn touch_status_check(&self, id: Uuid, at: DateTime<Utc>) -> LedgerResult<()>;

    /// 체결 수량을 CAS로 반영합니다.
    ///
    /// `expected_filled`가 저장된 체결 수량과 일치할 때만 반영하며,
    /// 새 체결 수량이 주문 수량에 도달하면 같은 변이 안에서
    /// `Executed`로 전이하고 `execution_time`을 기록합니다.
    async fn apply_fill(
        &self,
        id: Uuid,
        expected_filled: Quantity,
        new_filled: Quantity,
        avg_price: Option<Price>,
    ) -> LedgerResult<FillOutcome>;

    /// venue 거부로 터미널 전이합니다.
    async fn mark_rejected(&self, id: Uuid, reason: &str) -> LedgerResult<()>;

    /// 취소로 터미널 전이합니다.
    async fn mark_cancelled(&self, id: Uuid, reason: Option<&str>) -> LedgerResult<()>;

    /// 제출 실패를 기록합니다.
    ///
    /// `first_failed_at`은 비어 있을 때만 설정되며 (같은 변이 안에서),
    /// 이후의 실패가 이를 덮어쓰지 않습니다. 재시도 백오프의 기준 시각입니다.
    async fn mark_failed(&self, id: Uuid, reason: &str) -> LedgerResult<()>;

    /// 재시도 승인 (`Failed -> RetryPending`).
    async fn mark_retry_pending(&self, id: Uuid) -> LedgerResult<()>;

    /// 재제출 시작 (`RetryPending -> Pending`, 재시도 횟수 증가).
    ///
    /// 이전 venue 주문 ID는 무효이므로 함께 비웁니다.
    async fn mark_pending_for_retry(&self, id: Uuid) -> LedgerResult<()>;

    /// 소속 포지션 종료에 따른 마감 (`Executed -> Closed`).
    async fn mark_closed(&self, id: Uuid) -> LedgerResult<()>;

    /// 미체결 주문의 의도 수량/지정가를 갱신합니다 (venue 정정 후 호출).
    async fn update_order_quantity(
        &self,
        id: Uuid,
        quantity: Quantity,
        limit_price: Option<Price>,
    ) -> LedgerResult<()>;
}

/// 포지션 저장소.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// 새 포지션을 오픈하고 `Opened` 이벤트를 원자적으로 함께 기록합니다.
    async fn open_position(&self, new: NewPosition) -> LedgerResult<PositionRecord>;

    /// 심볼의 오픈 포지션을 조회합니다.
    async fn get_open_position(&self, symbol: &Symbol) -> LedgerResult<Option<PositionRecord>>;

    /// 포지션을 ID로 조회합니다 (종료된 포지션 포함).
    async fn get_position(&self, id: Uuid) -> LedgerResult<Option<PositionRecord>>;

    /// 모든 오픈 포지션을 조회합니다.
    async fn list_open_positions(&self) -> LedgerResult<Vec<PositionRecord>>;

    /// 체결 수량을 더하고 평균 매입가를 재계산합니다.
    async fn add_quantity(
        &self,
        id: Uuid,
        quantity: Quantity,
        price: Price,
    ) -> LedgerResult<PositionRecord>;

    /// 수량을 차감합니다. 0 도달 시 같은 변이 안에서 포지션을 종료합니다.
    ///
    /// 차감량은 보유 수량으로 클램프됩니다.
    async fn reduce_quantity(&self, id: Uuid, quantity: Quantity) -> LedgerResult<PositionRecord>;

    /// 마지막 정합성 점검 시각을 갱신합니다.
    async fn touch_reconciled(&self, id: Uuid, at: DateTime<Utc>) -> LedgerResult<()>;

    /// 포지션 이벤트를 저널에 기록합니다.
    async fn record_event(&self, event: &PositionEvent) -> LedgerResult<()>;

    /// 포지션의 이벤트 이력을 시간순으로 조회합니다.
    async fn list_events(&self, position_id: Uuid) -> LedgerResult<Vec<PositionEvent>>;
}

/// 검토 플래그 저장소.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// 검토 플래그를 올립니다.
    async fn raise_flag(&self, flag: &ReviewFlag) -> LedgerResult<()>;

    /// 미처리 플래그를 조회합니다.
    async fn list_open_flags(&self) -> LedgerResult<Vec<ReviewFlag>>;

    /// 플래그를 처리 완료로 표시합니다.
    async fn resolve_flag(&self, id: Uuid) -> LedgerResult<()>;
}

/// 전체 장부 인터페이스.
pub trait Ledger: OrderStore + PositionStore + ReviewStore {}

impl<T: OrderStore + PositionStore + ReviewStore> Ledger for T {}
