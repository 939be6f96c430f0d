//! 실행 venue trait 정의.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reversal_core::{Price, Quantity, Symbol, TradeIntent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::VenueError;

/// venue 작업을 위한 Result 타입.
pub type VenueResult<T> = Result<T, VenueError>;

/// venue가 보고하는 주문 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueOrderState {
    /// 접수되어 체결 대기 중
    Resting,
    /// 부분 체결
    PartiallyFilled,
    /// 전량 체결
    Filled,
    /// 취소됨
    Cancelled,
    /// 거부됨
    Rejected,
}

impl VenueOrderState {
    /// 더 이상 체결이 진행되지 않는 완결 상태인지 확인합니다.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected)
    }
}

/// 정규화된 주문 상태 응답.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueOrderStatus {
    /// venue 주문 상태
    pub state: VenueOrderState,
    /// 체결 수량
    pub filled_quantity: Quantity,
    /// 체결 평균가
    pub average_price: Option<Price>,
    /// 거부 사유 (거부 시)
    pub reason: Option<String>,
}

/// 과거 주문 조회 레코드.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueExecution {
    /// venue 주문 ID
    pub broker_order_id: String,
    /// venue 주문 상태
    pub state: VenueOrderState,
    /// 체결 수량
    pub filled_quantity: Quantity,
    /// 체결 평균가
    pub average_price: Option<Price>,
    /// 기록 시각
    pub timestamp: DateTime<Utc>,
}

/// 과거 주문 조회 범위.
#[derive(Debug, Clone, Copy)]
pub struct HistoryRange {
    /// 조회 시작 시각
    pub from: DateTime<Utc>,
    /// 조회 종료 시각
    pub to: DateTime<Utc>,
}

impl HistoryRange {
    /// 주어진 시각부터 현재까지의 범위를 생성합니다.
    pub fn since(from: DateTime<Utc>) -> Self {
        Self {
            from,
            to: Utc::now(),
        }
    }
}

/// 통합 실행 venue 인터페이스.
///
/// 게이트웨이는 호출마다 무상태이며, venue 응답을 정규화된 형태로
/// 변환하는 책임만 가집니다. 확정 응답의 부재는 항상 "불명"으로
/// 다루고 성공이나 실패로 해석하지 않습니다.
#[async_trait]
pub trait ExecutionVenue: Send + Sync {
    /// venue 이름 반환.
    fn name(&self) -> &str;

    /// 새 주문 제출. 접수 시 venue 주문 ID를 반환합니다.
    async fn place_order(&self, intent: &TradeIntent) -> VenueResult<String>;

    /// 주문 상태 조회. venue가 모르는 주문이면 `None`.
    async fn get_order_status(
        &self,
        broker_order_id: &str,
    ) -> VenueResult<Option<VenueOrderStatus>>;

    /// 심볼의 과거 주문 조회 (다운타임 중 체결 복원용).
    async fn get_order_history(
        &self,
        symbol: &Symbol,
        range: HistoryRange,
    ) -> VenueResult<Vec<VenueExecution>>;

    /// 계좌 보유량 스냅샷 조회.
    async fn get_holdings(&self) -> VenueResult<HashMap<Symbol, Quantity>>;

    /// 주문 취소. 실제로 취소되었으면 true.
    async fn cancel_order(&self, broker_order_id: &str) -> VenueResult<bool>;

    /// 미체결 주문의 수량/가격 정정. 정정되었으면 true.
    async fn amend_order(
        &self,
        broker_order_id: &str,
        quantity: Quantity,
        price: Option<Price>,
    ) -> VenueResult<bool>;
}
