//! 주문 타입 및 상태 머신.
//!
//! 이 모듈은 주문 관련 타입을 정의합니다:
//! - `Side` - 주문 방향 (매수/매도)
//! - `EntryType` - 진입 유형 (최초 진입 / 재진입)
//! - `OrderState` - 주문 상태 머신
//! - `OrderRecord` - 장부에 저장되는 주문 엔티티
//! - `NewOrder` - 주문 생성 입력

use crate::types::{Price, Quantity, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 주문 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl Side {
    /// 문자열로 변환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            _ => Err(format!("Unknown side: {}", s)),
        }
    }
}

/// 진입 유형.
///
/// 재진입(물타기)은 최초 진입과 별도의 검증 경로를 가지므로 구분합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// 최초 진입
    Initial,
    /// 기존 포지션에 대한 재진입 (물타기)
    Reentry,
}

impl EntryType {
    /// 문자열로 변환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Initial => "initial",
            EntryType::Reentry => "reentry",
        }
    }
}

impl std::str::FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "initial" => Ok(EntryType::Initial),
            "reentry" => Ok(EntryType::Reentry),
            _ => Err(format!("Unknown entry type: {}", s)),
        }
    }
}

/// 주문 상태.
///
/// 전이는 단방향입니다. 유일한 예외는 제한된 재시도 루프인
/// `Failed → RetryPending → Pending` 입니다.
///
/// ```text
/// Pending ──> Executed ──> Closed
///    │
///    ├──> Rejected   (venue 거부, 터미널)
///    ├──> Cancelled  (취소, 터미널)
///    └──> Failed ──> RetryPending ──> Pending  (재시도 한도 내)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// venue에 제출되었거나 제출 대기 중 (체결 미완)
    Pending,
    /// 전량 체결됨
    Executed,
    /// 소속 포지션이 종료되어 마감됨
    Closed,
    /// venue가 거부함 (터미널)
    Rejected,
    /// 취소됨 (터미널)
    Cancelled,
    /// 제출 실패 (재시도 한도 내에서 복구 가능)
    Failed,
    /// 재시도 승인됨, 재제출 대기
    RetryPending,
}

impl OrderState {
    /// 문자열로 변환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executed => "executed",
            Self::Closed => "closed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::RetryPending => "retry_pending",
        }
    }

    /// venue 상태 조회가 필요한 미결 상태인지 확인합니다.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::RetryPending)
    }

    /// 더 이상 어떤 전이도 허용되지 않는 터미널 상태인지 확인합니다.
    ///
    /// `Failed`는 재시도 루프가 있으므로 터미널이 아닙니다.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Rejected | Self::Cancelled)
    }

    /// 주어진 상태로의 전이가 허용되는지 확인합니다.
    pub fn can_transition_to(&self, next: OrderState) -> bool {
        use OrderState::*;
        matches!(
            (self, next),
            (Pending, Executed)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Pending, Failed)
                | (Executed, Closed)
                | (Failed, RetryPending)
                | (RetryPending, Pending)
                | (RetryPending, Failed)
        )
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "executed" => Ok(Self::Executed),
            "closed" => Ok(Self::Closed),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            "retry_pending" => Ok(Self::RetryPending),
            _ => Err(format!("Unknown order state: {}", s)),
        }
    }
}

/// 장부에 저장되는 주문 레코드.
///
/// 불변식:
/// - `filled_quantity <= quantity`
/// - `Executed` 상태이면 `execution_time`이 설정됨
/// - `first_failed_at`은 최초 실패 시 한 번만 설정되고 이후 절대 초기화되지 않음
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    /// 내부 주문 ID
    pub id: Uuid,
    /// venue가 발급한 주문 ID (접수 전까지 None)
    pub broker_order_id: Option<String>,
    /// 거래 심볼
    pub symbol: Symbol,
    /// 주문 방향
    pub side: Side,
    /// 의도한 주문 수량
    pub quantity: Quantity,
    /// 의도한 지정가 (시장가면 None)
    pub limit_price: Option<Price>,
    /// 주문 상태
    pub state: OrderState,
    /// 체결된 수량
    pub filled_quantity: Quantity,
    /// 체결 평균가
    pub filled_avg_price: Option<Price>,
    /// 진입 유형
    pub entry_type: EntryType,
    /// 주문 발주 시각
    pub placed_at: DateTime<Utc>,
    /// 마지막 상태 조회 시각
    pub last_status_check_at: Option<DateTime<Utc>>,
    /// 전량 체결 시각
    pub execution_time: Option<DateTime<Utc>>,
    /// 마감 시각 (소속 포지션 종료 시)
    pub closed_at: Option<DateTime<Utc>>,
    /// 최초 실패 시각 (한 번 설정되면 유지, 재시도 백오프 기준)
    pub first_failed_at: Option<DateTime<Utc>>,
    /// 마지막 재시도 시각
    pub last_retry_attempt_at: Option<DateTime<Utc>>,
    /// 재시도 횟수
    pub retry_count: i32,
    /// 사람이 읽을 수 있는 상태 사유 (거부/실패 시 필수)
    pub reason: Option<String>,
}

impl OrderRecord {
    /// 남은 미체결 수량을 반환합니다.
    pub fn remaining_quantity(&self) -> Quantity {
        self.quantity - self.filled_quantity
    }

    /// 전량 체결 여부를 확인합니다.
    pub fn is_fully_filled(&self) -> bool {
        self.filled_quantity >= self.quantity
    }
}

/// 주문 생성 입력.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Quantity,
    pub limit_price: Option<Price>,
    pub entry_type: EntryType,
}

impl NewOrder {
    /// 발주 시각을 현재로 하는 `OrderRecord`를 생성합니다.
    ///
    /// 새 주문은 항상 `Pending` 상태, 체결 수량 0으로 시작합니다.
    pub fn into_record(self) -> OrderRecord {
        OrderRecord {
            id: Uuid::new_v4(),
            broker_order_id: None,
            symbol: self.symbol,
            side: self.side,
            quantity: self.quantity,
            limit_price: self.limit_price,
            state: OrderState::Pending,
            filled_quantity: Decimal::ZERO,
            filled_avg_price: None,
            entry_type: self.entry_type,
            placed_at: Utc::now(),
            last_status_check_at: None,
            execution_time: None,
            closed_at: None,
            first_failed_at: None,
            last_retry_attempt_at: None,
            retry_count: 0,
            reason: None,
        }
    }
}

/// 주문 목록 조회 필터.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// 특정 심볼로 제한
    pub symbol: Option<Symbol>,
    /// 상태 목록으로 제한 (빈 목록이면 전체)
    pub states: Vec<OrderState>,
    /// 주문 방향으로 제한
    pub side: Option<Side>,
    /// 진입 유형으로 제한
    pub entry_type: Option<EntryType>,
}

impl OrderFilter {
    /// 미결 주문 (`Pending`, `RetryPending`) 필터.
    pub fn open() -> Self {
        Self {
            states: vec![OrderState::Pending, OrderState::RetryPending],
            ..Default::default()
        }
    }

    /// 특정 심볼의 미결 주문 필터.
    pub fn open_for(symbol: Symbol) -> Self {
        Self {
            symbol: Some(symbol),
            ..Self::open()
        }
    }

    /// 재시도 대상 (`Failed`) 주문 필터.
    pub fn failed() -> Self {
        Self {
            states: vec![OrderState::Failed],
            ..Default::default()
        }
    }

    /// 주문이 이 필터에 일치하는지 확인합니다.
    pub fn matches(&self, order: &OrderRecord) -> bool {
        if let Some(symbol) = &self.symbol {
            if &order.symbol != symbol {
                return false;
            }
        }
        if !self.states.is_empty() && !self.states.contains(&order.state) {
            return false;
        }
        if let Some(side) = self.side {
            if order.side != side {
                return false;
            }
        }
        if let Some(entry_type) = self.entry_type {
            if order.entry_type != entry_type {
                return false;
            }
        }
        true
    }
}
