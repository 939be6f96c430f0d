//! 포지션 추적.
//!
//! 이 모듈은 시스템이 직접 매수한 보유량만을 추적하는 포지션 타입을 정의합니다.
//! venue 계좌의 총 보유량에는 수동 매수분이 섞여 있을 수 있으므로,
//! 포지션 수량은 주문 체결 또는 정합성 점검이 감지한 축소에 의해서만 변합니다.

use crate::types::{Price, Quantity, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 심볼별 시스템 소유 포지션.
///
/// 불변식: `closed_at != None ⇔ quantity == 0`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRecord {
    /// 내부 포지션 ID
    pub id: Uuid,
    /// 거래 심볼
    pub symbol: Symbol,
    /// 시스템 소유 수량 (외부 취득분 제외)
    pub quantity: Quantity,
    /// 시스템 원가 기준 평균 매입가
    pub average_price: Price,
    /// 포지션 오픈 시각
    pub opened_at: DateTime<Utc>,
    /// 포지션 종료 시각 (오픈 상태면 None)
    pub closed_at: Option<DateTime<Utc>>,
    /// 마지막 정합성 점검 시각
    pub last_reconciled_at: Option<DateTime<Utc>>,
}

impl PositionRecord {
    /// 첫 체결로부터 새 포지션을 생성합니다.
    pub fn open(symbol: Symbol, quantity: Quantity, average_price: Price) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol,
            quantity,
            average_price,
            opened_at: Utc::now(),
            closed_at: None,
            last_reconciled_at: None,
        }
    }

    /// 포지션이 오픈 상태인지 확인합니다.
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// `closed_at ⇔ quantity == 0` 불변식이 성립하는지 확인합니다.
    pub fn invariant_holds(&self) -> bool {
        self.closed_at.is_some() == self.quantity.is_zero()
    }

    /// 체결 수량을 추가하고 평균 매입가를 재계산합니다 (물타기).
    pub fn add_fill(&mut self, quantity: Quantity, price: Price) {
        let total_cost = self.average_price * self.quantity + price * quantity;
        self.quantity += quantity;
        if !self.quantity.is_zero() {
            self.average_price = total_cost / self.quantity;
        }
    }

    /// 수량을 차감하고, 0에 도달하면 포지션을 종료합니다.
    ///
    /// 부분 축소와 전량 청산이 같은 경로를 공유합니다.
    /// "종료된 포지션에 수량이 남는" 부류의 버그를 원천 차단하기 위한 구조입니다.
    pub fn reduce(&mut self, sold_quantity: Quantity) {
        let reduce_qty = sold_quantity.min(self.quantity);
        self.quantity -= reduce_qty;
        if self.quantity.is_zero() {
            self.closed_at = Some(Utc::now());
        }
    }
}

/// 포지션 생성 입력.
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub symbol: Symbol,
    pub quantity: Quantity,
    pub average_price: Price,
}

/// 검토 대기열에 올라가는 플래그.
///
/// 모호한 정합성 상황(종료 포지션 재오픈 거부, 재시도 소진 등)은
/// 로그로만 남기지 않고 레코드로 영속화하여 운영자가 확인하게 합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFlag {
    /// 내부 ID
    pub id: Uuid,
    /// 관련 심볼
    pub symbol: Symbol,
    /// 관련 주문 ID (있는 경우)
    pub order_id: Option<Uuid>,
    /// 사람이 읽을 수 있는 사유
    pub reason: String,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 처리 시각 (미처리면 None)
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ReviewFlag {
    /// 새 플래그를 생성합니다.
    pub fn new(symbol: Symbol, order_id: Option<Uuid>, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol,
            order_id,
            reason: reason.into(),
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}
