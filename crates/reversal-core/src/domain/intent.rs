//! 거래 의도.
//!
//! 시그널 생성기(외부 협력자)가 사이클마다 전달하는 입력입니다.
//! 이 시스템은 의도의 내용을 판단하지 않고 검증과 발주만 담당합니다.

use crate::domain::{EntryType, NewOrder, Side};
use crate::types::{Price, Quantity, Symbol};
use serde::{Deserialize, Serialize};

/// 시그널 생성기로부터의 거래 의도.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntent {
    /// 거래 심볼
    pub symbol: Symbol,
    /// 주문 방향
    pub side: Side,
    /// 주문 수량
    pub quantity: Quantity,
    /// 지정가 (시장가면 None)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Price>,
    /// 진입 유형
    pub entry_type: EntryType,
}

impl TradeIntent {
    /// 최초 진입 매수 의도를 생성합니다.
    pub fn initial_buy(symbol: Symbol, quantity: Quantity, limit_price: Option<Price>) -> Self {
        Self {
            symbol,
            side: Side::Buy,
            quantity,
            limit_price,
            entry_type: EntryType::Initial,
        }
    }

    /// 재진입 매수 의도를 생성합니다.
    pub fn reentry_buy(symbol: Symbol, quantity: Quantity, limit_price: Option<Price>) -> Self {
        Self {
            symbol,
            side: Side::Buy,
            quantity,
            limit_price,
            entry_type: EntryType::Reentry,
        }
    }

    /// 장부 저장용 주문 생성 입력으로 변환합니다.
    pub fn to_new_order(&self) -> NewOrder {
        NewOrder {
            symbol: self.symbol.clone(),
            side: self.side,
            quantity: self.quantity,
            limit_price: self.limit_price,
            entry_type: self.entry_type,
        }
    }
}
