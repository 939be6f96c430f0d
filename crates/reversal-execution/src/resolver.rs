//! 체결 수량의 단계적 확정.
//!
//! 다운타임 동안 체결된 주문의 실제 체결 수량은 하나의 API로 확정할 수
//! 없습니다. 증거력이 높은 순서로 네 단계를 시도합니다:
//!
//! 1. 당일 세션 상태 조회 (venue가 주문을 기억하는 경우)
//! 2. 과거 주문 조회에서 가장 최근의 완결 기록
//! 3. 보유량 스냅샷과 장부 수량의 차이
//! 4. 의도 수량 (최후 수단, 전량 체결 가정)
//!
//! 각 단계는 상위 단계가 *증거의 부재*를 확인했을 때만 사용됩니다.
//! 조회 자체가 실패하면 부재가 아니라 불명이므로 에러를 반환하고,
//! 해당 심볼은 다음 사이클이 재조회합니다. 장애 중에 하위 단계로
//! 내려가면 단지 걸려 있을 뿐인 주문을 체결로 단정하게 됩니다.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use reversal_core::{OrderRecord, Price, Quantity, Side, Symbol};
use reversal_venue::{ExecutionVenue, HistoryRange, VenueOrderState, VenueResult};
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// 체결 수량의 출처.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillSource {
    /// 세션 상태 조회
    SessionStatus,
    /// 과거 주문 조회
    OrderHistory,
    /// 보유량 스냅샷 추정
    HoldingsSnapshot,
    /// 의도 수량 가정
    IntendedQuantity,
}

/// 확정된 체결 정보.
#[derive(Debug, Clone)]
pub struct ResolvedFill {
    /// venue 주문 상태
    pub state: VenueOrderState,
    /// 체결 수량
    pub filled_quantity: Quantity,
    /// 체결 평균가 (확인된 경우)
    pub average_price: Option<Price>,
    /// 거부/취소 사유
    pub reason: Option<String>,
    /// 과거 주문 조회에서 입양한 venue 주문 ID
    pub adopted_broker_id: Option<String>,
    /// 사용한 출처
    pub source: FillSource,
}

/// 체결 수량 확정기.
pub struct FilledQuantityResolver {
    venue: Arc<dyn ExecutionVenue>,
}

impl FilledQuantityResolver {
    pub fn new(venue: Arc<dyn ExecutionVenue>) -> Self {
        Self { venue }
    }

    /// 주문의 체결 상태를 확정합니다.
    ///
    /// `holdings`는 사이클 시작 시의 보유량 스냅샷 (조회 실패 시 None),
    /// `ledger_position_quantity`는 해당 심볼의 장부 수량,
    /// `known_broker_ids`는 다른 주문이 이미 점유한 venue 주문 ID 목록입니다.
    pub async fn resolve(
        &self,
        order: &OrderRecord,
        holdings: Option<&HashMap<Symbol, Quantity>>,
        ledger_position_quantity: Quantity,
        known_broker_ids: &[String],
    ) -> VenueResult<ResolvedFill> {
        // 1단계: 세션 상태 조회
        if let Some(broker_order_id) = &order.broker_order_id {
            match self.venue.get_order_status(broker_order_id).await {
                Ok(Some(status)) => {
                    return Ok(ResolvedFill {
                        state: status.state,
                        filled_quantity: status.filled_quantity,
                        average_price: status.average_price,
                        reason: status.reason,
                        adopted_broker_id: None,
                        source: FillSource::SessionStatus,
                    });
                }
                Ok(None) => {
                    debug!(order_id = %order.id, broker_order_id, "Session status unavailable, falling back to history");
                }
                Err(e) => {
                    // 조회 실패는 증거의 부재가 아니다. 하위 단계로 내려가지
                    // 않고 다음 사이클로 미룬다.
                    warn!(order_id = %order.id, error = %e, "Status query failed, deferring to next cycle");
                    return Err(e);
                }
            }
        }

        // 2단계: 과거 주문 조회 - 가장 최근의 완결 기록
        let range = HistoryRange::since(order.placed_at - Duration::minutes(5));
        match self.venue.get_order_history(&order.symbol, range).await {
            Ok(executions) => {
                let candidate = executions
                    .iter()
                    .filter(|e| e.state.is_complete())
                    .filter(|e| match &order.broker_order_id {
                        Some(id) => &e.broker_order_id == id,
                        // venue 주문 ID를 모르는 주문은 다른 주문이 점유하지 않은
                        // 기록만 입양 후보가 된다
                        None => !known_broker_ids.contains(&e.broker_order_id),
                    })
                    .max_by_key(|e| e.timestamp);

                if let Some(execution) = candidate {
                    let adopted = if order.broker_order_id.is_none() {
                        Some(execution.broker_order_id.clone())
                    } else {
                        None
                    };
                    return Ok(ResolvedFill {
                        state: execution.state,
                        filled_quantity: execution.filled_quantity,
                        average_price: execution.average_price,
                        reason: None,
                        adopted_broker_id: adopted,
                        source: FillSource::OrderHistory,
                    });
                }
            }
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "History query failed, deferring to next cycle");
                return Err(e);
            }
        }

        // 3단계: 보유량 스냅샷과 장부 수량의 차이로 추정
        if let Some(holdings) = holdings {
            let venue_quantity = holdings
                .get(&order.symbol)
                .copied()
                .unwrap_or(Decimal::ZERO);
            let inferred = match order.side {
                Side::Buy => venue_quantity - ledger_position_quantity,
                Side::Sell => ledger_position_quantity - venue_quantity,
            }
            .clamp(Decimal::ZERO, order.quantity);

            let state = if inferred >= order.quantity {
                VenueOrderState::Filled
            } else if inferred > Decimal::ZERO {
                VenueOrderState::PartiallyFilled
            } else {
                VenueOrderState::Resting
            };

            return Ok(ResolvedFill {
                state,
                filled_quantity: inferred,
                average_price: None,
                reason: None,
                adopted_broker_id: None,
                source: FillSource::HoldingsSnapshot,
            });
        }

        // 4단계: 의도 수량 가정
        warn!(order_id = %order.id, symbol = %order.symbol, "No fill evidence available, assuming intended quantity");
        Ok(ResolvedFill {
            state: VenueOrderState::Filled,
            filled_quantity: order.quantity,
            average_price: order.limit_price,
            reason: None,
            adopted_broker_id: None,
            source: FillSource::IntendedQuantity,
        })
    }
}
