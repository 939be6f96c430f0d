//! 포지션 변동에 따른 미체결 주문 동기화.
//!
//! 포지션 수량이 변하면 venue에 걸려 있는 주문들이 현실과 어긋납니다:
//!
//! - 증가: 미체결 매도 주문이 보유량보다 작아 초과분이 팔리지 않는다
//! - 축소: 미체결 매도 주문의 수량이 보유량보다 커진다 (초과분 체결 불능)
//! - 종료: 잔여 재진입 매수와 매도 주문이 근거를 잃는다
//!
//! venue 호출은 심볼 락 밖에서 일어나며, 장부 갱신은 상태 조건부
//! UPDATE이므로 그 사이 다른 경로가 주문을 움직였으면 그대로 탈락합니다.

use std::sync::Arc;

use reversal_core::{EntryType, OrderFilter, OrderState, Quantity, Side, Symbol};
use reversal_ledger::{Ledger, LedgerError};
use reversal_venue::ExecutionVenue;
use tracing::{info, warn};

use crate::error::ExecutionResult;

/// 포지션 종료 동기화 결과.
#[derive(Debug, Default, Clone, Copy)]
pub struct CloseSync {
    /// 취소한 재진입 매수 주문 수
    pub reentries_cancelled: usize,
    /// 취소한 매도 주문 수
    pub sells_cancelled: usize,
    /// 마감한 체결 주문 수
    pub orders_closed: usize,
}

/// 매도측 동기화기.
pub struct SellSideSynchronizer {
    ledger: Arc<dyn Ledger>,
    venue: Arc<dyn ExecutionVenue>,
}

impl SellSideSynchronizer {
    pub fn new(ledger: Arc<dyn Ledger>, venue: Arc<dyn ExecutionVenue>) -> Self {
        Self { ledger, venue }
    }

    /// 미체결 매도 주문의 수량을 현재 보유량에 맞춥니다.
    ///
    /// 축소 시 초과분 체결을 막고, 재진입으로 늘어난 경우 매도를
    /// 상향 정정합니다. 가격은 건드리지 않습니다. 정정된 주문 수를
    /// 반환합니다.
    pub async fn align_resting_sells(
        &self,
        symbol: &Symbol,
        remaining: Quantity,
    ) -> ExecutionResult<usize> {
        let filter = OrderFilter {
            symbol: Some(symbol.clone()),
            states: vec![OrderState::Pending],
            side: Some(Side::Sell),
            ..Default::default()
        };

        let mut amended = 0;
        for order in self.ledger.list_orders(&filter).await? {
            let Some(broker_order_id) = &order.broker_order_id else {
                continue;
            };
            if order.quantity == remaining {
                continue;
            }

            match self.venue.amend_order(broker_order_id, remaining, None).await {
                Ok(true) => {
                    self.ledger
                        .update_order_quantity(order.id, remaining, None)
                        .await?;
                    info!(symbol = %symbol, order_id = %order.id, %remaining, "Amended resting sell to remaining quantity");
                    amended += 1;
                }
                Ok(false) => {
                    warn!(symbol = %symbol, order_id = %order.id, "Venue refused amend, order no longer resting");
                }
                Err(e) => {
                    warn!(symbol = %symbol, order_id = %order.id, error = %e, "Amend failed, will retry next cycle");
                }
            }
        }
        Ok(amended)
    }

    /// 포지션 종료 후 잔여 주문을 정리합니다.
    ///
    /// - 미체결 재진입 매수와 매도 주문을 venue에서 취소하고 장부에 반영
    /// - 체결 완료 주문을 `Closed`로 마감
    pub async fn on_position_closed(&self, symbol: &Symbol) -> ExecutionResult<CloseSync> {
        let mut sync = CloseSync::default();

        let open_filter = OrderFilter {
            symbol: Some(symbol.clone()),
            states: vec![OrderState::Pending],
            ..Default::default()
        };
        for order in self.ledger.list_orders(&open_filter).await? {
            let cancellable = order.side == Side::Sell
                || (order.side == Side::Buy && order.entry_type == EntryType::Reentry);
            if !cancellable {
                continue;
            }

            if let Some(broker_order_id) = &order.broker_order_id {
                match self.venue.cancel_order(broker_order_id).await {
                    Ok(_) => {}
                    Err(e) => {
                        warn!(symbol = %symbol, order_id = %order.id, error = %e, "Cancel failed, will retry next cycle");
                        continue;
                    }
                }
            }

            match self.ledger.mark_cancelled(order.id, Some("position closed")).await {
                Ok(()) => {
                    if order.side == Side::Sell {
                        sync.sells_cancelled += 1;
                    } else {
                        sync.reentries_cancelled += 1;
                    }
                }
                // 그 사이 체결된 주문은 다음 사이클의 주문 정합이 처리
                Err(LedgerError::InvalidTransition { .. }) => {
                    warn!(symbol = %symbol, order_id = %order.id, "Order moved during cancel, leaving for next cycle");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let executed_filter = OrderFilter {
            symbol: Some(symbol.clone()),
            states: vec![OrderState::Executed],
            ..Default::default()
        };
        for order in self.ledger.list_orders(&executed_filter).await? {
            self.ledger.mark_closed(order.id).await?;
            sync.orders_closed += 1;
        }

        info!(
            symbol = %symbol,
            reentries_cancelled = sync.reentries_cancelled,
            sells_cancelled = sync.sells_cancelled,
            orders_closed = sync.orders_closed,
            "Synchronized orders after position close"
        );
        Ok(sync)
    }
}
