//! 거래 의도 검증 및 발주.
//!
//! 시그널 생성기의 의도는 믿지 않습니다. 발주 전에 장부 기준으로
//! 검증하고, 탈락한 의도는 venue 호출 없이 `Skipped`로 끝납니다.
//!
//! 검증 규칙:
//! - 같은 심볼/방향의 미결 주문이 있으면 중복 발주 금지
//! - 최초 진입은 오픈 포지션이 없어야 함
//! - 재진입은 오픈 포지션이 있어야 하며 일일 상한 이내여야 함
//! - 매도는 오픈 포지션의 보유량 이내여야 함

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use reversal_core::{
    count_reentries_in_day, EntryType, OrderFilter, PlacementOutcome, PlacementSummary, Side,
    TradeIntent,
};
use reversal_ledger::Ledger;
use reversal_venue::ExecutionVenue;
use tracing::{info, warn};

use crate::error::ExecutionResult;
use crate::locks::SymbolLocks;

/// 발주 서비스.
pub struct PlacementService {
    ledger: Arc<dyn Ledger>,
    venue: Arc<dyn ExecutionVenue>,
    locks: SymbolLocks,
    /// 심볼당 일일 재진입 상한
    reentry_daily_cap: usize,
    /// 거래일 판정 시간대
    timezone: Tz,
}

impl PlacementService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        venue: Arc<dyn ExecutionVenue>,
        locks: SymbolLocks,
        reentry_daily_cap: usize,
        timezone: Tz,
    ) -> Self {
        Self {
            ledger,
            venue,
            locks,
            reentry_daily_cap,
            timezone,
        }
    }

    /// 검증 실패 사유를 반환합니다. 통과하면 None.
    async fn validate(&self, intent: &TradeIntent) -> ExecutionResult<Option<String>> {
        let duplicate_filter = OrderFilter {
            side: Some(intent.side),
            ..OrderFilter::open_for(intent.symbol.clone())
        };
        if !self.ledger.list_orders(&duplicate_filter).await?.is_empty() {
            return Ok(Some("duplicate open order for symbol and side".to_string()));
        }

        let position = self.ledger.get_open_position(&intent.symbol).await?;

        match (intent.side, intent.entry_type) {
            (Side::Buy, EntryType::Initial) => {
                if position.is_some() {
                    return Ok(Some("position already open".to_string()));
                }
            }
            (Side::Buy, EntryType::Reentry) => {
                let Some(position) = position else {
                    return Ok(Some("no open position for re-entry".to_string()));
                };
                let events = self.ledger.list_events(position.id).await?;
                let today = count_reentries_in_day(&events, self.timezone, Utc::now());
                if today >= self.reentry_daily_cap {
                    return Ok(Some(format!(
                        "daily re-entry cap reached ({}/{})",
                        today, self.reentry_daily_cap
                    )));
                }
            }
            (Side::Sell, _) => {
                let Some(position) = position else {
                    return Ok(Some("no open position to sell".to_string()));
                };
                if intent.quantity > position.quantity {
                    return Ok(Some(format!(
                        "sell quantity {} exceeds held {}",
                        intent.quantity, position.quantity
                    )));
                }
            }
        }

        Ok(None)
    }

    /// 의도 하나를 검증하고 발주합니다.
    pub async fn place(&self, intent: &TradeIntent) -> ExecutionResult<PlacementOutcome> {
        let guard = self.locks.acquire(&intent.symbol).await;

        if let Some(reason) = self.validate(intent).await? {
            info!(symbol = %intent.symbol, %reason, "Intent skipped");
            return Ok(PlacementOutcome::Skipped {
                symbol: intent.symbol.clone(),
                reason,
            });
        }

        // 먼저 Pending으로 영속화한 뒤 venue를 호출한다.
        // 반대 순서면 제출 성공 후 크래시 시 장부에 없는 주문이 생긴다.
        let order = intent.to_new_order().into_record();
        self.ledger.create_order(&order).await?;
        drop(guard);

        match self.venue.place_order(intent).await {
            Ok(broker_order_id) => {
                self.ledger
                    .set_broker_order_id(order.id, &broker_order_id)
                    .await?;
                info!(symbol = %intent.symbol, order_id = %order.id, broker_order_id, "Order placed");
                Ok(PlacementOutcome::Placed {
                    symbol: intent.symbol.clone(),
                    order_id: order.id,
                })
            }
            Err(e) if e.is_fatal() => {
                let reason = e.to_string();
                self.ledger.mark_rejected(order.id, &reason).await?;
                warn!(symbol = %intent.symbol, order_id = %order.id, %reason, "Order rejected by venue");
                Ok(PlacementOutcome::Rejected {
                    symbol: intent.symbol.clone(),
                    reason,
                })
            }
            Err(e) if e.is_outcome_unknown() => {
                // 주문이 접수되었을 수도 있다. Pending으로 남겨 두면
                // 다음 정합 사이클이 과거 주문 조회로 해소한다.
                let reason = format!("venue outcome unknown: {}", e);
                warn!(symbol = %intent.symbol, order_id = %order.id, %reason, "Leaving order pending for reconciliation");
                Ok(PlacementOutcome::Failed {
                    symbol: intent.symbol.clone(),
                    reason,
                })
            }
            Err(e) => {
                let reason = e.to_string();
                self.ledger.mark_failed(order.id, &reason).await?;
                warn!(symbol = %intent.symbol, order_id = %order.id, %reason, "Order submission failed");
                Ok(PlacementOutcome::Failed {
                    symbol: intent.symbol.clone(),
                    reason,
                })
            }
        }
    }

    /// 의도 묶음을 순서대로 발주합니다.
    pub async fn place_all(&self, intents: &[TradeIntent]) -> ExecutionResult<PlacementSummary> {
        let mut summary = PlacementSummary::default();
        for intent in intents {
            let outcome = self.place(intent).await?;
            summary.record(outcome);
        }
        Ok(summary)
    }
}
