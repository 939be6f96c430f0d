//! 실패 주문의 제한된 재시도.
//!
//! `Failed` 주문은 지수 백오프가 경과했을 때만 `RetryPending`을 거쳐
//! 재제출됩니다. 한도를 소진한 주문은 `Failed`로 남고 검토 플래그가
//! 올라갑니다. 자동 경로는 거기서 멈춥니다.

use std::sync::Arc;

use chrono::Utc;
use reversal_core::{OrderFilter, OrderRecord, RetrySummary, ReviewFlag, TradeIntent};
use reversal_ledger::Ledger;
use reversal_venue::{ExecutionVenue, RetryDecision, RetryPolicy};
use tracing::{info, warn};

use crate::error::ExecutionResult;
use crate::locks::SymbolLocks;

/// 재시도 실행기.
pub struct RetryRunner {
    ledger: Arc<dyn Ledger>,
    venue: Arc<dyn ExecutionVenue>,
    locks: SymbolLocks,
    policy: RetryPolicy,
}

fn intent_from(order: &OrderRecord) -> TradeIntent {
    TradeIntent {
        symbol: order.symbol.clone(),
        side: order.side,
        quantity: order.quantity,
        limit_price: order.limit_price,
        entry_type: order.entry_type,
    }
}

impl RetryRunner {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        venue: Arc<dyn ExecutionVenue>,
        locks: SymbolLocks,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            ledger,
            venue,
            locks,
            policy,
        }
    }

    /// 재시도 한도 소진 주문에 플래그를 올립니다. 이미 있으면 넘어갑니다.
    async fn flag_exhausted(&self, order: &OrderRecord) -> ExecutionResult<bool> {
        let already = self
            .ledger
            .list_open_flags()
            .await?
            .iter()
            .any(|f| f.order_id == Some(order.id));
        if already {
            return Ok(false);
        }

        self.ledger
            .raise_flag(&ReviewFlag::new(
                order.symbol.clone(),
                Some(order.id),
                format!("retry budget exhausted after {} attempts", order.retry_count),
            ))
            .await?;
        warn!(symbol = %order.symbol, order_id = %order.id, retry_count = order.retry_count, "Retry budget exhausted, flagged for review");
        Ok(true)
    }

    /// 모든 `Failed` 주문을 한 번 훑습니다.
    pub async fn run(&self) -> ExecutionResult<RetrySummary> {
        let mut summary = RetrySummary::default();
        let now = Utc::now();

        for order in self.ledger.list_orders(&OrderFilter::failed()).await? {
            summary.examined += 1;
            let last_attempt = order.last_retry_attempt_at.or(order.first_failed_at);

            match self.policy.evaluate(order.retry_count, last_attempt, now) {
                RetryDecision::Exhausted => {
                    summary.exhausted += 1;
                    self.flag_exhausted(&order).await?;
                }
                RetryDecision::Deferred(eligible_at) => {
                    summary.deferred += 1;
                    info!(order_id = %order.id, %eligible_at, "Retry deferred until backoff elapses");
                }
                RetryDecision::RetryNow => {
                    let guard = self.locks.acquire(&order.symbol).await;
                    self.ledger.mark_retry_pending(order.id).await?;
                    self.ledger.mark_pending_for_retry(order.id).await?;
                    drop(guard);

                    match self.venue.place_order(&intent_from(&order)).await {
                        Ok(broker_order_id) => {
                            self.ledger
                                .set_broker_order_id(order.id, &broker_order_id)
                                .await?;
                            info!(symbol = %order.symbol, order_id = %order.id, broker_order_id, "Order resubmitted");
                            summary.resubmitted += 1;
                        }
                        Err(e) if e.is_fatal() => {
                            self.ledger.mark_rejected(order.id, &e.to_string()).await?;
                            warn!(order_id = %order.id, error = %e, "Resubmission rejected by venue");
                            summary.failed_again += 1;
                        }
                        Err(e) if e.is_outcome_unknown() => {
                            // 접수 여부 불명, Pending으로 두고 정합 사이클이 해소
                            warn!(order_id = %order.id, error = %e, "Resubmission outcome unknown, leaving pending");
                            summary.resubmitted += 1;
                        }
                        Err(e) => {
                            self.ledger.mark_failed(order.id, &e.to_string()).await?;
                            warn!(order_id = %order.id, error = %e, "Resubmission failed again");
                            summary.failed_again += 1;
                        }
                    }
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use reversal_core::{EntryType, NewOrder, OrderState, Side, Symbol};
    use reversal_ledger::{MemoryLedger, OrderStore, ReviewStore};
    use reversal_venue::{ScriptedVenue, VenueError};
    use rust_decimal_macros::dec;

    async fn failed_order(ledger: &MemoryLedger, symbol: &str) -> OrderRecord {
        let order = NewOrder {
            symbol: Symbol::new(symbol),
            side: Side::Buy,
            quantity: dec!(10),
            limit_price: Some(dec!(185)),
            entry_type: EntryType::Initial,
        }
        .into_record();
        ledger.create_order(&order).await.unwrap();
        ledger.mark_failed(order.id, "venue timeout").await.unwrap();
        ledger.get_order(order.id).await.unwrap().unwrap()
    }

    fn immediate_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::seconds(0), Duration::seconds(0))
    }

    #[tokio::test]
    async fn test_fresh_failure_is_deferred() {
        let ledger = Arc::new(MemoryLedger::new());
        let venue = Arc::new(ScriptedVenue::new());
        failed_order(&ledger, "AAPL").await;

        let runner = RetryRunner::new(ledger, venue, SymbolLocks::new(), RetryPolicy::default());
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.examined, 1);
        assert_eq!(summary.deferred, 1);
        assert_eq!(summary.resubmitted, 0);
    }

    #[tokio::test]
    async fn test_elapsed_backoff_resubmits() {
        let ledger = Arc::new(MemoryLedger::new());
        let venue = Arc::new(ScriptedVenue::new());
        let order = failed_order(&ledger, "AAPL").await;

        let runner = RetryRunner::new(
            ledger.clone(),
            venue.clone(),
            SymbolLocks::new(),
            immediate_policy(),
        );
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.resubmitted, 1);
        assert_eq!(venue.placed_intents().await.len(), 1);

        let stored = ledger.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.state, OrderState::Pending);
        assert_eq!(stored.retry_count, 1);
        assert!(stored.broker_order_id.is_some());
    }

    #[tokio::test]
    async fn test_exhausted_order_is_flagged_once() {
        let ledger = Arc::new(MemoryLedger::new());
        let venue = Arc::new(ScriptedVenue::new());
        let order = failed_order(&ledger, "AAPL").await;

        let runner = RetryRunner::new(
            ledger.clone(),
            venue.clone(),
            SymbolLocks::new(),
            immediate_policy(),
        );

        // 세 번의 재시도를 모두 실패시킨다
        for _ in 0..3 {
            venue
                .fail_next_place(VenueError::Network("connection refused".into()))
                .await;
            let summary = runner.run().await.unwrap();
            assert_eq!(summary.failed_again, 1);
        }

        // 네 번째 훑기: 한도 소진, 플래그 한 건
        let summary = runner.run().await.unwrap();
        assert_eq!(summary.exhausted, 1);
        assert_eq!(summary.exit_code(), 1);

        let flags = ledger.list_open_flags().await.unwrap();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].order_id, Some(order.id));

        // 다시 훑어도 플래그는 중복되지 않는다
        runner.run().await.unwrap();
        assert_eq!(ledger.list_open_flags().await.unwrap().len(), 1);

        let stored = ledger.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.state, OrderState::Failed);
        assert_eq!(stored.retry_count, 3);
    }

    #[tokio::test]
    async fn test_fatal_resubmission_becomes_rejected() {
        let ledger = Arc::new(MemoryLedger::new());
        let venue = Arc::new(ScriptedVenue::new());
        let order = failed_order(&ledger, "AAPL").await;
        venue
            .fail_next_place(VenueError::OrderRejected("symbol halted".into()))
            .await;

        let runner = RetryRunner::new(ledger.clone(), venue, SymbolLocks::new(), immediate_policy());
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.failed_again, 1);
        let stored = ledger.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.state, OrderState::Rejected);
    }
}
