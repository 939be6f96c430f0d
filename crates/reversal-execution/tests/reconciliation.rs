//! 정합 엔진 통합 테스트.
//!
//! 인메모리 장부와 스크립트형 venue로 전체 사이클을 돌립니다.
//! 각 시나리오는 두 번째 사이클의 멱등성(무변이)까지 확인합니다.

use std::sync::Arc;

use reversal_core::{
    EntryType, NewOrder, NewPosition, OrderFilter, OrderRecord, OrderState, PositionEventKind,
    Side, Symbol,
};
use reversal_execution::{ReconciliationEngine, SymbolLocks};
use reversal_ledger::{Ledger, MemoryLedger, OrderStore, PositionStore, ReviewStore};
use reversal_venue::{
    ExecutionVenue, ScriptedVenue, VenueError, VenueOrderState, VenueOrderStatus,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn engine(ledger: Arc<MemoryLedger>, venue: Arc<ScriptedVenue>) -> ReconciliationEngine {
    ReconciliationEngine::new(ledger, venue, SymbolLocks::new())
}

async fn seed_order(
    ledger: &MemoryLedger,
    symbol: &str,
    side: Side,
    entry_type: EntryType,
    quantity: Decimal,
    broker_id: &str,
) -> OrderRecord {
    let order = NewOrder {
        symbol: Symbol::new(symbol),
        side,
        quantity,
        limit_price: Some(dec!(185)),
        entry_type,
    }
    .into_record();
    ledger.create_order(&order).await.unwrap();
    ledger.set_broker_order_id(order.id, broker_id).await.unwrap();
    ledger.get_order(order.id).await.unwrap().unwrap()
}

async fn script_resting(venue: &ScriptedVenue, broker_id: &str) {
    venue
        .script_status(
            broker_id,
            VenueOrderStatus {
                state: VenueOrderState::Resting,
                filled_quantity: Decimal::ZERO,
                average_price: None,
                reason: None,
            },
        )
        .await;
}

#[tokio::test]
async fn test_full_fill_executes_order_and_opens_position() {
    let ledger = Arc::new(MemoryLedger::new());
    let venue = Arc::new(ScriptedVenue::new());
    let order = seed_order(&ledger, "AAPL", Side::Buy, EntryType::Initial, dec!(10), "BRK-1").await;

    venue
        .script_status(
            "BRK-1",
            VenueOrderStatus {
                state: VenueOrderState::Filled,
                filled_quantity: dec!(10),
                average_price: Some(dec!(184)),
                reason: None,
            },
        )
        .await;
    venue.set_holding(Symbol::new("AAPL"), dec!(10)).await;

    let engine = engine(ledger.clone(), venue);
    let summary = engine.run_cycle().await.unwrap();

    assert_eq!(summary.orders_examined, 1);
    assert_eq!(summary.orders_executed, 1);

    let stored = ledger.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.state, OrderState::Executed);
    assert_eq!(stored.filled_quantity, dec!(10));
    assert!(stored.execution_time.is_some());

    let position = ledger
        .get_open_position(&Symbol::new("AAPL"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.quantity, dec!(10));
    assert_eq!(position.average_price, dec!(184));

    // venue 변화가 없으면 두 번째 사이클은 무변이
    let second = engine.run_cycle().await.unwrap();
    assert!(second.is_quiescent());
    assert_eq!(second.orders_examined, 0);
}

#[tokio::test]
async fn test_partial_fill_is_monotonic() {
    let ledger = Arc::new(MemoryLedger::new());
    let venue = Arc::new(ScriptedVenue::new());
    let order = seed_order(&ledger, "AAPL", Side::Buy, EntryType::Initial, dec!(10), "BRK-1").await;

    venue
        .script_status(
            "BRK-1",
            VenueOrderStatus {
                state: VenueOrderState::PartiallyFilled,
                filled_quantity: dec!(7),
                average_price: Some(dec!(184)),
                reason: None,
            },
        )
        .await;
    venue.set_holding(Symbol::new("AAPL"), dec!(7)).await;

    let engine = engine(ledger.clone(), venue);
    engine.run_cycle().await.unwrap();

    let stored = ledger.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.state, OrderState::Pending);
    assert_eq!(stored.filled_quantity, dec!(7));

    let position = ledger
        .get_open_position(&Symbol::new("AAPL"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.quantity, dec!(7));

    // 같은 상태가 다시 보고되어도 체결이 중복 반영되지 않는다
    let second = engine.run_cycle().await.unwrap();
    assert!(second.is_quiescent());
    let stored = ledger.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.filled_quantity, dec!(7));
    let position = ledger
        .get_open_position(&Symbol::new("AAPL"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.quantity, dec!(7));
}

#[tokio::test]
async fn test_external_partial_reduction_amends_resting_sell() {
    let ledger = Arc::new(MemoryLedger::new());
    let venue = Arc::new(ScriptedVenue::new());

    let position = ledger
        .open_position(NewPosition {
            symbol: Symbol::new("AAPL"),
            quantity: dec!(35),
            average_price: dec!(185),
        })
        .await
        .unwrap();
    let sell =
        seed_order(&ledger, "AAPL", Side::Sell, EntryType::Initial, dec!(35), "SELL-1").await;
    script_resting(&venue, "SELL-1").await;

    // 사용자가 수동으로 5주 매도: venue 보유 30
    venue.set_holding(Symbol::new("AAPL"), dec!(30)).await;

    let engine = engine(ledger.clone(), venue.clone());
    let summary = engine.run_cycle().await.unwrap();

    assert_eq!(summary.positions_reduced, 1);
    assert_eq!(summary.sell_orders_amended, 1);

    let updated = ledger.get_position(position.id).await.unwrap().unwrap();
    assert_eq!(updated.quantity, dec!(30));
    assert!(updated.is_open());

    let amends = venue.amend_calls().await;
    assert_eq!(amends, vec![("SELL-1".to_string(), dec!(30), None)]);
    let stored_sell = ledger.get_order(sell.id).await.unwrap().unwrap();
    assert_eq!(stored_sell.quantity, dec!(30));

    let events = ledger.list_events(position.id).await.unwrap();
    assert!(events
        .iter()
        .any(|e| e.kind == PositionEventKind::ExternalReduction));

    let second = engine.run_cycle().await.unwrap();
    assert!(second.is_quiescent());
}

#[tokio::test]
async fn test_external_liquidation_closes_position_and_cancels_leftovers() {
    let ledger = Arc::new(MemoryLedger::new());
    let venue = Arc::new(ScriptedVenue::new());

    let position = ledger
        .open_position(NewPosition {
            symbol: Symbol::new("AAPL"),
            quantity: dec!(35),
            average_price: dec!(185),
        })
        .await
        .unwrap();

    // 체결 완료된 최초 진입 매수
    let executed_buy =
        seed_order(&ledger, "AAPL", Side::Buy, EntryType::Initial, dec!(35), "BUY-1").await;
    ledger
        .apply_fill(executed_buy.id, Decimal::ZERO, dec!(35), Some(dec!(185)))
        .await
        .unwrap();

    // venue에 걸려 있는 재진입 매수와 매도
    let reentry =
        seed_order(&ledger, "AAPL", Side::Buy, EntryType::Reentry, dec!(5), "BUY-2").await;
    let sell =
        seed_order(&ledger, "AAPL", Side::Sell, EntryType::Initial, dec!(35), "SELL-1").await;
    script_resting(&venue, "BUY-2").await;
    script_resting(&venue, "SELL-1").await;

    // 사용자가 전량 수동 청산: venue 보유 0

    let engine = engine(ledger.clone(), venue.clone());
    let summary = engine.run_cycle().await.unwrap();

    assert_eq!(summary.positions_closed, 1);
    assert_eq!(summary.reentry_orders_cancelled, 1);
    assert_eq!(summary.orders_cancelled, 1);

    let closed = ledger.get_position(position.id).await.unwrap().unwrap();
    assert_eq!(closed.quantity, Decimal::ZERO);
    assert!(!closed.is_open());
    assert!(closed.invariant_holds());

    let stored_buy = ledger.get_order(executed_buy.id).await.unwrap().unwrap();
    assert_eq!(stored_buy.state, OrderState::Closed);
    let stored_reentry = ledger.get_order(reentry.id).await.unwrap().unwrap();
    assert_eq!(stored_reentry.state, OrderState::Cancelled);
    let stored_sell = ledger.get_order(sell.id).await.unwrap().unwrap();
    assert_eq!(stored_sell.state, OrderState::Cancelled);

    let events = ledger.list_events(position.id).await.unwrap();
    assert!(events.iter().any(|e| e.kind == PositionEventKind::ClosedOut));

    let second = engine.run_cycle().await.unwrap();
    assert!(second.is_quiescent());
}

#[tokio::test]
async fn test_reentry_fill_amends_resting_sell_upward() {
    let ledger = Arc::new(MemoryLedger::new());
    let venue = Arc::new(ScriptedVenue::new());

    let position = ledger
        .open_position(NewPosition {
            symbol: Symbol::new("AAPL"),
            quantity: dec!(35),
            average_price: dec!(185),
        })
        .await
        .unwrap();
    let sell =
        seed_order(&ledger, "AAPL", Side::Sell, EntryType::Initial, dec!(35), "SELL-1").await;
    script_resting(&venue, "SELL-1").await;

    // 재진입 매수 10주가 체결되어 보유량이 45주로 늘어난 상황
    seed_order(&ledger, "AAPL", Side::Buy, EntryType::Reentry, dec!(10), "BUY-2").await;
    venue
        .script_status(
            "BUY-2",
            VenueOrderStatus {
                state: VenueOrderState::Filled,
                filled_quantity: dec!(10),
                average_price: Some(dec!(180)),
                reason: None,
            },
        )
        .await;
    venue.set_holding(Symbol::new("AAPL"), dec!(45)).await;

    let engine = engine(ledger.clone(), venue.clone());
    let summary = engine.run_cycle().await.unwrap();

    assert_eq!(summary.orders_executed, 1);
    assert_eq!(summary.sell_orders_amended, 1);

    let updated = ledger.get_position(position.id).await.unwrap().unwrap();
    assert_eq!(updated.quantity, dec!(45));

    // 매도 주문은 수량만 상향, 가격은 유지된다
    assert_eq!(venue.amend_calls().await, vec![("SELL-1".to_string(), dec!(45), None)]);
    let stored_sell = ledger.get_order(sell.id).await.unwrap().unwrap();
    assert_eq!(stored_sell.quantity, dec!(45));
    assert_eq!(stored_sell.limit_price, sell.limit_price);

    let second = engine.run_cycle().await.unwrap();
    assert!(second.is_quiescent());
}

#[tokio::test]
async fn test_external_addition_is_ignored() {
    let ledger = Arc::new(MemoryLedger::new());
    let venue = Arc::new(ScriptedVenue::new());

    let position = ledger
        .open_position(NewPosition {
            symbol: Symbol::new("AAPL"),
            quantity: dec!(35),
            average_price: dec!(185),
        })
        .await
        .unwrap();

    // 사용자가 수동으로 10주 추가 매수: venue 보유 45
    venue.set_holding(Symbol::new("AAPL"), dec!(45)).await;

    let engine = engine(ledger.clone(), venue);
    let summary = engine.run_cycle().await.unwrap();

    assert_eq!(summary.external_additions_ignored, 1);
    assert!(summary.is_quiescent());

    // 장부는 절대 커지지 않는다
    let stored = ledger.get_position(position.id).await.unwrap().unwrap();
    assert_eq!(stored.quantity, dec!(35));
    assert!(stored.last_reconciled_at.is_some());
}

#[tokio::test]
async fn test_full_outage_leaves_order_pending_until_venue_recovers() {
    let ledger = Arc::new(MemoryLedger::new());
    let venue = Arc::new(ScriptedVenue::new());
    let order = seed_order(&ledger, "AAPL", Side::Buy, EntryType::Initial, dec!(10), "BRK-1").await;

    // 보유량과 상태 조회가 모두 타임아웃하는 전면 장애
    venue
        .fail_next_holdings(VenueError::Timeout("deadline exceeded".into()))
        .await;
    venue
        .fail_next_status(VenueError::Timeout("deadline exceeded".into()))
        .await;

    let engine = engine(ledger.clone(), venue.clone());
    let summary = engine.run_cycle().await.unwrap();

    // 장애 중에는 체결을 단정하지 않는다. 주문은 그대로 남고 심볼만 건너뛴다
    assert_eq!(summary.symbols_skipped, 1);
    assert_eq!(summary.orders_executed, 0);
    assert_eq!(summary.exit_code(), 1);

    let stored = ledger.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.state, OrderState::Pending);
    assert_eq!(stored.filled_quantity, Decimal::ZERO);
    assert!(ledger
        .get_open_position(&Symbol::new("AAPL"))
        .await
        .unwrap()
        .is_none());

    // 장애가 걷히면 다음 사이클이 실제 상태를 반영한다
    venue
        .script_status(
            "BRK-1",
            VenueOrderStatus {
                state: VenueOrderState::Filled,
                filled_quantity: dec!(10),
                average_price: Some(dec!(184)),
                reason: None,
            },
        )
        .await;
    venue.set_holding(Symbol::new("AAPL"), dec!(10)).await;

    let second = engine.run_cycle().await.unwrap();
    assert_eq!(second.orders_executed, 1);
    let stored = ledger.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.state, OrderState::Executed);
}

#[tokio::test]
async fn test_refused_amend_is_retried_by_sweep() {
    let ledger = Arc::new(MemoryLedger::new());
    let venue = Arc::new(ScriptedVenue::new());

    ledger
        .open_position(NewPosition {
            symbol: Symbol::new("AAPL"),
            quantity: dec!(35),
            average_price: dec!(185),
        })
        .await
        .unwrap();
    let sell =
        seed_order(&ledger, "AAPL", Side::Sell, EntryType::Initial, dec!(35), "SELL-1").await;
    script_resting(&venue, "SELL-1").await;
    venue.set_holding(Symbol::new("AAPL"), dec!(30)).await;

    // 첫 사이클에서는 venue가 정정을 거부한다
    venue.script_amend_result("SELL-1", false).await;

    let engine = engine(ledger.clone(), venue.clone());
    let first = engine.run_cycle().await.unwrap();
    assert_eq!(first.positions_reduced, 1);
    assert_eq!(first.sell_orders_amended, 0);
    let stored = ledger.get_order(sell.id).await.unwrap().unwrap();
    assert_eq!(stored.quantity, dec!(35));

    // 드리프트는 이미 해소됐어도 안전망 일소가 다음 사이클에 정정을 회수한다
    venue.script_amend_result("SELL-1", true).await;
    let second = engine.run_cycle().await.unwrap();
    assert_eq!(second.sell_orders_amended, 1);
    let stored = ledger.get_order(sell.id).await.unwrap().unwrap();
    assert_eq!(stored.quantity, dec!(30));

    let third = engine.run_cycle().await.unwrap();
    assert!(third.is_quiescent());
}

#[tokio::test]
async fn test_contradictory_rejection_keeps_fill_and_flags() {
    let ledger = Arc::new(MemoryLedger::new());
    let venue = Arc::new(ScriptedVenue::new());
    let order = seed_order(&ledger, "AAPL", Side::Buy, EntryType::Initial, dec!(10), "BRK-1").await;

    // venue가 전량 체결과 거부를 동시에 보고하는 모순 응답
    venue
        .script_status(
            "BRK-1",
            VenueOrderStatus {
                state: VenueOrderState::Rejected,
                filled_quantity: dec!(10),
                average_price: Some(dec!(184)),
                reason: Some("late rejection".to_string()),
            },
        )
        .await;
    venue.set_holding(Symbol::new("AAPL"), dec!(10)).await;

    let engine = engine(ledger.clone(), venue);
    let summary = engine.run_cycle().await.unwrap();

    // 체결을 믿고, 모순은 검토 플래그로 올린다
    assert_eq!(summary.orders_executed, 1);
    assert_eq!(summary.orders_rejected, 0);
    assert_eq!(summary.flags_raised, 1);

    let stored = ledger.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.state, OrderState::Executed);
    let flags = ledger.list_open_flags().await.unwrap();
    assert_eq!(flags.len(), 1);
    assert!(flags[0].reason.contains("fully filled"));
}

#[tokio::test]
async fn test_venue_rejection_is_recorded_with_reason() {
    let ledger = Arc::new(MemoryLedger::new());
    let venue = Arc::new(ScriptedVenue::new());
    let order = seed_order(&ledger, "AAPL", Side::Buy, EntryType::Initial, dec!(10), "BRK-1").await;

    venue
        .script_status(
            "BRK-1",
            VenueOrderStatus {
                state: VenueOrderState::Rejected,
                filled_quantity: Decimal::ZERO,
                average_price: None,
                reason: Some("insufficient buying power".to_string()),
            },
        )
        .await;

    let engine = engine(ledger.clone(), venue);
    let summary = engine.run_cycle().await.unwrap();

    assert_eq!(summary.orders_rejected, 1);
    let stored = ledger.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.state, OrderState::Rejected);
    assert_eq!(stored.reason.as_deref(), Some("insufficient buying power"));
    assert!(ledger
        .get_open_position(&Symbol::new("AAPL"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_reentry_fill_after_close_refuses_reopen() {
    let ledger = Arc::new(MemoryLedger::new());
    let venue = Arc::new(ScriptedVenue::new());

    // 포지션은 이미 종료되었는데 재진입 체결이 뒤늦게 도착한 상황
    let order =
        seed_order(&ledger, "AAPL", Side::Buy, EntryType::Reentry, dec!(5), "BUY-2").await;
    venue
        .script_status(
            "BUY-2",
            VenueOrderStatus {
                state: VenueOrderState::Filled,
                filled_quantity: dec!(5),
                average_price: Some(dec!(180)),
                reason: None,
            },
        )
        .await;
    venue.set_holding(Symbol::new("AAPL"), dec!(5)).await;

    let engine = engine(ledger.clone(), venue);
    let summary = engine.run_cycle().await.unwrap();

    assert_eq!(summary.orders_executed, 1);
    assert_eq!(summary.flags_raised, 1);

    // 장부 포지션은 다시 열리지 않는다
    assert!(ledger
        .get_open_position(&Symbol::new("AAPL"))
        .await
        .unwrap()
        .is_none());

    let flags = ledger.list_open_flags().await.unwrap();
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].order_id, Some(order.id));
    assert!(flags[0].reason.contains("refusing to reopen"));
}

#[tokio::test]
async fn test_holdings_failure_skips_position_phase() {
    let ledger = Arc::new(MemoryLedger::new());
    let venue = Arc::new(ScriptedVenue::new());

    let position = ledger
        .open_position(NewPosition {
            symbol: Symbol::new("AAPL"),
            quantity: dec!(35),
            average_price: dec!(185),
        })
        .await
        .unwrap();
    venue
        .fail_next_holdings(VenueError::Timeout("deadline exceeded".into()))
        .await;

    let engine = engine(ledger.clone(), venue);
    let summary = engine.run_cycle().await.unwrap();

    // 보유량을 모르면 포지션을 건드리지 않는다 (전량 청산으로 오인 금지)
    assert_eq!(summary.symbols_skipped, 1);
    assert_eq!(summary.positions_examined, 0);
    assert_eq!(summary.exit_code(), 1);

    let stored = ledger.get_position(position.id).await.unwrap().unwrap();
    assert_eq!(stored.quantity, dec!(35));
    assert!(stored.is_open());
}

#[tokio::test]
async fn test_own_sell_fill_reduces_and_closes_position() {
    let ledger = Arc::new(MemoryLedger::new());
    let venue = Arc::new(ScriptedVenue::new());

    let position = ledger
        .open_position(NewPosition {
            symbol: Symbol::new("AAPL"),
            quantity: dec!(10),
            average_price: dec!(185),
        })
        .await
        .unwrap();
    let executed_buy =
        seed_order(&ledger, "AAPL", Side::Buy, EntryType::Initial, dec!(10), "BUY-1").await;
    ledger
        .apply_fill(executed_buy.id, Decimal::ZERO, dec!(10), Some(dec!(185)))
        .await
        .unwrap();

    let sell =
        seed_order(&ledger, "AAPL", Side::Sell, EntryType::Initial, dec!(10), "SELL-1").await;
    venue
        .script_status(
            "SELL-1",
            VenueOrderStatus {
                state: VenueOrderState::Filled,
                filled_quantity: dec!(10),
                average_price: Some(dec!(195)),
                reason: None,
            },
        )
        .await;

    let engine = engine(ledger.clone(), venue);
    let summary = engine.run_cycle().await.unwrap();

    assert_eq!(summary.orders_executed, 1);

    let closed = ledger.get_position(position.id).await.unwrap().unwrap();
    assert!(!closed.is_open());
    assert!(closed.invariant_holds());

    // 매도 자신도 포함해 체결 완료 주문이 모두 마감된다
    for id in [executed_buy.id, sell.id] {
        let stored = ledger.get_order(id).await.unwrap().unwrap();
        assert_eq!(stored.state, OrderState::Closed);
    }

    let events = ledger.list_events(position.id).await.unwrap();
    assert!(events.iter().any(|e| e.kind == PositionEventKind::ClosedOut));
}

#[tokio::test]
async fn test_timeout_order_adopts_broker_id_from_history() {
    let ledger = Arc::new(MemoryLedger::new());
    let venue = Arc::new(ScriptedVenue::new());

    // 발주 타임아웃으로 venue 주문 ID를 모르는 Pending 주문
    let order = NewOrder {
        symbol: Symbol::new("AAPL"),
        side: Side::Buy,
        quantity: dec!(10),
        limit_price: Some(dec!(185)),
        entry_type: EntryType::Initial,
    }
    .into_record();
    ledger.create_order(&order).await.unwrap();

    venue
        .script_history(
            Symbol::new("AAPL"),
            vec![reversal_venue::VenueExecution {
                broker_order_id: "LOST-1".into(),
                state: VenueOrderState::Filled,
                filled_quantity: dec!(10),
                average_price: Some(dec!(184)),
                timestamp: chrono::Utc::now(),
            }],
        )
        .await;
    venue.set_holding(Symbol::new("AAPL"), dec!(10)).await;

    let engine = engine(ledger.clone(), venue);
    let summary = engine.run_cycle().await.unwrap();

    assert_eq!(summary.orders_executed, 1);
    let stored = ledger.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.broker_order_id.as_deref(), Some("LOST-1"));
    assert_eq!(stored.state, OrderState::Executed);

    let position = ledger
        .get_open_position(&Symbol::new("AAPL"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.quantity, dec!(10));
}

#[tokio::test]
async fn test_status_error_skips_symbol_but_not_cycle() {
    let ledger = Arc::new(MemoryLedger::new());
    let venue = Arc::new(ScriptedVenue::new());

    let bad = seed_order(&ledger, "AAPL", Side::Buy, EntryType::Initial, dec!(10), "BAD-1").await;
    let good = seed_order(&ledger, "MSFT", Side::Buy, EntryType::Initial, dec!(5), "GOOD-1").await;

    // AAPL 상태 조회는 인증 에러 (폴백 불가), MSFT는 정상 체결
    venue
        .fail_next_status(VenueError::Unauthorized("token expired".into()))
        .await;
    venue
        .script_status(
            "GOOD-1",
            VenueOrderStatus {
                state: VenueOrderState::Filled,
                filled_quantity: dec!(5),
                average_price: Some(dec!(400)),
                reason: None,
            },
        )
        .await;
    venue.set_holding(Symbol::new("MSFT"), dec!(5)).await;

    let engine = engine(ledger.clone(), venue);
    let summary = engine.run_cycle().await.unwrap();

    assert_eq!(summary.symbols_skipped, 1);
    assert_eq!(summary.orders_executed, 1);
    assert_eq!(summary.exit_code(), 1);

    let stored_bad = ledger.get_order(bad.id).await.unwrap().unwrap();
    assert_eq!(stored_bad.state, OrderState::Pending);
    let stored_good = ledger.get_order(good.id).await.unwrap().unwrap();
    assert_eq!(stored_good.state, OrderState::Executed);
}
