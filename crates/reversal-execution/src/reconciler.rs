//! 주문/포지션 정합 엔진.
//!
//! 사이클마다 두 단계를 수행합니다:
//!
//! 1. **주문 정합**: 미결 주문의 체결 상태를 venue에서 확정하고,
//!    체결 증가분을 CAS로 장부에 반영한 뒤 포지션에 전파합니다.
//! 2. **포지션 정합**: 장부 수량과 venue 보유량을 비교해 외부 매도를
//!    흡수합니다. venue가 더 크면 절대 장부를 키우지 않습니다.
//!
//! 사이클 꼬리에서 안전망 일소가 열린 포지션의 미체결 매도 수량을
//! 장부 보유량에 다시 맞춥니다. 사이클 중 정정이 거부되거나 실패한
//! 주문은 다음 사이클 일소가 회수합니다.
//!
//! 심볼 락은 장부 변이 구간에만 쥐고, venue 호출은 락 밖에서 합니다.
//! 락 해제 구간의 경쟁은 체결 CAS(`FillOutcome::Stale`)가 감지합니다.
//! venue 변화가 없는 한 사이클은 멱등입니다. 같은 입력으로 두 번 돌면
//! 두 번째 요약은 반드시 무변이(quiescent)입니다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reversal_core::{
    CycleSummary, DriftClass, DriftRecord, EntryType, NewPosition, OrderFilter, OrderRecord,
    OrderState, PositionEvent, PositionEventKind, Quantity, ReviewFlag, Side, Symbol,
};
use reversal_ledger::{FillOutcome, Ledger};
use reversal_venue::{ExecutionVenue, VenueOrderState};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::error::ExecutionResult;
use crate::locks::SymbolLocks;
use crate::resolver::{FilledQuantityResolver, ResolvedFill};
use crate::sync::SellSideSynchronizer;

/// 체결 전파가 포지션에 남긴 변화.
enum FillEffect {
    None,
    /// 기존 포지션이 커짐 (갱신된 수량)
    Grown(Quantity),
    Closed,
}

/// 정합 엔진.
pub struct ReconciliationEngine {
    ledger: Arc<dyn Ledger>,
    venue: Arc<dyn ExecutionVenue>,
    resolver: FilledQuantityResolver,
    synchronizer: SellSideSynchronizer,
    locks: SymbolLocks,
}

impl ReconciliationEngine {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        venue: Arc<dyn ExecutionVenue>,
        locks: SymbolLocks,
    ) -> Self {
        Self {
            resolver: FilledQuantityResolver::new(venue.clone()),
            synchronizer: SellSideSynchronizer::new(ledger.clone(), venue.clone()),
            ledger,
            venue,
            locks,
        }
    }

    /// 정합 사이클 한 번을 수행합니다.
    pub async fn run_cycle(&self) -> ExecutionResult<CycleSummary> {
        let mut summary = CycleSummary::default();

        // 보유량 스냅샷은 사이클당 한 번. 실패해도 주문 정합은 진행한다.
        let holdings = match self.venue.get_holdings().await {
            Ok(holdings) => Some(holdings),
            Err(e) => {
                warn!(error = %e, "Holdings snapshot unavailable, skipping position reconciliation");
                None
            }
        };

        let touched = self
            .reconcile_orders(&mut summary, holdings.as_ref())
            .await?;
        self.reconcile_positions(&mut summary, holdings.as_ref(), &touched)
            .await?;
        self.sweep_resting_sells(&mut summary).await?;

        info!(
            orders_examined = summary.orders_examined,
            orders_executed = summary.orders_executed,
            positions_reduced = summary.positions_reduced,
            positions_closed = summary.positions_closed,
            symbols_skipped = summary.symbols_skipped,
            quiescent = summary.is_quiescent(),
            "Reconciliation cycle complete"
        );
        Ok(summary)
    }

    /// 주기적으로 정합 사이클을 돌립니다. 반환하지 않습니다.
    pub async fn run_periodic(&self, interval: Duration) -> ExecutionResult<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_cycle().await {
                warn!(error = %e, "Reconciliation cycle failed, will retry on next tick");
            }
        }
    }

    /// 1단계: 미결 주문의 체결 상태 정합.
    ///
    /// 이번 사이클에서 장부가 변이된 심볼 집합을 반환합니다.
    /// 보유량 스냅샷은 그 변이 이전의 모습이므로, 해당 심볼의
    /// 포지션 정합은 다음 사이클로 미룹니다.
    async fn reconcile_orders(
        &self,
        summary: &mut CycleSummary,
        holdings: Option<&HashMap<Symbol, Quantity>>,
    ) -> ExecutionResult<HashSet<Symbol>> {
        let pending_filter = OrderFilter {
            states: vec![OrderState::Pending],
            ..Default::default()
        };
        let orders = self.ledger.list_orders(&pending_filter).await?;
        let known_broker_ids: Vec<String> = orders
            .iter()
            .filter_map(|o| o.broker_order_id.clone())
            .collect();

        let mut touched = HashSet::new();
        let mut skipped_symbols = HashSet::new();

        for order in orders {
            summary.orders_examined += 1;

            let ledger_quantity = self
                .ledger
                .get_open_position(&order.symbol)
                .await?
                .map(|p| p.quantity)
                .unwrap_or(Decimal::ZERO);

            // venue 호출은 락 밖에서
            let resolved = match self
                .resolver
                .resolve(&order, holdings, ledger_quantity, &known_broker_ids)
                .await
            {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(symbol = %order.symbol, order_id = %order.id, error = %e, "Fill resolution failed, skipping symbol this cycle");
                    if skipped_symbols.insert(order.symbol.clone()) {
                        summary.symbols_skipped += 1;
                    }
                    continue;
                }
            };

            if self
                .apply_resolution(summary, &order, resolved, &mut touched)
                .await?
            {
                touched.insert(order.symbol.clone());
            }
        }

        Ok(touched)
    }

    /// 확정된 체결 정보를 주문 하나에 반영합니다. 변이가 있으면 true.
    async fn apply_resolution(
        &self,
        summary: &mut CycleSummary,
        order: &OrderRecord,
        resolved: ResolvedFill,
        touched: &mut HashSet<Symbol>,
    ) -> ExecutionResult<bool> {
        if let Some(adopted) = &resolved.adopted_broker_id {
            info!(order_id = %order.id, broker_order_id = %adopted, "Adopted broker order id from history");
            self.ledger.set_broker_order_id(order.id, adopted).await?;
        }

        // 체결 수량은 단조 증가: 엄격히 큰 값만 반영한다
        let delta = resolved.filled_quantity - order.filled_quantity;
        let mut became_executed = false;
        let mut effect = FillEffect::None;

        if delta > Decimal::ZERO {
            let guard = self.locks.acquire(&order.symbol).await;
            let outcome = self
                .ledger
                .apply_fill(
                    order.id,
                    order.filled_quantity,
                    resolved.filled_quantity,
                    resolved.average_price,
                )
                .await?;

            match outcome {
                FillOutcome::Applied { fully_filled } => {
                    became_executed = fully_filled;
                    effect = self
                        .propagate_fill(summary, order, &resolved, delta, fully_filled)
                        .await?;
                }
                FillOutcome::Stale | FillOutcome::NotOpen => {
                    // 락 해제 구간에 다른 경로가 선수를 쳤다. 다음 사이클이 처리한다.
                    debug!(order_id = %order.id, ?outcome, "Concurrent mutation detected, skipping order");
                    drop(guard);
                    return Ok(false);
                }
            }
            drop(guard);
        }

        // 포지션 후속 동기화는 락 해제 후에 수행한다 (venue 호출 포함)
        match effect {
            FillEffect::Closed => {
                touched.insert(order.symbol.clone());
                let sync = self.synchronizer.on_position_closed(&order.symbol).await?;
                summary.reentry_orders_cancelled += sync.reentries_cancelled;
                summary.orders_cancelled += sync.sells_cancelled;
            }
            FillEffect::Grown(quantity) => {
                touched.insert(order.symbol.clone());
                summary.sell_orders_amended += self
                    .synchronizer
                    .align_resting_sells(&order.symbol, quantity)
                    .await?;
            }
            FillEffect::None => {}
        }

        match resolved.state {
            VenueOrderState::Rejected => {
                if became_executed {
                    // 전량 체결과 거부가 같이 보고되는 것은 모순이다.
                    // 체결을 믿되 검토 대상으로 올린다.
                    let flag = ReviewFlag::new(
                        order.symbol.clone(),
                        Some(order.id),
                        "venue reported rejection for a fully filled order",
                    );
                    self.ledger.raise_flag(&flag).await?;
                    warn!(symbol = %order.symbol, order_id = %order.id, "Contradictory rejection for filled order, keeping fill");
                    summary.flags_raised += 1;
                    summary.orders_executed += 1;
                    return Ok(true);
                }
                let reason = resolved.reason.as_deref().unwrap_or("rejected by venue");
                self.ledger.mark_rejected(order.id, reason).await?;
                warn!(symbol = %order.symbol, order_id = %order.id, reason, "Order rejected by venue");
                summary.orders_rejected += 1;
                Ok(true)
            }
            VenueOrderState::Cancelled => {
                if became_executed {
                    // 전량 체결과 취소가 동시에 보고될 수는 없다; 체결을 믿는다
                    summary.orders_executed += 1;
                    return Ok(true);
                }
                self.ledger
                    .mark_cancelled(order.id, resolved.reason.as_deref())
                    .await?;
                summary.orders_cancelled += 1;
                Ok(true)
            }
            _ => {
                if became_executed {
                    summary.orders_executed += 1;
                    Ok(true)
                } else {
                    self.ledger.touch_status_check(order.id, Utc::now()).await?;
                    Ok(delta > Decimal::ZERO)
                }
            }
        }
    }

    /// 체결 증가분을 포지션에 전파합니다.
    ///
    /// 호출자가 심볼 락을 쥔 상태여야 합니다. venue 후속 호출이 필요한
    /// 변화(`Grown`/`Closed`)는 호출자가 락 해제 후 처리합니다.
    async fn propagate_fill(
        &self,
        summary: &mut CycleSummary,
        order: &OrderRecord,
        resolved: &ResolvedFill,
        delta: Quantity,
        fully_filled: bool,
    ) -> ExecutionResult<FillEffect> {
        // 증가분의 정확한 단가는 알 수 없으므로 주문 평균가로 근사한다
        let price = resolved
            .average_price
            .or(order.limit_price)
            .unwrap_or(Decimal::ZERO);
        let position = self.ledger.get_open_position(&order.symbol).await?;

        match order.side {
            Side::Buy => match position {
                Some(position) => {
                    let updated = self.ledger
                        .add_quantity(position.id, delta, price)
                        .await?;
                    if fully_filled && order.entry_type == EntryType::Reentry {
                        self.ledger
                            .record_event(&PositionEvent::new(
                                position.id,
                                PositionEventKind::ReentryRecorded,
                                Some(order.filled_quantity + delta),
                                Some(price),
                            ))
                            .await?;
                    }
                    Ok(FillEffect::Grown(updated.quantity))
                }
                None => {
                    if order.entry_type == EntryType::Reentry {
                        // 포지션이 종료된 뒤 도착한 재진입 체결.
                        // 장부를 다시 열지 않고 검토 대상으로 올린다.
                        let flag = ReviewFlag::new(
                            order.symbol.clone(),
                            Some(order.id),
                            "re-entry fill arrived after position close, refusing to reopen",
                        );
                        self.ledger.raise_flag(&flag).await?;
                        warn!(symbol = %order.symbol, order_id = %order.id, "Refusing to reopen closed position from re-entry fill");
                        summary.flags_raised += 1;
                        Ok(FillEffect::None)
                    } else {
                        self.ledger
                            .open_position(NewPosition {
                                symbol: order.symbol.clone(),
                                quantity: delta,
                                average_price: price,
                            })
                            .await?;
                        Ok(FillEffect::None)
                    }
                }
            },
            Side::Sell => {
                let Some(position) = position else {
                    debug!(symbol = %order.symbol, order_id = %order.id, "Sell fill with no open position, nothing to reduce");
                    return Ok(FillEffect::None);
                };
                let updated = self.ledger.reduce_quantity(position.id, delta).await?;
                if updated.is_open() {
                    Ok(FillEffect::None)
                } else {
                    self.ledger
                        .record_event(&PositionEvent::new(
                            position.id,
                            PositionEventKind::ClosedOut,
                            Some(delta),
                            Some(price),
                        ))
                        .await?;
                    info!(symbol = %order.symbol, "Position closed by own sell fill");
                    Ok(FillEffect::Closed)
                }
            }
        }
    }

    /// 2단계: 장부 수량과 venue 보유량의 정합.
    async fn reconcile_positions(
        &self,
        summary: &mut CycleSummary,
        holdings: Option<&HashMap<Symbol, Quantity>>,
        touched: &HashSet<Symbol>,
    ) -> ExecutionResult<()> {
        let positions = self.ledger.list_open_positions().await?;

        let Some(holdings) = holdings else {
            summary.symbols_skipped += positions.len();
            return Ok(());
        };

        for position in positions {
            // 이번 사이클에 장부가 움직인 심볼은 스냅샷이 이미 낡았다
            if touched.contains(&position.symbol) {
                debug!(symbol = %position.symbol, "Ledger mutated this cycle, deferring position check");
                continue;
            }
            summary.positions_examined += 1;

            let guard = self.locks.acquire(&position.symbol).await;
            // 락 획득 전에 닫혔을 수 있으므로 재확인
            let Some(position) = self.ledger.get_position(position.id).await? else {
                continue;
            };
            if !position.is_open() {
                continue;
            }

            let venue_quantity = holdings
                .get(&position.symbol)
                .copied()
                .unwrap_or(Decimal::ZERO);
            let drift =
                DriftRecord::classify(position.symbol.clone(), position.quantity, venue_quantity);

            match drift.class {
                DriftClass::NoOp => {
                    self.ledger.touch_reconciled(position.id, Utc::now()).await?;
                    drop(guard);
                }
                DriftClass::ExternalAddition => {
                    // 시스템이 사지 않은 물량은 시스템 소관이 아니다
                    info!(symbol = %position.symbol, delta = %drift.delta, "External addition detected, ignoring");
                    self.ledger.touch_reconciled(position.id, Utc::now()).await?;
                    summary.external_additions_ignored += 1;
                    drop(guard);
                }
                DriftClass::ExternalPartialReduction => {
                    let reduction = drift.reduction_quantity();
                    let updated = self
                        .ledger
                        .reduce_quantity(position.id, reduction)
                        .await?;
                    self.ledger
                        .record_event(&PositionEvent::new(
                            position.id,
                            PositionEventKind::ExternalReduction,
                            Some(reduction),
                            None,
                        ))
                        .await?;
                    self.ledger.touch_reconciled(position.id, Utc::now()).await?;
                    summary.positions_reduced += 1;
                    warn!(symbol = %position.symbol, %reduction, remaining = %updated.quantity, "External sale detected, ledger reduced");
                    drop(guard);

                    summary.sell_orders_amended += self
                        .synchronizer
                        .align_resting_sells(&position.symbol, updated.quantity)
                        .await?;
                }
                DriftClass::ExternalFullLiquidation => {
                    let reduction = drift.reduction_quantity();
                    self.ledger.reduce_quantity(position.id, reduction).await?;
                    self.ledger
                        .record_event(&PositionEvent::new(
                            position.id,
                            PositionEventKind::ClosedOut,
                            Some(reduction),
                            None,
                        ))
                        .await?;
                    summary.positions_closed += 1;
                    warn!(symbol = %position.symbol, %reduction, "External liquidation detected, position closed");
                    drop(guard);

                    let sync = self
                        .synchronizer
                        .on_position_closed(&position.symbol)
                        .await?;
                    summary.reentry_orders_cancelled += sync.reentries_cancelled;
                    summary.orders_cancelled += sync.sells_cancelled;
                }
            }
        }

        Ok(())
    }

    /// 안전망 일소: 열린 포지션의 미체결 매도 수량을 장부 보유량에 맞춥니다.
    ///
    /// 사이클 중 정정이 거부되거나 실패하면 장부 수량과 매도 수량이
    /// 어긋난 채 남습니다. 드리프트 분류는 이미 NoOp이므로 드리프트
    /// 경로로는 다시 잡히지 않고, 이 일소가 회수합니다.
    async fn sweep_resting_sells(&self, summary: &mut CycleSummary) -> ExecutionResult<()> {
        for position in self.ledger.list_open_positions().await? {
            summary.sell_orders_amended += self
                .synchronizer
                .align_resting_sells(&position.symbol, position.quantity)
                .await?;
        }
        Ok(())
    }
}
