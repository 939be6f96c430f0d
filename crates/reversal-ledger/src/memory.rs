//! 인메모리 장부 구현.
//!
//! PostgreSQL 구현과 같은 의미론(상태 전이 검사, 체결 CAS, 차감 클램프)을
//! 단일 뮤텍스 아래에서 재현합니다. 테스트 전용이지만 테스트 코드는 아니며,
//! 정합 엔진의 통합 테스트가 실제 DB 없이 전체 흐름을 돌리는 데 씁니다.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reversal_core::{
    NewPosition, OrderFilter, OrderRecord, OrderState, PositionEvent, PositionEventKind,
    PositionRecord, Price, Quantity, ReviewFlag, Symbol,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::store::{FillOutcome, OrderStore, PositionStore, ReviewStore};

#[derive(Default)]
struct MemoryState {
    orders: HashMap<Uuid, OrderRecord>,
    positions: HashMap<Uuid, PositionRecord>,
    events: Vec<PositionEvent>,
    flags: Vec<ReviewFlag>,
}

/// 인메모리 장부.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<MemoryState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn transition(order: &mut OrderRecord, to: OrderState) -> LedgerResult<()> {
    if !order.state.can_transition_to(to) {
        return Err(LedgerError::InvalidTransition {
            from: order.state,
            to,
        });
    }
    order.state = to;
    Ok(())
}

fn order_not_found(id: Uuid) -> LedgerError {
    LedgerError::NotFound(format!("order {}", id))
}

#[async_trait]
impl OrderStore for MemoryLedger {
    async fn create_order(&self, order: &OrderRecord) -> LedgerResult<()> {
        self.state
            .lock()
            .await
            .orders
            .insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> LedgerResult<Option<OrderRecord>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> LedgerResult<Vec<OrderRecord>> {
        let state = self.state.lock().await;
        let mut orders: Vec<OrderRecord> = state
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.placed_at);
        Ok(orders)
    }

    async fn set_broker_order_id(&self, id: Uuid, broker_order_id: &str) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or_else(|| order_not_found(id))?;
        order.broker_order_id = Some(broker_order_id.to_string());
        Ok(())
    }

    async fn touch_status_check(&self, id: Uuid, at: DateTime<Utc>) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or_else(|| order_not_found(id))?;
        order.last_status_check_at = Some(at);
        Ok(())
    }

    async fn apply_fill(
        &self,
        id: Uuid,
        expected_filled: Quantity,
        new_filled: Quantity,
        avg_price: Option<Price>,
    ) -> LedgerResult<FillOutcome> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or_else(|| order_not_found(id))?;

        if order.state != OrderState::Pending {
            return Ok(FillOutcome::NotOpen);
        }
        if order.filled_quantity != expected_filled {
            return Ok(FillOutcome::Stale);
        }

        order.filled_quantity = new_filled;
        if avg_price.is_some() {
            order.filled_avg_price = avg_price;
        }
        order.last_status_check_at = Some(Utc::now());

        let fully_filled = new_filled >= order.quantity;
        if fully_filled {
            order.state = OrderState::Executed;
            order.execution_time = Some(Utc::now());
        }

        Ok(FillOutcome::Applied { fully_filled })
    }

    async fn mark_rejected(&self, id: Uuid, reason: &str) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or_else(|| order_not_found(id))?;
        transition(order, OrderState::Rejected)?;
        order.reason = Some(reason.to_string());
        Ok(())
    }

    async fn mark_cancelled(&self, id: Uuid, reason: Option<&str>) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or_else(|| order_not_found(id))?;
        transition(order, OrderState::Cancelled)?;
        if let Some(reason) = reason {
            order.reason = Some(reason.to_string());
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or_else(|| order_not_found(id))?;
        transition(order, OrderState::Failed)?;
        order.reason = Some(reason.to_string());
        // 최초 실패 시각은 한 번만
        if order.first_failed_at.is_none() {
            order.first_failed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_retry_pending(&self, id: Uuid) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or_else(|| order_not_found(id))?;
        transition(order, OrderState::RetryPending)
    }

    async fn mark_pending_for_retry(&self, id: Uuid) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or_else(|| order_not_found(id))?;
        transition(order, OrderState::Pending)?;
        order.retry_count += 1;
        order.last_retry_attempt_at = Some(Utc::now());
        order.broker_order_id = None;
        Ok(())
    }

    async fn mark_closed(&self, id: Uuid) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or_else(|| order_not_found(id))?;
        transition(order, OrderState::Closed)?;
        order.closed_at = Some(Utc::now());
        Ok(())
    }

    async fn update_order_quantity(
        &self,
        id: Uuid,
        quantity: Quantity,
        limit_price: Option<Price>,
    ) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or_else(|| order_not_found(id))?;
        if order.state != OrderState::Pending {
            return Err(LedgerError::InvalidTransition {
                from: order.state,
                to: OrderState::Pending,
            });
        }
        order.quantity = quantity;
        if limit_price.is_some() {
            order.limit_price = limit_price;
        }
        Ok(())
    }
}

#[async_trait]
impl PositionStore for MemoryLedger {
    async fn open_position(&self, new: NewPosition) -> LedgerResult<PositionRecord> {
        let mut state = self.state.lock().await;
        let position = PositionRecord::open(new.symbol, new.quantity, new.average_price);
        state.events.push(PositionEvent::new(
            position.id,
            PositionEventKind::Opened,
            Some(new.quantity),
            Some(new.average_price),
        ));
        state.positions.insert(position.id, position.clone());
        Ok(position)
    }

    async fn get_open_position(&self, symbol: &Symbol) -> LedgerResult<Option<PositionRecord>> {
        Ok(self
            .state
            .lock()
            .await
            .positions
            .values()
            .find(|p| p.is_open() && &p.symbol == symbol)
            .cloned())
    }

    async fn get_position(&self, id: Uuid) -> LedgerResult<Option<PositionRecord>> {
        Ok(self.state.lock().await.positions.get(&id).cloned())
    }

    async fn list_open_positions(&self) -> LedgerResult<Vec<PositionRecord>> {
        let state = self.state.lock().await;
        let mut positions: Vec<PositionRecord> = state
            .positions
            .values()
            .filter(|p| p.is_open())
            .cloned()
            .collect();
        positions.sort_by_key(|p| p.opened_at);
        Ok(positions)
    }

    async fn add_quantity(
        &self,
        id: Uuid,
        quantity: Quantity,
        price: Price,
    ) -> LedgerResult<PositionRecord> {
        let mut state = self.state.lock().await;
        let position = state
            .positions
            .get_mut(&id)
            .filter(|p| p.is_open())
            .ok_or_else(|| LedgerError::NotFound(format!("open position {}", id)))?;
        position.add_fill(quantity, price);
        Ok(position.clone())
    }

    async fn reduce_quantity(&self, id: Uuid, quantity: Quantity) -> LedgerResult<PositionRecord> {
        let mut state = self.state.lock().await;
        let position = state
            .positions
            .get_mut(&id)
            .filter(|p| p.is_open())
            .ok_or_else(|| LedgerError::NotFound(format!("open position {}", id)))?;
        position.reduce(quantity);
        Ok(position.clone())
    }

    async fn touch_reconciled(&self, id: Uuid, at: DateTime<Utc>) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        let position = state
            .positions
            .get_mut(&id)
            .ok_or_else(|| LedgerError::NotFound(format!("position {}", id)))?;
        position.last_reconciled_at = Some(at);
        Ok(())
    }

    async fn record_event(&self, event: &PositionEvent) -> LedgerResult<()> {
        self.state.lock().await.events.push(event.clone());
        Ok(())
    }

    async fn list_events(&self, position_id: Uuid) -> LedgerResult<Vec<PositionEvent>> {
        let state = self.state.lock().await;
        let mut events: Vec<PositionEvent> = state
            .events
            .iter()
            .filter(|e| e.position_id == position_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.occurred_at);
        Ok(events)
    }
}

#[async_trait]
impl ReviewStore for MemoryLedger {
    async fn raise_flag(&self, flag: &ReviewFlag) -> LedgerResult<()> {
        self.state.lock().await.flags.push(flag.clone());
        Ok(())
    }

    async fn list_open_flags(&self) -> LedgerResult<Vec<ReviewFlag>> {
        Ok(self
            .state
            .lock()
            .await
            .flags
            .iter()
            .filter(|f| f.resolved_at.is_none())
            .cloned()
            .collect())
    }

    async fn resolve_flag(&self, id: Uuid) -> LedgerResult<()> {
        let mut state = self.state.lock().await;
        let flag = state
            .flags
            .iter_mut()
            .find(|f| f.id == id && f.resolved_at.is_none())
            .ok_or_else(|| LedgerError::NotFound(format!("open review flag {}", id)))?;
        flag.resolved_at = Some(Utc::now());
        Ok(())
    }
}
