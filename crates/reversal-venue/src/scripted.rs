//! 테스트용 스크립트형 venue.
//!
//! 실제 브로커 없이 정합 엔진과 발주 흐름을 검증하기 위한 인메모리
//! venue입니다. 상태 응답, 과거 주문, 보유량을 시나리오대로 주입하고
//! 실패를 강제할 수 있으며, 모든 호출을 기록해 테스트에서 검증합니다.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reversal_core::{Price, Quantity, Symbol, TradeIntent};
use tokio::sync::RwLock;

use crate::traits::{
    ExecutionVenue, HistoryRange, VenueExecution, VenueOrderState, VenueOrderStatus, VenueResult,
};
use crate::VenueError;

/// venue에 대한 호출 기록.
#[derive(Debug, Clone)]
pub enum RecordedCall {
    Place(TradeIntent),
    Status(String),
    History(Symbol),
    Holdings,
    Cancel(String),
    Amend {
        broker_order_id: String,
        quantity: Quantity,
        price: Option<Price>,
    },
}

#[derive(Default)]
struct ScriptedState {
    /// broker_order_id -> 스크립트된 상태 (None = venue가 모르는 주문)
    statuses: HashMap<String, Option<VenueOrderStatus>>,
    /// 심볼별 과거 주문
    history: HashMap<Symbol, Vec<VenueExecution>>,
    /// 계좌 보유량
    holdings: HashMap<Symbol, Quantity>,
    /// 다음 place_order 호출에 주입할 실패 (FIFO)
    place_failures: VecDeque<VenueError>,
    /// 다음 status 조회에 주입할 실패
    status_failures: VecDeque<VenueError>,
    /// 다음 과거 주문 조회에 주입할 실패
    history_failures: VecDeque<VenueError>,
    /// 다음 보유량 조회에 주입할 실패
    holdings_failures: VecDeque<VenueError>,
    /// 취소/정정 결과 오버라이드
    cancel_results: HashMap<String, bool>,
    amend_results: HashMap<String, bool>,
    /// 호출 기록
    calls: Vec<RecordedCall>,
}

/// 스크립트형 venue.
pub struct ScriptedVenue {
    state: RwLock<ScriptedState>,
    next_id: AtomicU64,
}

impl Default for ScriptedVenue {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedVenue {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ScriptedState::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 주문 상태를 스크립트합니다.
    pub async fn script_status(&self, broker_order_id: &str, status: VenueOrderStatus) {
        self.state
            .write()
            .await
            .statuses
            .insert(broker_order_id.to_string(), Some(status));
    }

    /// venue가 해당 주문을 모른다고 스크립트합니다.
    pub async fn script_status_missing(&self, broker_order_id: &str) {
        self.state
            .write()
            .await
            .statuses
            .insert(broker_order_id.to_string(), None);
    }

    /// 심볼의 과거 주문을 스크립트합니다.
    pub async fn script_history(&self, symbol: Symbol, executions: Vec<VenueExecution>) {
        self.state.write().await.history.insert(symbol, executions);
    }

    /// 보유량 스냅샷을 설정합니다.
    pub async fn set_holding(&self, symbol: Symbol, quantity: Quantity) {
        self.state.write().await.holdings.insert(symbol, quantity);
    }

    /// 다음 place_order 호출이 주어진 에러로 실패하도록 합니다.
    pub async fn fail_next_place(&self, err: VenueError) {
        self.state.write().await.place_failures.push_back(err);
    }

    /// 다음 get_order_status 호출이 주어진 에러로 실패하도록 합니다.
    pub async fn fail_next_status(&self, err: VenueError) {
        self.state.write().await.status_failures.push_back(err);
    }

    /// 다음 get_order_history 호출이 주어진 에러로 실패하도록 합니다.
    pub async fn fail_next_history(&self, err: VenueError) {
        self.state.write().await.history_failures.push_back(err);
    }

    /// 다음 get_holdings 호출이 주어진 에러로 실패하도록 합니다.
    pub async fn fail_next_holdings(&self, err: VenueError) {
        self.state.write().await.holdings_failures.push_back(err);
    }

    /// 취소 결과를 오버라이드합니다 (기본: 알려진 주문이면 true).
    pub async fn script_cancel_result(&self, broker_order_id: &str, ok: bool) {
        self.state
            .write()
            .await
            .cancel_results
            .insert(broker_order_id.to_string(), ok);
    }

    /// 정정 결과를 오버라이드합니다 (기본: 알려진 주문이면 true).
    pub async fn script_amend_result(&self, broker_order_id: &str, ok: bool) {
        self.state
            .write()
            .await
            .amend_results
            .insert(broker_order_id.to_string(), ok);
    }

    /// 지금까지의 호출 기록을 반환합니다.
    pub async fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.state.read().await.calls.clone()
    }

    /// 제출된 주문 intent만 반환합니다.
    pub async fn placed_intents(&self) -> Vec<TradeIntent> {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Place(intent) => Some(intent.clone()),
                _ => None,
            })
            .collect()
    }

    /// 정정 호출만 반환합니다.
    pub async fn amend_calls(&self) -> Vec<(String, Quantity, Option<Price>)> {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Amend {
                    broker_order_id,
                    quantity,
                    price,
                } => Some((broker_order_id.clone(), *quantity, *price)),
                _ => None,
            })
            .collect()
    }

    /// 취소 호출만 반환합니다.
    pub async fn cancel_calls(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Cancel(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ExecutionVenue for ScriptedVenue {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn place_order(&self, intent: &TradeIntent) -> VenueResult<String> {
        let mut state = self.state.write().await;
        state.calls.push(RecordedCall::Place(intent.clone()));

        if let Some(err) = state.place_failures.pop_front() {
            return Err(err);
        }

        let broker_order_id = format!("SCRIPT-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        state.statuses.insert(
            broker_order_id.clone(),
            Some(VenueOrderStatus {
                state: VenueOrderState::Resting,
                filled_quantity: Quantity::ZERO,
                average_price: None,
                reason: None,
            }),
        );
        Ok(broker_order_id)
    }

    async fn get_order_status(
        &self,
        broker_order_id: &str,
    ) -> VenueResult<Option<VenueOrderStatus>> {
        let mut state = self.state.write().await;
        state
            .calls
            .push(RecordedCall::Status(broker_order_id.to_string()));

        if let Some(err) = state.status_failures.pop_front() {
            return Err(err);
        }

        Ok(state
            .statuses
            .get(broker_order_id)
            .cloned()
            .unwrap_or(None))
    }

    async fn get_order_history(
        &self,
        symbol: &Symbol,
        range: HistoryRange,
    ) -> VenueResult<Vec<VenueExecution>> {
        let mut state = self.state.write().await;
        state.calls.push(RecordedCall::History(symbol.clone()));

        if let Some(err) = state.history_failures.pop_front() {
            return Err(err);
        }

        Ok(state
            .history
            .get(symbol)
            .map(|executions| {
                executions
                    .iter()
                    .filter(|e| e.timestamp >= range.from && e.timestamp <= range.to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_holdings(&self) -> VenueResult<HashMap<Symbol, Quantity>> {
        let mut state = self.state.write().await;
        state.calls.push(RecordedCall::Holdings);

        if let Some(err) = state.holdings_failures.pop_front() {
            return Err(err);
        }
        Ok(state.holdings.clone())
    }

    async fn cancel_order(&self, broker_order_id: &str) -> VenueResult<bool> {
        let mut state = self.state.write().await;
        state
            .calls
            .push(RecordedCall::Cancel(broker_order_id.to_string()));

        if let Some(ok) = state.cancel_results.get(broker_order_id) {
            return Ok(*ok);
        }

        match state.statuses.get_mut(broker_order_id) {
            Some(Some(status)) if !status.state.is_complete() => {
                status.state = VenueOrderState::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn amend_order(
        &self,
        broker_order_id: &str,
        quantity: Quantity,
        price: Option<Price>,
    ) -> VenueResult<bool> {
        let mut state = self.state.write().await;
        state.calls.push(RecordedCall::Amend {
            broker_order_id: broker_order_id.to_string(),
            quantity,
            price,
        });

        if let Some(ok) = state.amend_results.get(broker_order_id) {
            return Ok(*ok);
        }

        match state.statuses.get(broker_order_id) {
            Some(Some(status)) if !status.state.is_complete() => Ok(true),
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_place_assigns_ids_and_records_calls() {
        let venue = ScriptedVenue::new();
        let intent = TradeIntent::initial_buy(Symbol::new("AAPL"), dec!(10), Some(dec!(185)));

        let first = venue.place_order(&intent).await.unwrap();
        let second = venue.place_order(&intent).await.unwrap();
        assert_ne!(first, second);

        let status = venue.get_order_status(&first).await.unwrap().unwrap();
        assert_eq!(status.state, VenueOrderState::Resting);
        assert_eq!(venue.placed_intents().await.len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_consumed_once() {
        let venue = ScriptedVenue::new();
        venue
            .fail_next_place(VenueError::Timeout("deadline".into()))
            .await;

        let intent = TradeIntent::initial_buy(Symbol::new("AAPL"), dec!(10), None);
        assert!(matches!(
            venue.place_order(&intent).await,
            Err(VenueError::Timeout(_))
        ));
        // 다음 호출은 정상 동작
        assert!(venue.place_order(&intent).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_only_affects_resting_orders() {
        let venue = ScriptedVenue::new();
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

        assert!(!venue.cancel_order("BRK-1").await.unwrap());
        assert!(!venue.cancel_order("BRK-unknown").await.unwrap());

        let intent = TradeIntent::initial_buy(Symbol::new("AAPL"), dec!(10), None);
        let id = venue.place_order(&intent).await.unwrap();
        assert!(venue.cancel_order(&id).await.unwrap());
        let status = venue.get_order_status(&id).await.unwrap().unwrap();
        assert_eq!(status.state, VenueOrderState::Cancelled);
    }

    #[tokio::test]
    async fn test_history_filters_by_range() {
        let venue = ScriptedVenue::new();
        let symbol = Symbol::new("MSFT");
        let now = Utc::now();
        venue
            .script_history(
                symbol.clone(),
                vec![
                    VenueExecution {
                        broker_order_id: "OLD".into(),
                        state: VenueOrderState::Filled,
                        filled_quantity: dec!(5),
                        average_price: Some(dec!(400)),
                        timestamp: now - chrono::Duration::days(3),
                    },
                    VenueExecution {
                        broker_order_id: "NEW".into(),
                        state: VenueOrderState::Filled,
                        filled_quantity: dec!(7),
                        average_price: Some(dec!(410)),
                        timestamp: now - chrono::Duration::hours(1),
                    },
                ],
            )
            .await;

        let range = HistoryRange::since(now - chrono::Duration::days(1));
        let executions = venue.get_order_history(&symbol, range).await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].broker_order_id, "NEW");
    }
}
