//! PostgreSQL 장부 구현.
//!
//! 상태 전이는 모두 조건부 UPDATE입니다. WHERE 절이 현재 상태를 검사하므로
//! 경쟁하는 두 전이 중 하나만 성공하며, 실패한 쪽은 갱신 0건으로 감지됩니다.
//! 체결 반영의 CAS도 같은 방식입니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reversal_core::{
    DatabaseConfig, EntryType, NewPosition, OrderFilter, OrderRecord, OrderState, PositionEvent,
    PositionEventKind, PositionRecord, Price, Quantity, ReviewFlag, Side, Symbol,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::store::{FillOutcome, OrderStore, PositionStore, ReviewStore};

/// 설정으로부터 커넥션 풀을 생성합니다.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await
}

/// 마이그레이션을 실행합니다.
pub async fn run_migrations(pool: &PgPool) -> LedgerResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| LedgerError::Database(sqlx::Error::Migrate(Box::new(e))))?;
    info!("Database migrations applied");
    Ok(())
}

/// PostgreSQL 장부.
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 전이 UPDATE가 0건이었을 때 원인을 판별합니다.
    async fn explain_failed_transition(&self, id: Uuid, to: OrderState) -> LedgerError {
        match self.get_order(id).await {
            Ok(Some(order)) => LedgerError::InvalidTransition {
                from: order.state,
                to,
            },
            Ok(None) => LedgerError::NotFound(format!("order {}", id)),
            Err(e) => e,
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    broker_order_id: Option<String>,
    symbol: String,
    side: String,
    quantity: Decimal,
    limit_price: Option<Decimal>,
    state: String,
    filled_quantity: Decimal,
    filled_avg_price: Option<Decimal>,
    entry_type: String,
    placed_at: DateTime<Utc>,
    last_status_check_at: Option<DateTime<Utc>>,
    execution_time: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    first_failed_at: Option<DateTime<Utc>>,
    last_retry_attempt_at: Option<DateTime<Utc>>,
    retry_count: i32,
    reason: Option<String>,
}

impl TryFrom<OrderRow> for OrderRecord {
    type Error = LedgerError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(OrderRecord {
            id: row.id,
            broker_order_id: row.broker_order_id,
            symbol: Symbol::new(row.symbol),
            side: row.side.parse::<Side>().map_err(LedgerError::Decode)?,
            quantity: row.quantity,
            limit_price: row.limit_price,
            state: row.state.parse::<OrderState>().map_err(LedgerError::Decode)?,
            filled_quantity: row.filled_quantity,
            filled_avg_price: row.filled_avg_price,
            entry_type: row
                .entry_type
                .parse::<EntryType>()
                .map_err(LedgerError::Decode)?,
            placed_at: row.placed_at,
            last_status_check_at: row.last_status_check_at,
            execution_time: row.execution_time,
            closed_at: row.closed_at,
            first_failed_at: row.first_failed_at,
            last_retry_attempt_at: row.last_retry_attempt_at,
            retry_count: row.retry_count,
            reason: row.reason,
        })
    }
}

#[derive(Debug, FromRow)]
struct PositionRow {
    id: Uuid,
    symbol: String,
    quantity: Decimal,
    average_price: Decimal,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    last_reconciled_at: Option<DateTime<Utc>>,
}

impl From<PositionRow> for PositionRecord {
    fn from(row: PositionRow) -> Self {
        PositionRecord {
            id: row.id,
            symbol: Symbol::new(row.symbol),
            quantity: row.quantity,
            average_price: row.average_price,
            opened_at: row.opened_at,
            closed_at: row.closed_at,
            last_reconciled_at: row.last_reconciled_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PositionEventRow {
    id: Uuid,
    position_id: Uuid,
    kind: String,
    quantity: Option<Decimal>,
    price: Option<Decimal>,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<PositionEventRow> for PositionEvent {
    type Error = LedgerError;

    fn try_from(row: PositionEventRow) -> Result<Self, Self::Error> {
        Ok(PositionEvent {
            id: row.id,
            position_id: row.position_id,
            kind: row
                .kind
                .parse::<PositionEventKind>()
                .map_err(LedgerError::Decode)?,
            quantity: row.quantity,
            price: row.price,
            occurred_at: row.occurred_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReviewFlagRow {
    id: Uuid,
    symbol: String,
    order_id: Option<Uuid>,
    reason: String,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl From<ReviewFlagRow> for ReviewFlag {
    fn from(row: ReviewFlagRow) -> Self {
        ReviewFlag {
            id: row.id,
            symbol: Symbol::new(row.symbol),
            order_id: row.order_id,
            reason: row.reason,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        }
    }
}

#[async_trait]
impl OrderStore for PgLedger {
    async fn create_order(&self, order: &OrderRecord) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, broker_order_id, symbol, side, quantity, limit_price,
                state, filled_quantity, filled_avg_price, entry_type,
                placed_at, retry_count, reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(order.id)
        .bind(&order.broker_order_id)
        .bind(order.symbol.as_str())
        .bind(order.side.as_str())
        .bind(order.quantity)
        .bind(order.limit_price)
        .bind(order.state.as_str())
        .bind(order.filled_quantity)
        .bind(order.filled_avg_price)
        .bind(order.entry_type.as_str())
        .bind(order.placed_at)
        .bind(order.retry_count)
        .bind(&order.reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> LedgerResult<Option<OrderRecord>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(OrderRecord::try_from).transpose()
    }

    async fn list_orders(&self, filter: &OrderFilter) -> LedgerResult<Vec<OrderRecord>> {
        let states: Vec<String> = filter.states.iter().map(|s| s.as_str().to_string()).collect();

        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT *
            FROM orders
            WHERE ($1::text IS NULL OR symbol = $1)
                AND (cardinality($2::text[]) = 0 OR state = ANY($2))
                AND ($3::text IS NULL OR side = $3)
                AND ($4::text IS NULL OR entry_type = $4)
            ORDER BY placed_at ASC
            "#,
        )
        .bind(filter.symbol.as_ref().map(|s| s.as_str().to_string()))
        .bind(&states)
        .bind(filter.side.map(|s| s.as_str().to_string()))
        .bind(filter.entry_type.map(|e| e.as_str().to_string()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRecord::try_from).collect()
    }

    async fn set_broker_order_id(&self, id: Uuid, broker_order_id: &str) -> LedgerResult<()> {
        let result = sqlx::query("UPDATE orders SET broker_order_id = $2 WHERE id = $1")
            .bind(id)
            .bind(broker_order_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(format!("order {}", id)));
        }
        Ok(())
    }

    async fn touch_status_check(&self, id: Uuid, at: DateTime<Utc>) -> LedgerResult<()> {
        sqlx::query("UPDATE orders SET last_status_check_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn apply_fill(
        &self,
        id: Uuid,
        expected_filled: Quantity,
        new_filled: Quantity,
        avg_price: Option<Price>,
    ) -> LedgerResult<FillOutcome> {
        // WHERE가 CAS: 스냅샷 이후 다른 경로가 체결 수량을 바꿨으면 0건 갱신
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            UPDATE orders
            SET filled_quantity = $3,
                filled_avg_price = COALESCE($4, filled_avg_price),
                state = CASE WHEN $3 >= quantity THEN 'executed' ELSE state END,
                execution_time = CASE WHEN $3 >= quantity THEN NOW() ELSE execution_time END,
                last_status_check_at = NOW()
            WHERE id = $1 AND state = 'pending' AND filled_quantity = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected_filled)
        .bind(new_filled)
        .bind(avg_price)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let order = OrderRecord::try_from(row)?;
                Ok(FillOutcome::Applied {
                    fully_filled: order.state == OrderState::Executed,
                })
            }
            None => match self.get_order(id).await? {
                None => Err(LedgerError::NotFound(format!("order {}", id))),
                Some(order) if order.state != OrderState::Pending => {
                    debug!(order_id = %id, state = %order.state, "Fill CAS missed, order no longer open");
                    Ok(FillOutcome::NotOpen)
                }
                Some(order) => {
                    debug!(order_id = %id, filled = %order.filled_quantity, "Fill CAS missed, snapshot stale");
                    Ok(FillOutcome::Stale)
                }
            },
        }
    }

    async fn mark_rejected(&self, id: Uuid, reason: &str) -> LedgerResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET state = 'rejected', reason = $2 WHERE id = $1 AND state = 'pending'",
        )
        .bind(id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_failed_transition(id, OrderState::Rejected).await);
        }
        Ok(())
    }

    async fn mark_cancelled(&self, id: Uuid, reason: Option<&str>) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET state = 'cancelled', reason = COALESCE($2, reason)
            WHERE id = $1 AND state = 'pending'
            "#,
        )
        .bind(id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_failed_transition(id, OrderState::Cancelled).await);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> LedgerResult<()> {
        // first_failed_at은 같은 변이 안에서 비어 있을 때만 설정
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET state = 'failed',
                reason = $2,
                first_failed_at = COALESCE(first_failed_at, NOW())
            WHERE id = $1 AND state IN ('pending', 'retry_pending')
            "#,
        )
        .bind(id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_failed_transition(id, OrderState::Failed).await);
        }
        Ok(())
    }

    async fn mark_retry_pending(&self, id: Uuid) -> LedgerResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET state = 'retry_pending' WHERE id = $1 AND state = 'failed'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(
                self.explain_failed_transition(id, OrderState::RetryPending)
                    .await,
            );
        }
        Ok(())
    }

    async fn mark_pending_for_retry(&self, id: Uuid) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET state = 'pending',
                retry_count = retry_count + 1,
                last_retry_attempt_at = NOW(),
                broker_order_id = NULL
            WHERE id = $1 AND state = 'retry_pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_failed_transition(id, OrderState::Pending).await);
        }
        Ok(())
    }

    async fn mark_closed(&self, id: Uuid) -> LedgerResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET state = 'closed', closed_at = NOW() WHERE id = $1 AND state = 'executed'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_failed_transition(id, OrderState::Closed).await);
        }
        Ok(())
    }

    async fn update_order_quantity(
        &self,
        id: Uuid,
        quantity: Quantity,
        limit_price: Option<Price>,
    ) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET quantity = $2, limit_price = COALESCE($3, limit_price)
            WHERE id = $1 AND state = 'pending'
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(limit_price)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_failed_transition(id, OrderState::Pending).await);
        }
        Ok(())
    }
}

#[async_trait]
impl PositionStore for PgLedger {
    async fn open_position(&self, new: NewPosition) -> LedgerResult<PositionRecord> {
        // 포지션 행과 Opened 이벤트는 한 트랜잭션으로 기록
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PositionRow>(
            r#"
            INSERT INTO positions (id, symbol, quantity, average_price, opened_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.symbol.as_str())
        .bind(new.quantity)
        .bind(new.average_price)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO position_events (id, position_id, kind, quantity, price, occurred_at)
            VALUES ($1, $2, 'opened', $3, $4, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.id)
        .bind(new.quantity)
        .bind(new.average_price)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn get_open_position(&self, symbol: &Symbol) -> LedgerResult<Option<PositionRecord>> {
        let row = sqlx::query_as::<_, PositionRow>(
            "SELECT * FROM positions WHERE symbol = $1 AND closed_at IS NULL",
        )
        .bind(symbol.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn get_position(&self, id: Uuid) -> LedgerResult<Option<PositionRecord>> {
        let row = sqlx::query_as::<_, PositionRow>("SELECT * FROM positions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn list_open_positions(&self) -> LedgerResult<Vec<PositionRecord>> {
        let rows = sqlx::query_as::<_, PositionRow>(
            "SELECT * FROM positions WHERE closed_at IS NULL ORDER BY opened_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn add_quantity(
        &self,
        id: Uuid,
        quantity: Quantity,
        price: Price,
    ) -> LedgerResult<PositionRecord> {
        let row = sqlx::query_as::<_, PositionRow>(
            r#"
            UPDATE positions
            SET average_price = (average_price * quantity + $3 * $2) / (quantity + $2),
                quantity = quantity + $2
            WHERE id = $1 AND closed_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(price)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into)
            .ok_or_else(|| LedgerError::NotFound(format!("open position {}", id)))
    }

    async fn reduce_quantity(&self, id: Uuid, quantity: Quantity) -> LedgerResult<PositionRecord> {
        // 클램프와 0 도달 시 종료가 한 문장에서 일어난다
        let row = sqlx::query_as::<_, PositionRow>(
            r#"
            UPDATE positions
            SET quantity = GREATEST(quantity - $2, 0),
                closed_at = CASE WHEN quantity - $2 <= 0 THEN NOW() ELSE closed_at END
            WHERE id = $1 AND closed_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into)
            .ok_or_else(|| LedgerError::NotFound(format!("open position {}", id)))
    }

    async fn touch_reconciled(&self, id: Uuid, at: DateTime<Utc>) -> LedgerResult<()> {
        sqlx::query("UPDATE positions SET last_reconciled_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_event(&self, event: &PositionEvent) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO position_events (id, position_id, kind, quantity, price, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id)
        .bind(event.position_id)
        .bind(event.kind.as_str())
        .bind(event.quantity)
        .bind(event.price)
        .bind(event.occurred_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_events(&self, position_id: Uuid) -> LedgerResult<Vec<PositionEvent>> {
        let rows = sqlx::query_as::<_, PositionEventRow>(
            "SELECT * FROM position_events WHERE position_id = $1 ORDER BY occurred_at ASC",
        )
        .bind(position_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PositionEvent::try_from).collect()
    }
}

#[async_trait]
impl ReviewStore for PgLedger {
    async fn raise_flag(&self, flag: &ReviewFlag) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO review_flags (id, symbol, order_id, reason, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(flag.id)
        .bind(flag.symbol.as_str())
        .bind(flag.order_id)
        .bind(&flag.reason)
        .bind(flag.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_open_flags(&self) -> LedgerResult<Vec<ReviewFlag>> {
        let rows = sqlx::query_as::<_, ReviewFlagRow>(
            "SELECT * FROM review_flags WHERE resolved_at IS NULL ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn resolve_flag(&self, id: Uuid) -> LedgerResult<()> {
        let result = sqlx::query(
            "UPDATE review_flags SET resolved_at = NOW() WHERE id = $1 AND resolved_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(format!("open review flag {}", id)));
        }
        Ok(())
    }
}
