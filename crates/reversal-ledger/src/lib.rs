//! # Reversal Ledger
//!
//! 주문과 포지션의 영속 장부를 제공합니다.
//!
//! 장부는 내부 진실의 유일한 원천입니다. venue 보유량은 참고 자료일 뿐이며,
//! 시스템 소유 수량의 모든 변이는 이 크레이트의 저장소를 거칩니다.
//!
//! - `OrderStore` / `PositionStore` / `ReviewStore` - 저장소 trait
//! - `PgLedger` - PostgreSQL 구현 (운영)
//! - `MemoryLedger` - 인메모리 구현 (테스트)

pub mod error;
pub mod memory;
pub mod pg;
pub mod store;

pub use error::{LedgerError, LedgerResult};
pub use memory::MemoryLedger;
pub use pg::{connect_pool, run_migrations, PgLedger};
pub use store::{FillOutcome, Ledger, OrderStore, PositionStore, ReviewStore};
