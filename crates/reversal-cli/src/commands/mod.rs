//! CLI 명령어 구현 모듈.

pub mod flags;
pub mod place;
pub mod reconcile;
pub mod retry;

use std::sync::Arc;

use reversal_core::AppConfig;
use reversal_ledger::{connect_pool, run_migrations, PgLedger};
use reversal_venue::{ExecutionVenue, RestVenue, RestVenueConfig};
use tracing::info;

/// 명령어 공통 의존성.
pub(crate) struct Context {
    pub ledger: Arc<PgLedger>,
    pub venue: Arc<RestVenue>,
}

/// 설정으로부터 장부와 venue를 구성합니다.
pub(crate) async fn build_context(config: &AppConfig) -> anyhow::Result<Context> {
    let pool = connect_pool(&config.database).await?;
    run_migrations(&pool).await?;

    let ledger = Arc::new(PgLedger::new(pool));
    let venue = Arc::new(RestVenue::new(RestVenueConfig::from(&config.venue))?);
    info!(venue = venue.name(), "Context initialized");

    Ok(Context { ledger, venue })
}
