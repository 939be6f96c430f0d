//! `reconcile` 명령어.

use reversal_core::AppConfig;
use reversal_execution::{ReconciliationEngine, SymbolLocks};
use tracing::info;

use super::build_context;

/// 정합 사이클을 수행합니다.
///
/// `watch`면 설정 간격으로 상주하며, 아니면 한 번 수행 후
/// 요약 JSON을 출력하고 종료 코드를 반환합니다.
pub async fn run(config: &AppConfig, watch: bool) -> anyhow::Result<i32> {
    let context = build_context(config).await?;
    let engine = ReconciliationEngine::new(context.ledger, context.venue, SymbolLocks::new());

    if watch {
        let interval = config.reconciliation.interval();
        info!(interval_secs = interval.as_secs(), "Starting periodic reconciliation");
        engine.run_periodic(interval).await?;
        return Ok(0);
    }

    let summary = engine.run_cycle().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(summary.exit_code())
}
