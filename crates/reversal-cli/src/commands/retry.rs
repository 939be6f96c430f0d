//! `retry` 명령어.

use chrono::Duration;
use reversal_core::AppConfig;
use reversal_execution::{RetryRunner, SymbolLocks};
use reversal_venue::RetryPolicy;

use super::build_context;

/// 실패 주문을 재시도합니다.
///
/// 요약 JSON을 출력하고 한도 소진 또는 재실패가 있으면
/// 종료 코드 1을 반환합니다.
pub async fn run(config: &AppConfig) -> anyhow::Result<i32> {
    let context = build_context(config).await?;
    let policy = RetryPolicy::new(
        config.placement.max_retries,
        Duration::seconds(config.placement.retry_base_delay_secs as i64),
        Duration::seconds(config.placement.retry_max_delay_secs as i64),
    );
    let runner = RetryRunner::new(context.ledger, context.venue, SymbolLocks::new(), policy);

    let summary = runner.run().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(summary.exit_code())
}
