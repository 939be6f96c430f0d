//! `place` 명령어.

use reversal_core::{AppConfig, TradeIntent};
use reversal_execution::{PlacementService, SymbolLocks};
use tracing::info;

use super::build_context;

/// 시그널 파일의 거래 의도를 검증하고 발주합니다.
///
/// 파일은 `TradeIntent` 배열 JSON입니다. 요약 JSON을 출력하고
/// 스킵/실패가 있으면 종료 코드 1을 반환합니다.
pub async fn run(config: &AppConfig, file: &str) -> anyhow::Result<i32> {
    let raw = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("failed to read intent file {}: {}", file, e))?;
    let intents: Vec<TradeIntent> = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("failed to parse intent file {}: {}", file, e))?;
    info!(count = intents.len(), %file, "Loaded trade intents");

    let context = build_context(config).await?;
    let service = PlacementService::new(
        context.ledger,
        context.venue,
        SymbolLocks::new(),
        config.placement.reentry_daily_cap,
        config.placement.timezone()?,
    );

    let summary = service.place_all(&intents).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(summary.exit_code())
}
