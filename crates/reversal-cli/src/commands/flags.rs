//! `flags` 명령어.

use reversal_core::AppConfig;
use reversal_ledger::ReviewStore;
use tracing::info;
use uuid::Uuid;

use super::build_context;

/// 미처리 검토 플래그를 조회하거나 처리 완료로 표시합니다.
///
/// 조회 시 미처리 플래그가 있으면 종료 코드 1을 반환합니다.
pub async fn run(config: &AppConfig, resolve: Option<Uuid>) -> anyhow::Result<i32> {
    let context = build_context(config).await?;

    if let Some(id) = resolve {
        context.ledger.resolve_flag(id).await?;
        info!(flag_id = %id, "Review flag resolved");
        return Ok(0);
    }

    let flags = context.ledger.list_open_flags().await?;
    println!("{}", serde_json::to_string_pretty(&flags)?);
    Ok(if flags.is_empty() { 0 } else { 1 })
}
