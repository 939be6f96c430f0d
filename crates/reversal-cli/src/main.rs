//! 정합 엔진 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 정합 사이클 한 번 수행
//! reversal reconcile
//!
//! # 30분 간격으로 상주 수행
//! reversal reconcile --watch
//!
//! # 시그널 파일의 거래 의도 발주
//! reversal place -f intents.json
//!
//! # 실패 주문 재시도
//! reversal retry
//!
//! # 미처리 검토 플래그 조회
//! reversal flags
//! ```
//!
//! 모든 서브커맨드는 JSON 요약을 stdout에 출력하고,
//! 조치가 필요한 결과가 있으면 종료 코드 1을 반환합니다.

use clap::{Parser, Subcommand};
use reversal_core::{AppConfig, LogConfig, LogFormat};
use tracing::error;

mod commands;

use commands::{flags, place, reconcile, retry};

#[derive(Parser)]
#[command(name = "reversal")]
#[command(about = "Order and position reconciliation engine for the mean-reversion bot", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 경로
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 주문/포지션 정합 사이클 수행
    Reconcile {
        /// 설정 간격으로 상주 수행 (기본: 한 번만)
        #[arg(long, default_value = "false")]
        watch: bool,
    },

    /// 거래 의도 검증 및 발주
    Place {
        /// 거래 의도 JSON 파일 (TradeIntent 배열)
        #[arg(short, long)]
        file: String,
    },

    /// 실패 주문 재시도
    Retry,

    /// 미처리 검토 플래그 조회 및 처리
    Flags {
        /// 주어진 플래그를 처리 완료로 표시
        #[arg(long, value_name = "FLAG_ID")]
        resolve: Option<uuid::Uuid>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config, e))?;

    let format: LogFormat = config
        .logging
        .format
        .parse()
        .unwrap_or_default();
    if let Err(e) =
        reversal_core::init_logging(LogConfig::new(&config.logging.level).with_format(format))
    {
        eprintln!("failed to initialize logging: {}", e);
    }

    let exit_code = match cli.command {
        Commands::Reconcile { watch } => reconcile::run(&config, watch).await,
        Commands::Place { file } => place::run(&config, &file).await,
        Commands::Retry => retry::run(&config).await,
        Commands::Flags { resolve } => flags::run(&config, resolve).await,
    };

    match exit_code {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!(error = %e, "Command failed");
            std::process::exit(2);
        }
    }
}
