//! 정합성 점검 레코드 및 사이클 요약.
//!
//! 사이클마다 심볼별로 장부 수량과 venue 보유량을 비교한 결과를
//! 일시적 레코드로 분류하고, 스케줄러/CLI에 돌려줄 구조화된 요약을 정의합니다.

use crate::types::{Quantity, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 장부 대비 venue 보유량 편차의 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftClass {
    /// 일치, 조치 없음
    NoOp,
    /// 외부 부분 매도 감지 (장부 축소)
    ExternalPartialReduction,
    /// 외부 전량 청산 감지 (포지션 종료)
    ExternalFullLiquidation,
    /// 외부 추가 취득 (의도적으로 무시)
    ExternalAddition,
}

impl std::fmt::Display for DriftClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoOp => write!(f, "no_op"),
            Self::ExternalPartialReduction => write!(f, "external_partial_reduction"),
            Self::ExternalFullLiquidation => write!(f, "external_full_liquidation"),
            Self::ExternalAddition => write!(f, "external_addition"),
        }
    }
}

/// 사이클당 심볼별 정합성 점검 레코드 (일시적, 영속화하지 않음).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftRecord {
    /// 점검 대상 심볼
    pub symbol: Symbol,
    /// 장부상 시스템 소유 수량
    pub ledger_quantity: Quantity,
    /// venue 총 보유량 (비시스템 물량 포함 가능)
    pub venue_quantity: Quantity,
    /// venue - ledger
    pub delta: Quantity,
    /// 편차 분류
    pub class: DriftClass,
}

impl DriftRecord {
    /// 장부/venue 수량을 비교하여 편차를 분류합니다.
    ///
    /// 시스템은 스스로 매수한 물량에 대해서만 권위를 가집니다.
    /// 현실이 더 작으면 장부를 줄이고, 현실이 더 크면 절대 장부를
    /// 키우지 않습니다 (무관한 수동 매수일 수 있음). 이 비대칭은
    /// 명시적인 비즈니스 선택이며 그대로 보존되어야 합니다.
    pub fn classify(symbol: Symbol, ledger_quantity: Quantity, venue_quantity: Quantity) -> Self {
        let delta = venue_quantity - ledger_quantity;
        let class = if venue_quantity == ledger_quantity {
            DriftClass::NoOp
        } else if venue_quantity.is_zero() && ledger_quantity > Decimal::ZERO {
            DriftClass::ExternalFullLiquidation
        } else if venue_quantity < ledger_quantity {
            DriftClass::ExternalPartialReduction
        } else {
            DriftClass::ExternalAddition
        };

        Self {
            symbol,
            ledger_quantity,
            venue_quantity,
            delta,
            class,
        }
    }

    /// 장부에서 차감해야 할 수량을 반환합니다 (축소 계열만 양수).
    pub fn reduction_quantity(&self) -> Quantity {
        match self.class {
            DriftClass::ExternalPartialReduction | DriftClass::ExternalFullLiquidation => {
                self.ledger_quantity - self.venue_quantity
            }
            _ => Decimal::ZERO,
        }
    }
}

/// 정합성 사이클 요약.
///
/// 스케줄러/CLI에 반환되며 JSON으로 직렬화 가능합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleSummary {
    /// 점검한 미결 주문 수
    pub orders_examined: usize,
    /// 전량 체결로 전이된 주문 수
    pub orders_executed: usize,
    /// venue 거부로 전이된 주문 수
    pub orders_rejected: usize,
    /// 취소로 전이된 주문 수
    pub orders_cancelled: usize,
    /// 점검한 포지션 수
    pub positions_examined: usize,
    /// 외부 매도로 축소된 포지션 수
    pub positions_reduced: usize,
    /// 외부 청산으로 종료된 포지션 수
    pub positions_closed: usize,
    /// 무시한 외부 추가 취득 수
    pub external_additions_ignored: usize,
    /// 동기화기가 정정한 매도 주문 수
    pub sell_orders_amended: usize,
    /// 취소한 잔여 재진입 매수 주문 수
    pub reentry_orders_cancelled: usize,
    /// venue 오류 등으로 건너뛴 심볼 수
    pub symbols_skipped: usize,
    /// 올린 검토 플래그 수
    pub flags_raised: usize,
}

impl CycleSummary {
    /// 사이클이 아무 변이도 만들지 않았는지 확인합니다.
    ///
    /// venue 변화가 없을 때 두 번째 사이클은 반드시 참이어야 합니다 (멱등성).
    pub fn is_quiescent(&self) -> bool {
        self.orders_executed == 0
            && self.orders_rejected == 0
            && self.orders_cancelled == 0
            && self.positions_reduced == 0
            && self.positions_closed == 0
            && self.sell_orders_amended == 0
            && self.reentry_orders_cancelled == 0
    }

    /// 프로세스 종료 코드를 반환합니다 (건너뛴 심볼이 있으면 비정상).
    pub fn exit_code(&self) -> i32 {
        if self.symbols_skipped > 0 {
            1
        } else {
            0
        }
    }
}

/// 개별 발주 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum PlacementOutcome {
    /// 발주 성공
    Placed { symbol: Symbol, order_id: uuid::Uuid },
    /// 제출 전 로컬 검증 실패 (venue 호출 없음)
    Skipped { symbol: Symbol, reason: String },
    /// venue 거부 (터미널)
    Rejected { symbol: Symbol, reason: String },
    /// 일시 오류로 실패 (재시도 대상)
    Failed { symbol: Symbol, reason: String },
}

/// 발주 요약.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlacementSummary {
    /// 발주 성공 수
    pub placed: usize,
    /// 사전 검증 탈락 수
    pub skipped: usize,
    /// venue 거부 수
    pub rejected: usize,
    /// 일시 실패 수
    pub failed: usize,
    /// 개별 결과
    pub outcomes: Vec<PlacementOutcome>,
}

impl PlacementSummary {
    /// 결과를 집계에 반영합니다.
    pub fn record(&mut self, outcome: PlacementOutcome) {
        match &outcome {
            PlacementOutcome::Placed { .. } => self.placed += 1,
            PlacementOutcome::Skipped { .. } => self.skipped += 1,
            PlacementOutcome::Rejected { .. } => self.rejected += 1,
            PlacementOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    /// 프로세스 종료 코드를 반환합니다.
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 {
            1
        } else {
            0
        }
    }
}

/// 재시도 실행 요약.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrySummary {
    /// 재시도 대상으로 검토한 주문 수
    pub examined: usize,
    /// 재제출에 성공한 주문 수
    pub resubmitted: usize,
    /// 백오프 미경과로 대기한 주문 수
    pub deferred: usize,
    /// 재시도 한도 소진으로 포기한 주문 수
    pub exhausted: usize,
    /// 재제출이 다시 실패한 주문 수
    pub failed_again: usize,
}

impl RetrySummary {
    /// 프로세스 종료 코드를 반환합니다.
    pub fn exit_code(&self) -> i32 {
        if self.exhausted > 0 || self.failed_again > 0 {
            1
        } else {
            0
        }
    }
}
