//! # Reversal Core
//!
//! 평균회귀 트레이딩 시스템의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 주문 레코드 및 주문 상태 머신
//! - 포지션 추적 (시스템 소유 수량만)
//! - 거래 의도 (시그널 생성기로부터의 입력)
//! - 정합성 점검 레코드 및 사이클 요약
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use logging::*;
pub use types::*;
