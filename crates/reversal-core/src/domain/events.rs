//! 포지션 이벤트 저널.
//!
//! 포지션 생애의 각 사건(오픈, 재진입, 축소, 종료)을 타입 있는 이벤트로
//! 기록합니다. 일일 재진입 상한은 별도 주문 레코드를 검색하지 않고
//! 소속 포지션의 이벤트 이력에서 당일 재진입 횟수를 세어 집행합니다.

use crate::types::{Price, Quantity};
use chrono::{DateTime, Duration, LocalResult, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 포지션 이벤트 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionEventKind {
    /// 첫 체결로 포지션 오픈
    Opened,
    /// 재진입 체결 기록 (일일 상한 집계 대상)
    ReentryRecorded,
    /// 정합성 점검이 감지한 외부 축소
    ExternalReduction,
    /// 포지션 종료
    ClosedOut,
}

impl PositionEventKind {
    /// 문자열로 변환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::ReentryRecorded => "reentry_recorded",
            Self::ExternalReduction => "external_reduction",
            Self::ClosedOut => "closed_out",
        }
    }
}

impl std::str::FromStr for PositionEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opened" => Ok(Self::Opened),
            "reentry_recorded" => Ok(Self::ReentryRecorded),
            "external_reduction" => Ok(Self::ExternalReduction),
            "closed_out" => Ok(Self::ClosedOut),
            _ => Err(format!("Unknown position event kind: {}", s)),
        }
    }
}

/// 포지션 이벤트.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionEvent {
    /// 내부 이벤트 ID
    pub id: Uuid,
    /// 소속 포지션 ID
    pub position_id: Uuid,
    /// 이벤트 유형
    pub kind: PositionEventKind,
    /// 관련 수량 (해당 시)
    pub quantity: Option<Quantity>,
    /// 관련 가격 (해당 시)
    pub price: Option<Price>,
    /// 발생 시각
    pub occurred_at: DateTime<Utc>,
}

impl PositionEvent {
    /// 새 이벤트를 생성합니다.
    pub fn new(
        position_id: Uuid,
        kind: PositionEventKind,
        quantity: Option<Quantity>,
        price: Option<Price>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            position_id,
            kind,
            quantity,
            price,
            occurred_at: Utc::now(),
        }
    }
}

/// 주어진 시각이 속한 거래일의 UTC 경계를 반환합니다.
///
/// "당일"은 UTC가 아니라 거래소 현지 시간대의 달력 날짜로 판정합니다.
/// UTC 자정으로 끊으면 한 거래일이 둘로 쪼개집니다.
pub fn trading_day_bounds(tz: Tz, at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = at.with_timezone(&tz).date_naive().and_time(NaiveTime::MIN);
    let start_local = match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt,
        // 시계를 되돌리는 날은 자정이 두 번 온다. 이른 쪽부터 센다
        LocalResult::Ambiguous(earliest, _) => earliest,
        // 서머타임 전환으로 자정이 존재하지 않는 날은 그날 존재하는 첫 시각으로 민다
        LocalResult::None => match tz.from_local_datetime(&(midnight + Duration::hours(1))) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(earliest, _) => earliest,
            LocalResult::None => tz.from_utc_datetime(&midnight),
        },
    };
    let start = start_local.with_timezone(&Utc);
    (start, start + Duration::days(1))
}

/// 이벤트 이력에서 주어진 거래일의 재진입 횟수를 셉니다.
pub fn count_reentries_in_day(
    events: &[PositionEvent],
    tz: Tz,
    at: DateTime<Utc>,
) -> usize {
    let (start, end) = trading_day_bounds(tz, at);
    events
        .iter()
        .filter(|e| e.kind == PositionEventKind::ReentryRecorded)
        .filter(|e| e.occurred_at >= start && e.occurred_at < end)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;
    use rust_decimal_macros::dec;

    fn event_at(kind: PositionEventKind, occurred_at: DateTime<Utc>) -> PositionEvent {
        PositionEvent {
            id: Uuid::new_v4(),
            position_id: Uuid::new_v4(),
            kind,
            quantity: Some(dec!(5)),
            price: None,
            occurred_at,
        }
    }

    #[test]
    fn test_trading_day_bounds_new_york() {
        // 2026-01-15 02:00 UTC는 뉴욕 기준 1월 14일 저녁
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 2, 0, 0).unwrap();
        let (start, end) = trading_day_bounds(New_York, at);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 1, 14, 5, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 1, 15, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_trading_day_bounds_skipped_midnight() {
        use chrono_tz::America::Santiago;
        // 2024-09-08 산티아고는 서머타임 시작으로 자정이 곧장 01:00이 된다
        let at = Utc.with_ymd_and_hms(2024, 9, 8, 15, 0, 0).unwrap();
        let (start, end) = trading_day_bounds(Santiago, at);
        // 거래일은 그날 존재하는 첫 시각(01:00 -03)부터 시작한다
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 9, 8, 4, 0, 0).unwrap());
        assert_eq!(end, start + Duration::days(1));
    }

    #[test]
    fn test_count_reentries_same_day_only() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 18, 0, 0).unwrap();
        let yesterday = now - Duration::days(1);
        let events = vec![
            event_at(PositionEventKind::Opened, yesterday),
            event_at(PositionEventKind::ReentryRecorded, yesterday),
            event_at(PositionEventKind::ReentryRecorded, now - Duration::hours(2)),
            event_at(PositionEventKind::ReentryRecorded, now - Duration::hours(1)),
            event_at(PositionEventKind::ExternalReduction, now),
        ];

        // 전날 재진입은 집계에서 제외
        assert_eq!(count_reentries_in_day(&events, New_York, now), 2);
        assert_eq!(count_reentries_in_day(&events, New_York, yesterday), 1);
    }
}
