//! 제한된 지수 백오프 정책.
//!
//! 발주 실패의 재시도 간격을 결정합니다. 재시도는 무한 루프가 아니라
//! 카운터와 상한을 가진 상태 머신(`Failed → RetryPending → Pending`)이며,
//! 이 모듈은 그 중 "지금 재시도해도 되는가" 판정만 담당합니다.

use chrono::{DateTime, Duration, Utc};

/// 재시도 정책.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 최대 재시도 횟수
    pub max_retries: i32,
    /// 기본 대기
    pub base_delay: Duration,
    /// 대기 상한
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::seconds(30),
            max_delay: Duration::minutes(10),
        }
    }
}

/// 재시도 판정 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// 지금 재시도 가능
    RetryNow,
    /// 백오프 미경과, 주어진 시각 이후 재시도
    Deferred(DateTime<Utc>),
    /// 재시도 한도 소진 (터미널)
    Exhausted,
}

impl RetryPolicy {
    /// 새 정책을 생성합니다.
    pub fn new(max_retries: i32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// n번째 재시도 전 대기 시간을 반환합니다 (지터 제외).
    ///
    /// 0번째 재시도는 base_delay, 이후 매회 두 배, max_delay에서 포화.
    pub fn delay_for(&self, retry_count: i32) -> Duration {
        let exponent = retry_count.clamp(0, 30) as u32;
        let multiplier = 1i64 << exponent.min(20);
        let delay = self.base_delay * multiplier as i32;
        delay.min(self.max_delay)
    }

    /// 실패 주문의 재시도 가능 여부를 판정합니다.
    ///
    /// `retry_count`는 지금까지의 재시도 횟수,
    /// `last_attempt_at`은 최초 실패 또는 마지막 재시도 시각입니다.
    pub fn evaluate(
        &self,
        retry_count: i32,
        last_attempt_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> RetryDecision {
        if retry_count >= self.max_retries {
            return RetryDecision::Exhausted;
        }

        match last_attempt_at {
            None => RetryDecision::RetryNow,
            Some(last) => {
                let eligible_at = last + self.delay_for(retry_count);
                if now >= eligible_at {
                    RetryDecision::RetryNow
                } else {
                    RetryDecision::Deferred(eligible_at)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_and_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::seconds(30));
        assert_eq!(policy.delay_for(1), Duration::seconds(60));
        assert_eq!(policy.delay_for(2), Duration::seconds(120));
        // 상한 포화
        assert_eq!(policy.delay_for(10), Duration::minutes(10));
    }

    #[test]
    fn test_exhausted_after_max_retries() {
        let policy = RetryPolicy::default();
        let now = Utc::now();
        assert_eq!(policy.evaluate(3, Some(now), now), RetryDecision::Exhausted);
        assert_eq!(policy.evaluate(5, None, now), RetryDecision::Exhausted);
    }

    #[test]
    fn test_deferred_until_backoff_elapses() {
        let policy = RetryPolicy::default();
        let now = Utc::now();
        let just_failed = now - Duration::seconds(5);

        match policy.evaluate(0, Some(just_failed), now) {
            RetryDecision::Deferred(at) => assert_eq!(at, just_failed + Duration::seconds(30)),
            other => panic!("expected Deferred, got {:?}", other),
        }

        let long_ago = now - Duration::seconds(31);
        assert_eq!(
            policy.evaluate(0, Some(long_ago), now),
            RetryDecision::RetryNow
        );
    }
}
