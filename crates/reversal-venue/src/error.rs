//! venue 게이트웨이 에러 타입.
//!
//! 에러 분류 체계:
//! - *일시적* (타임아웃, 한도 초과, 네트워크) - 자동 재시도, 첫 발생에서 터미널 아님
//! - *거부* - 터미널, 사유와 함께 기록
//! - 확정 응답의 부재는 항상 "결과 불명"이며 성공도 실패도 아님

use thiserror::Error;

/// venue 관련 에러.
#[derive(Debug, Error)]
pub enum VenueError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 요청 타임아웃 - 결과 불명, 거부로 해석 금지
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// venue가 주문을 거부함 (터미널)
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// 주문을 찾을 수 없음
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    Parse(String),

    /// venue API 에러 코드
    #[error("API error {code}: {message}")]
    Api { code: i32, message: String },

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl VenueError {
    /// 재시도 가능한 일시적 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VenueError::Network(_) | VenueError::Timeout(_) | VenueError::RateLimited
        )
    }

    /// 재시도하면 안 되는 터미널 에러인지 확인.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VenueError::Unauthorized(_) | VenueError::OrderRejected(_)
        )
    }

    /// 결과를 알 수 없는 에러인지 확인.
    ///
    /// 타임아웃은 주문이 접수되었을 수도 있으므로, 다음 사이클이
    /// 가정 대신 재조회로 해소해야 합니다.
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, VenueError::Timeout(_) | VenueError::Network(_))
    }
}

impl From<reqwest::Error> for VenueError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VenueError::Timeout(err.to_string())
        } else if err.is_connect() {
            VenueError::Network(err.to_string())
        } else {
            VenueError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for VenueError {
    fn from(err: serde_json::Error) -> Self {
        VenueError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(VenueError::Timeout("t".into()).is_retryable());
        assert!(VenueError::RateLimited.is_retryable());
        assert!(VenueError::Network("n".into()).is_retryable());
        assert!(!VenueError::OrderRejected("r".into()).is_retryable());
    }

    #[test]
    fn test_rejection_is_fatal_not_unknown() {
        let err = VenueError::OrderRejected("insufficient funds".into());
        assert!(err.is_fatal());
        assert!(!err.is_outcome_unknown());
    }

    #[test]
    fn test_timeout_is_unknown_outcome() {
        let err = VenueError::Timeout("deadline exceeded".into());
        assert!(err.is_outcome_unknown());
        assert!(!err.is_fatal());
    }
}
