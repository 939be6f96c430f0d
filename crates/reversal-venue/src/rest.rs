//! 범용 REST venue 어댑터.
//!
//! 특정 증권사 API의 세부 사항에 의존하지 않는 JSON-over-HTTP 어댑터입니다.
//! 요청은 HMAC-SHA256으로 서명하며, 엔드포인트 경로는 고정된 규약을 따릅니다:
//!
//! - `POST   /orders`              주문 제출
//! - `GET    /orders/{id}`         주문 상태 조회
//! - `GET    /orders?symbol=...`   과거 주문 조회
//! - `GET    /holdings`            보유량 스냅샷
//! - `DELETE /orders/{id}`         주문 취소
//! - `PATCH  /orders/{id}`         주문 정정
//!
//! 타임아웃은 `VenueError::Timeout`(결과 불명)으로 매핑되며
//! 절대 거부로 해석되지 않습니다.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use reversal_core::{Price, Quantity, Symbol, TradeIntent, VenueConfig};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::traits::{
    ExecutionVenue, HistoryRange, VenueExecution, VenueOrderState, VenueOrderStatus, VenueResult,
};
use crate::VenueError;

type HmacSha256 = Hmac<Sha256>;

/// REST venue 어댑터 설정.
#[derive(Debug, Clone)]
pub struct RestVenueConfig {
    /// venue 이름 (로그 식별용)
    pub name: String,
    /// API 기본 URL
    pub base_url: String,
    /// API 키
    pub api_key: String,
    /// HMAC 서명용 시크릿
    pub api_secret: String,
    /// 요청 타임아웃
    pub timeout: Duration,
}

impl From<&VenueConfig> for RestVenueConfig {
    fn from(config: &VenueConfig) -> Self {
        Self {
            name: config.name.clone(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// 범용 REST venue.
pub struct RestVenue {
    config: RestVenueConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct PlaceOrderBody<'a> {
    symbol: &'a str,
    side: &'a str,
    quantity: Quantity,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_price: Option<Price>,
}

#[derive(Debug, Deserialize)]
struct PlaceOrderResponse {
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct OrderStatusResponse {
    status: String,
    filled_quantity: Quantity,
    #[serde(default)]
    average_price: Option<Price>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryEntry {
    order_id: String,
    status: String,
    filled_quantity: Quantity,
    #[serde(default)]
    average_price: Option<Price>,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct HoldingsResponse {
    holdings: HashMap<String, Quantity>,
}

#[derive(Debug, Serialize)]
struct AmendOrderBody {
    quantity: Quantity,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_price: Option<Price>,
}

#[derive(Debug, Deserialize)]
struct AckResponse {
    ok: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

fn parse_state(raw: &str) -> VenueResult<VenueOrderState> {
    match raw {
        "resting" | "open" | "accepted" => Ok(VenueOrderState::Resting),
        "partially_filled" => Ok(VenueOrderState::PartiallyFilled),
        "filled" | "complete" => Ok(VenueOrderState::Filled),
        "cancelled" => Ok(VenueOrderState::Cancelled),
        "rejected" => Ok(VenueOrderState::Rejected),
        other => Err(VenueError::Parse(format!("unknown order status: {}", other))),
    }
}

impl RestVenue {
    /// 새 REST venue를 생성합니다.
    pub fn new(config: RestVenueConfig) -> VenueResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VenueError::Unknown(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// `{timestamp}{method}{path}`를 HMAC-SHA256으로 서명합니다.
    fn sign(&self, timestamp: &str, method: &str, path: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.config.api_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(timestamp.as_bytes());
        mac.update(method.as_bytes());
        mac.update(path.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = self.sign(&timestamp, method.as_str(), path);
        self.client
            .request(method, format!("{}{}", self.config.base_url, path))
            .header("X-API-KEY", &self.config.api_key)
            .header("X-TIMESTAMP", timestamp)
            .header("X-SIGNATURE", signature)
    }

    /// 공통 HTTP 상태 코드를 에러로 매핑합니다.
    async fn check_status(response: reqwest::Response) -> VenueResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: ErrorResponse = serde_json::from_str(&body).unwrap_or(ErrorResponse {
            code: status.as_u16() as i32,
            message: body.clone(),
        });

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                VenueError::Unauthorized(parsed.message)
            }
            StatusCode::TOO_MANY_REQUESTS => VenueError::RateLimited,
            StatusCode::NOT_FOUND => VenueError::OrderNotFound(parsed.message),
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => {
                VenueError::OrderRejected(parsed.message)
            }
            _ => VenueError::Api {
                code: parsed.code,
                message: parsed.message,
            },
        })
    }
}

#[async_trait]
impl ExecutionVenue for RestVenue {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn place_order(&self, intent: &TradeIntent) -> VenueResult<String> {
        let body = PlaceOrderBody {
            symbol: intent.symbol.as_str(),
            side: intent.side.as_str(),
            quantity: intent.quantity,
            limit_price: intent.limit_price,
        };

        debug!(venue = %self.config.name, symbol = %intent.symbol, "Placing order");

        let response = self
            .request(reqwest::Method::POST, "/orders")
            .json(&body)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let parsed: PlaceOrderResponse = response.json().await?;

        Ok(parsed.order_id)
    }

    async fn get_order_status(
        &self,
        broker_order_id: &str,
    ) -> VenueResult<Option<VenueOrderStatus>> {
        let path = format!("/orders/{}", broker_order_id);
        let response = self.request(reqwest::Method::GET, &path).send().await?;

        // venue가 모르는 주문은 에러가 아니라 "없음"
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = Self::check_status(response).await?;
        let parsed: OrderStatusResponse = response.json().await?;

        Ok(Some(VenueOrderStatus {
            state: parse_state(&parsed.status)?,
            filled_quantity: parsed.filled_quantity,
            average_price: parsed.average_price,
            reason: parsed.reason,
        }))
    }

    async fn get_order_history(
        &self,
        symbol: &Symbol,
        range: HistoryRange,
    ) -> VenueResult<Vec<VenueExecution>> {
        let path = format!(
            "/orders?symbol={}&from={}&to={}",
            symbol,
            range.from.to_rfc3339(),
            range.to.to_rfc3339()
        );
        let response = self.request(reqwest::Method::GET, &path).send().await?;
        let response = Self::check_status(response).await?;
        let entries: Vec<HistoryEntry> = response.json().await?;

        entries
            .into_iter()
            .map(|e| {
                Ok(VenueExecution {
                    broker_order_id: e.order_id,
                    state: parse_state(&e.status)?,
                    filled_quantity: e.filled_quantity,
                    average_price: e.average_price,
                    timestamp: e.timestamp,
                })
            })
            .collect()
    }

    async fn get_holdings(&self) -> VenueResult<HashMap<Symbol, Quantity>> {
        let response = self.request(reqwest::Method::GET, "/holdings").send().await?;
        let response = Self::check_status(response).await?;
        let parsed: HoldingsResponse = response.json().await?;

        Ok(parsed
            .holdings
            .into_iter()
            .map(|(ticker, qty)| (Symbol::new(ticker), qty))
            .collect())
    }

    async fn cancel_order(&self, broker_order_id: &str) -> VenueResult<bool> {
        let path = format!("/orders/{}", broker_order_id);
        let response = self.request(reqwest::Method::DELETE, &path).send().await?;

        // 이미 사라진 주문의 취소는 실패가 아님
        if response.status() == StatusCode::NOT_FOUND {
            warn!(venue = %self.config.name, broker_order_id, "Cancel target not found");
            return Ok(false);
        }

        let response = Self::check_status(response).await?;
        let parsed: AckResponse = response.json().await?;
        Ok(parsed.ok)
    }

    async fn amend_order(
        &self,
        broker_order_id: &str,
        quantity: Quantity,
        price: Option<Price>,
    ) -> VenueResult<bool> {
        let path = format!("/orders/{}", broker_order_id);
        let body = AmendOrderBody {
            quantity,
            limit_price: price,
        };

        let response = self
            .request(reqwest::Method::PATCH, &path)
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            warn!(venue = %self.config.name, broker_order_id, "Amend target not found");
            return Ok(false);
        }

        let response = Self::check_status(response).await?;
        let parsed: AckResponse = response.json().await?;
        Ok(parsed.ok)
    }
}
