// Lottery / turn JSON API layer
// Mirrors the HTTP routes of the savings-group backend as in-process calls

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::envelope::{ApiError, ApiResponse, NOT_FOUND};
use crate::coordinator::{LotteryCoordinator, RotationOptions, RotationStatus};
use crate::error::TandaError;
use crate::store::RotationStore;
use crate::types::{MemberId, PayoutFrequency, Strategy};

// ========== Request/Response Structures ==========

#[derive(Debug, Serialize, Deserialize)]
pub struct ConductRequest {
    pub group_id: String,
    pub members: Vec<MemberId>,
    pub lottery_type: String, // "lottery", "sequential", "contribution_based", "needs_based"
    #[serde(default)]
    pub options: ConductOptions,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductOptions {
    pub contributions: HashMap<MemberId, f64>,
    pub needs_scores: HashMap<MemberId, f64>,
    pub frequency: Option<String>, // "weekly", "biweekly", "monthly"
    pub start_date: Option<DateTime<Utc>>,
    pub force: bool,
}

impl ConductOptions {
    fn into_rotation_options(self) -> Result<RotationOptions, TandaError> {
        let frequency = self.frequency.map(|f| f.parse::<PayoutFrequency>()).transpose()?;
        Ok(RotationOptions {
            contributions: self.contributions,
            needs_scores: self.needs_scores,
            frequency,
            start_date: self.start_date,
            force: self.force,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReconductRequest {
    pub group_id: String,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteTurnRequest {
    pub group_id: String,
    pub user_id: MemberId,
    pub payout_amount: f64,
}

#[derive(Debug, Deserialize)]
struct GroupQuery {
    group_id: String,
}

#[derive(Debug, Deserialize)]
struct MemberQuery {
    group_id: String,
    user_id: MemberId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotteryResultEntry {
    pub user_id: MemberId,
    pub turn_position: u32,
    pub lottery_number: f64,
    pub drawn_at: DateTime<Utc>,
}

/// Rotation status plus the flat `results` list clients render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConductResponse {
    #[serde(flatten)]
    pub status: RotationStatus,
    pub results: Vec<LotteryResultEntry>,
}

impl ConductResponse {
    fn new(status: RotationStatus, drawn_at: DateTime<Utc>) -> Self {
        let results = status
            .turn_order
            .iter()
            .map(|t| LotteryResultEntry {
                user_id: t.member_id.clone(),
                turn_position: t.rank,
                lottery_number: t.draw_number,
                drawn_at,
            })
            .collect();
        Self { status, results }
    }
}

// ========== API ==========

pub struct LotteryApi<S: RotationStore> {
    coordinator: LotteryCoordinator<S>,
}

impl<S: RotationStore> LotteryApi<S> {
    pub fn new(coordinator: LotteryCoordinator<S>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &LotteryCoordinator<S> {
        &self.coordinator
    }

    /// Routes a request by method and path. `query` is the raw query string
    /// (with or without the leading `?`), `body` the raw JSON body.
    pub fn dispatch(&self, method: &str, path: &str, query: &str, body: &str) -> String {
        let path = path.trim_end_matches('/');
        match (method.to_ascii_uppercase().as_str(), path) {
            ("POST", "/lottery/conduct") => self.conduct_json(body),
            ("GET", "/lottery/status") => self.status_json(query),
            ("POST", "/lottery/reconduct") => self.reconduct_json(body),
            ("GET", "/lottery/report") => self.report_json(query),
            ("GET", "/lottery/history") => self.history_json(query),
            ("POST", "/turns/complete") => self.complete_turn_json(body),
            ("GET", "/turns/next") => self.next_recipient_json(query),
            ("GET", "/turns/member-info") => self.member_info_json(query),
            (method, path) => {
                tracing::debug!(method, path, "no route");
                ApiResponse::<()>::failure(ApiError::new(
                    NOT_FOUND,
                    format!("No route for {method} {path}"),
                ))
                .to_json()
            }
        }
    }

    /// `POST /lottery/conduct`
    pub fn conduct_json(&self, body: &str) -> String {
        self.respond(|| {
            let request: ConductRequest = parse_body(body)?;
            let strategy: Strategy = request.lottery_type.parse()?;
            let options = request.options.into_rotation_options()?;
            let status = self.coordinator.initialize_group_rotation(
                &request.group_id,
                request.members,
                strategy,
                options,
            )?;
            let drawn_at = status.created_at;
            Ok(ConductResponse::new(status, drawn_at))
        })
    }

    /// `GET /lottery/status?group_id=`
    pub fn status_json(&self, query: &str) -> String {
        self.respond(|| {
            let q: GroupQuery = parse_query(query)?;
            Ok(self.coordinator.get_rotation_status(&q.group_id)?)
        })
    }

    /// `POST /lottery/reconduct`
    pub fn reconduct_json(&self, body: &str) -> String {
        self.respond(|| {
            let request: ReconductRequest = parse_body(body)?;
            let status = self.coordinator.re_conduct_lottery(&request.group_id, &request.reason)?;
            let drawn_at = status.last_drawn_at.unwrap_or(status.created_at);
            Ok(ConductResponse::new(status, drawn_at))
        })
    }

    /// `POST /turns/complete`
    pub fn complete_turn_json(&self, body: &str) -> String {
        self.respond(|| {
            let request: CompleteTurnRequest = parse_body(body)?;
            Ok(self.coordinator.record_payout_completion(
                &request.group_id,
                &request.user_id,
                request.payout_amount,
            )?)
        })
    }

    /// `GET /turns/member-info?group_id=&user_id=`
    pub fn member_info_json(&self, query: &str) -> String {
        self.respond(|| {
            let q: MemberQuery = parse_query(query)?;
            Ok(self.coordinator.get_member_turn_info(&q.group_id, &q.user_id)?)
        })
    }

    /// `GET /turns/next?group_id=`; `data` is `null` once the rotation is complete.
    pub fn next_recipient_json(&self, query: &str) -> String {
        self.respond(|| {
            let q: GroupQuery = parse_query(query)?;
            Ok(self.coordinator.get_next_payout_recipient(&q.group_id)?)
        })
    }

    /// `GET /lottery/report?group_id=`
    pub fn report_json(&self, query: &str) -> String {
        self.respond(|| {
            let q: GroupQuery = parse_query(query)?;
            Ok(self.coordinator.generate_rotation_report(&q.group_id)?)
        })
    }

    /// `GET /lottery/history?group_id=`
    pub fn history_json(&self, query: &str) -> String {
        self.respond(|| {
            let q: GroupQuery = parse_query(query)?;
            Ok(self.coordinator.get_lottery_history(&q.group_id)?)
        })
    }

    fn respond<T: Serialize>(&self, handler: impl FnOnce() -> Result<T, ApiError>) -> String {
        match handler() {
            Ok(data) => ApiResponse::ok(data, self.coordinator.now()).to_json(),
            Err(error) => {
                tracing::debug!(code = %error.code, message = %error.message, "request failed");
                ApiResponse::<T>::failure(error).to_json()
            }
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body)
        .map_err(|e| ApiError::invalid_request(format!("Invalid request format: {e}")))
}

/// Decodes an `application/x-www-form-urlencoded` query into `T`.
fn parse_query<T: DeserializeOwned>(query: &str) -> Result<T, ApiError> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let params: serde_json::Map<String, serde_json::Value> =
        url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), serde_json::Value::String(v.into_owned())))
            .collect();
    serde_json::from_value(serde_json::Value::Object(params))
        .map_err(|e| ApiError::invalid_request(format!("Invalid query parameters: {e}")))
}
