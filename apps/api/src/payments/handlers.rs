use axum::{
    extract::{Query, State},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::payments::intake::{IntakeOutcome, PaymentIntake};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    #[serde(default, rename = "webhookSecret")]
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_token: Option<String>,
}

/// POST /webhook/payment?webhookSecret=…
///
/// 200 `{status: "ignored"}` for events we don't act on,
/// 200 `{status: "ok", resume_token}` on acceptance (including redeliveries).
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    body: Bytes,
) -> Result<Json<WebhookResponse>, AppError> {
    let intake = PaymentIntake {
        store: state.entitlements.as_ref(),
        policy: state.config.entitlement_policy,
        webhook_secret: &state.config.webhook_secret,
    };

    let outcome = intake
        .ingest(query.webhook_secret.as_deref(), &body, Utc::now())
        .await?;

    Ok(Json(match outcome {
        IntakeOutcome::Ignored => WebhookResponse {
            status: "ignored",
            resume_token: None,
        },
        IntakeOutcome::Accepted {
            transaction_id,
            token,
            duplicate,
        } => {
            info!("Payment webhook accepted: transaction={transaction_id} duplicate={duplicate}");
            WebhookResponse {
                status: "ok",
                resume_token: Some(token),
            }
        }
    }))
}
