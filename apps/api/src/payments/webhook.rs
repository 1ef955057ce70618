//! Wire format of the payment provider's webhook envelope.
//!
//! The body is kept as a raw JSON tree and each field is read on demand,
//! accepting a string or a number wherever the provider has been seen to send
//! either. Only a body that is not JSON at all is treated as an unhandled event.

use serde_json::Value;
use subtle::ConstantTimeEq;

/// The only event type that grants an entitlement.
pub const PAID_EVENT: &str = "billing.paid";

/// Billing statuses treated as terminal-paid. Compared case-insensitively.
pub const PAID_STATUSES: &[&str] = &["PAID", "ACTIVE"];

#[derive(Debug, Default)]
pub struct PaymentEvent {
    raw: Value,
}

impl PaymentEvent {
    /// Parses a raw body, falling back to an empty (ignored) event on malformed JSON.
    pub fn parse_lenient(body: &[u8]) -> Self {
        Self {
            raw: serde_json::from_slice(body).unwrap_or_default(),
        }
    }

    pub fn event_type(&self) -> Option<&str> {
        self.raw.get("event").and_then(Value::as_str)
    }

    pub fn is_paid_event(&self) -> bool {
        self.event_type() == Some(PAID_EVENT)
    }

    fn billing(&self) -> Option<&Value> {
        self.raw.pointer("/data/billing")
    }

    fn billing_field(&self, name: &str) -> Option<&Value> {
        self.billing().and_then(|b| b.get(name))
    }

    pub fn transaction_id(&self) -> Option<String> {
        self.billing_field("id").and_then(scalar_text)
    }

    pub fn identity(&self) -> Option<String> {
        self.billing()
            .and_then(|b| b.pointer("/customer/metadata/taxId"))
            .and_then(scalar_text)
    }

    pub fn status(&self) -> String {
        self.billing_field("status")
            .and_then(scalar_text)
            .unwrap_or_else(|| "UNKNOWN".to_string())
    }

    /// `paidAmount` when present and non-zero, otherwise `amount`, otherwise 0.
    pub fn amount_paid(&self) -> i64 {
        self.billing_field("paidAmount")
            .and_then(minor_units)
            .filter(|amount| *amount != 0)
            .or_else(|| self.billing_field("amount").and_then(minor_units))
            .unwrap_or(0)
    }
}

/// Non-empty text from a JSON string or number.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// An amount from a JSON number or a numeric string, rounded to an integer.
fn minor_units(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.round() as i64)
            })
        }
        _ => None,
    }
}

pub fn is_paid_status(status: &str) -> bool {
    PAID_STATUSES
        .iter()
        .any(|paid| paid.eq_ignore_ascii_case(status.trim()))
}

/// Constant-time comparison of the shared webhook secret.
pub fn secret_matches(expected: &str, provided: Option<&str>) -> bool {
    match provided {
        Some(provided) => expected.as_bytes().ct_eq(provided.as_bytes()).into(),
        None => false,
    }
}
