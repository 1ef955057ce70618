// Payment Intake: turns at-least-once `billing.paid` webhooks into exactly one
// entitlement per transaction id.

pub mod handlers;
pub mod intake;
pub mod webhook;
