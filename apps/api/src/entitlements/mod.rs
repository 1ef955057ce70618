// Entitlements: purchase-backed tokens with an expiry window and a usage quota.
// Created only by payment intake, mutated only by the debit step in `validator`.

pub mod handlers;
pub mod store;
pub mod token;
pub mod validator;
