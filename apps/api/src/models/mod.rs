pub mod entitlement;
pub mod resume;
