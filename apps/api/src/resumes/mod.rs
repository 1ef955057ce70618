// Resume generation: token-gated profile resolution through a three-tier
// cache (Redis → Postgres → profile provider), plus the dashboard listing.

pub mod cache;
pub mod generate;
pub mod handlers;
pub mod resolver;
pub mod store;
