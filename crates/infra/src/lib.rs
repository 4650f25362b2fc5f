pub mod auth;
pub mod config;
pub mod health;
pub mod idempotency;
pub mod logging;
pub mod repositories;
pub mod supabase;
