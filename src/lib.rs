//! Analytics rollup and query service for the manufacturing portal.
//!
//! Raw operational events are compacted into per-day `daily_kpi` rows and
//! per-period `financial_periods` rows; role-scoped queries are answered from
//! those derived stores.

pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod services;
