pub mod analytics;
pub mod cron;
