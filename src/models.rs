pub mod actor;
pub mod analytics;
pub mod finance;
pub mod raw_events;
