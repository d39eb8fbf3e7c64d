pub mod aggregations;
pub mod finance_service;
pub use finance_service::{CostRates, FinancialPeriodService};
pub mod ledger;
pub mod query_service;
pub use query_service::{AnalyticsQueryService, QueryDeps};
pub mod rollup_service;
pub use rollup_service::RollupService;
pub mod scope;
