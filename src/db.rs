pub mod stores;
pub use stores::{DailyKpiStore, FinancialPeriodStore, RawEventSource};
pub mod raw_events_repo;
pub use raw_events_repo::RawEventRepository;
pub mod daily_kpi_repo;
pub use daily_kpi_repo::DailyKpiRepository;
pub mod financial_period_repo;
pub use financial_period_repo::FinancialPeriodRepository;
pub mod memory;
pub use memory::InMemoryStore;
