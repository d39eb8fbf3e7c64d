// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::{FixedOffset, NaiveTime};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;

use crate::{
    common::{
        dates::BusinessClock,
        status_sets::{StatusSet, StatusSets},
    },
    db::{
        DailyKpiRepository, DailyKpiStore, FinancialPeriodRepository, FinancialPeriodStore,
        RawEventRepository, RawEventSource,
    },
    models::actor::ActorContext,
    services::{
        AnalyticsQueryService, CostRates, FinancialPeriodService, QueryDeps, RollupService,
    },
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_FALLBACK_MAX_DAYS: i64 = 31;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub cron_secret: String,
    pub bind_addr: String,
    /// Offset of the business time zone; all day boundaries use it.
    pub business_offset: FixedOffset,
    pub currency: String,
    pub statuses: StatusSets,
    pub cost_rates: CostRates,
    pub fallback_max_days: i64,
    /// Local time of the in-process daily run. `None` leaves scheduling to the cron route.
    pub schedule_at: Option<NaiveTime>,
}

impl AppConfig {
    /// Defaults for everything except the two secrets.
    pub fn new(jwt_secret: impl Into<String>, cron_secret: impl Into<String>) -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: jwt_secret.into(),
            cron_secret: cron_secret.into(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            business_offset: BusinessClock::utc().offset(),
            currency: DEFAULT_CURRENCY.to_string(),
            statuses: StatusSets::default(),
            cost_rates: CostRates::default(),
            fallback_max_days: DEFAULT_FALLBACK_MAX_DAYS,
            schedule_at: None,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::new(required("JWT_SECRET")?, required("CRON_SECRET")?);
        config.database_url = required("DATABASE_URL")?;

        if let Some(addr) = optional("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(currency) = optional("CURRENCY") {
            config.currency = currency;
        }

        let offset_minutes: i32 = parse_or("BUSINESS_UTC_OFFSET_MINUTES", 0)?;
        config.business_offset = FixedOffset::east_opt(offset_minutes * 60)
            .with_context(|| format!("BUSINESS_UTC_OFFSET_MINUTES out of range: {}", offset_minutes))?;

        // Status sets: comma separated lists replace the defaults.
        let statuses = &mut config.statuses;
        override_set(&mut statuses.completed, "COMPLETED_STATUSES");
        override_set(&mut statuses.in_production, "IN_PRODUCTION_STATUSES");
        override_set(&mut statuses.receivable_shipment, "RECEIVABLE_SHIPMENT_STATUSES");
        override_set(&mut statuses.unpaid_payment, "UNPAID_PAYMENT_STATUSES");

        config.cost_rates = CostRates {
            fabric_cost_per_meter: parse_or("FABRIC_COST_PER_METER", Decimal::ZERO)?,
            daily_overhead: parse_or("DAILY_OVERHEAD", Decimal::ZERO)?,
            daily_depreciation: parse_or("DAILY_DEPRECIATION", Decimal::ZERO)?,
            daily_interest: parse_or("DAILY_INTEREST", Decimal::ZERO)?,
            tax_rate_pct: parse_or("TAX_RATE_PCT", Decimal::ZERO)?,
        };

        config.fallback_max_days = parse_or("ANALYTICS_FALLBACK_MAX_DAYS", DEFAULT_FALLBACK_MAX_DAYS)?;

        config.schedule_at = optional("ANALYTICS_SCHEDULE_AT")
            .map(|raw| {
                NaiveTime::parse_from_str(&raw, "%H:%M")
                    .with_context(|| format!("ANALYTICS_SCHEDULE_AT must be HH:MM, got '{}'", raw))
            })
            .transpose()?;

        Ok(config)
    }

    pub fn clock(&self) -> BusinessClock {
        BusinessClock::new(self.business_offset)
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name).with_context(|| format!("{} must be set", name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, raw, e)),
        None => Ok(default),
    }
}

fn override_set(set: &mut StatusSet, name: &str) {
    if let Some(list) = optional(name) {
        *set = StatusSet::parse(&list);
    }
}

// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub source: Arc<dyn RawEventSource>,
    pub kpi_store: Arc<dyn DailyKpiStore>,
    pub rollup_service: RollupService,
    pub finance_service: FinancialPeriodService,
}

impl AppState {
    /// Connects to Postgres, runs the migrations and wires the repositories.
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("failed to connect to the database")?;

        tracing::info!("✅ Database connection established");

        sqlx::migrate!()
            .run(&db_pool)
            .await
            .context("failed to run database migrations")?;

        tracing::info!("✅ Database migrations applied");

        Ok(Self::from_parts(
            config,
            Arc::new(RawEventRepository::new(db_pool.clone())),
            Arc::new(DailyKpiRepository::new(db_pool.clone())),
            Arc::new(FinancialPeriodRepository::new(db_pool)),
        ))
    }

    /// Builds the dependency graph over arbitrary stores.
    pub fn from_parts(
        config: AppConfig,
        source: Arc<dyn RawEventSource>,
        kpi_store: Arc<dyn DailyKpiStore>,
        period_store: Arc<dyn FinancialPeriodStore>,
    ) -> Self {
        let clock = config.clock();
        let statuses = Arc::new(config.statuses.clone());

        let rollup_service =
            RollupService::new(source.clone(), kpi_store.clone(), statuses.clone(), clock);
        let finance_service = FinancialPeriodService::new(
            source.clone(),
            period_store,
            statuses,
            config.cost_rates.clone(),
            clock,
        );

        Self {
            config: Arc::new(config),
            source,
            kpi_store,
            rollup_service,
            finance_service,
        }
    }

    pub fn clock(&self) -> BusinessClock {
        self.config.clock()
    }

    /// A fresh, uninitialized query service for one request.
    pub fn query_service_for(&self, actor: ActorContext) -> AnalyticsQueryService {
        AnalyticsQueryService::new(
            actor,
            QueryDeps {
                kpi_store: self.kpi_store.clone(),
                source: self.source.clone(),
                rollup: self.rollup_service.clone(),
                clock: self.clock(),
                currency: self.config.currency.clone(),
                fallback_max_days: self.config.fallback_max_days,
            },
        )
    }
}
