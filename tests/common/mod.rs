#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use manufacturing_analytics::{
    config::{AppConfig, AppState},
    db::InMemoryStore,
    models::{
        actor::ActorContext,
        raw_events::{
            DimensionRef, PaymentEntryType, RawCuttingEvent, RawProductionJob, RawShipment,
            RawTailorPaymentEntry, StyleRef,
        },
    },
    services::AnalyticsQueryService,
};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const CRON_SECRET: &str = "test-cron-secret";

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// `hour` o'clock on `date`, UTC (the fixture's business time zone).
pub fn at(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap()))
}

/// One tenant with two vendors, one style each, and two tailors.
pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub state: AppState,
    pub tenant: Uuid,
    pub vendor_a: Uuid,
    pub vendor_b: Uuid,
    pub style_a: Uuid,
    pub style_b: Uuid,
    pub tailor_1: Uuid,
    pub tailor_2: Uuid,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::new(JWT_SECRET, CRON_SECRET)).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let tenant = Uuid::new_v4();
        let (vendor_a, vendor_b) = (Uuid::new_v4(), Uuid::new_v4());
        let (style_a, style_b) = (Uuid::new_v4(), Uuid::new_v4());
        let (tailor_1, tailor_2) = (Uuid::new_v4(), Uuid::new_v4());

        store.add_vendor(DimensionRef { id: vendor_a, tenant_id: tenant, name: "Alpha Apparel".into() }).await;
        store.add_vendor(DimensionRef { id: vendor_b, tenant_id: tenant, name: "Beta Garments".into() }).await;
        store
            .add_style(StyleRef {
                id: style_a,
                tenant_id: tenant,
                vendor_id: vendor_a,
                name: "A-Line Kurta".into(),
                unit_price: Some(Decimal::from(200)),
                fabric_type: Some("cotton".into()),
            })
            .await;
        store
            .add_style(StyleRef {
                id: style_b,
                tenant_id: tenant,
                vendor_id: vendor_b,
                name: "Box Shirt".into(),
                unit_price: Some(Decimal::from(100)),
                fabric_type: Some("linen".into()),
            })
            .await;
        store.add_tailor(DimensionRef { id: tailor_1, tenant_id: tenant, name: "Ravi".into() }).await;
        store.add_tailor(DimensionRef { id: tailor_2, tenant_id: tenant, name: "Meena".into() }).await;

        let state = AppState::from_parts(config, store.clone(), store.clone(), store.clone());

        Self {
            store,
            state,
            tenant,
            vendor_a,
            vendor_b,
            style_a,
            style_b,
            tailor_1,
            tailor_2,
        }
    }

    pub fn vendor_of(&self, style_id: Uuid) -> Uuid {
        if style_id == self.style_a { self.vendor_a } else { self.vendor_b }
    }

    pub async fn cutting(&self, style_id: Uuid, pcs: i64, meters: i64, when: DateTime<Utc>) {
        self.store
            .add_cutting(RawCuttingEvent {
                id: Uuid::new_v4(),
                tenant_id: self.tenant,
                style_id,
                vendor_id: self.vendor_of(style_id),
                quantity_received: pcs,
                fabric_meters: Decimal::from(meters),
                occurred_at: when,
            })
            .await;
    }

    #[allow(clippy::too_many_arguments)]
    pub fn job(
        &self,
        style_id: Uuid,
        tailor_id: Uuid,
        status: &str,
        issued: i64,
        returned: i64,
        rate: i64,
        issued_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> RawProductionJob {
        RawProductionJob {
            id: Uuid::new_v4(),
            tenant_id: self.tenant,
            style_id,
            tailor_id,
            fabric_cutting_id: None,
            issued_pcs: issued,
            returned_pcs: returned,
            rate: Decimal::from(rate),
            status: status.to_string(),
            issue_date: issued_at,
            completed_date: completed_at,
        }
    }

    pub async fn add_job(&self, job: RawProductionJob) {
        self.store.add_job(job).await;
    }

    pub async fn shipment(
        &self,
        style_id: Uuid,
        pcs: i64,
        invoice: Option<i64>,
        shipment_status: &str,
        payment_status: &str,
        when: DateTime<Utc>,
    ) {
        self.store
            .add_shipment(RawShipment {
                id: Uuid::new_v4(),
                tenant_id: self.tenant,
                style_id,
                vendor_id: self.vendor_of(style_id),
                pcs_shipped: pcs,
                invoice_value: invoice.map(Decimal::from),
                payment_status: payment_status.to_string(),
                shipment_status: shipment_status.to_string(),
                size: Some("M".into()),
                shipped_at: when,
            })
            .await;
    }

    pub async fn payment(
        &self,
        tailor_id: Uuid,
        entry_type: PaymentEntryType,
        amount: i64,
        balance_after: i64,
        when: DateTime<Utc>,
    ) {
        self.store
            .add_payment(RawTailorPaymentEntry {
                id: Uuid::new_v4(),
                tenant_id: self.tenant,
                tailor_id,
                entry_type,
                amount: Decimal::from(amount),
                running_balance_after: Decimal::from(balance_after),
                occurred_at: when,
            })
            .await;
    }

    pub async fn refresh(&self, date: NaiveDate) -> usize {
        self.state
            .rollup_service
            .refresh_daily_analytics(Some(self.tenant), date)
            .await
            .unwrap()
            .count
    }

    pub async fn query_as(&self, actor: ActorContext) -> AnalyticsQueryService {
        let mut service = self.state.query_service_for(actor);
        service.init().await.unwrap();
        service
    }

    pub async fn admin(&self) -> AnalyticsQueryService {
        self.query_as(ActorContext::admin(self.tenant)).await
    }
}
