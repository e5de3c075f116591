use chrono::Utc;
use clap::Parser;
use lockerbook::application::lock::UnitLockManager;
use lockerbook::application::orchestrator::{BookingOrchestrator, CompleteBooking};
use lockerbook::application::promo::PromoCodeEvaluator;
use lockerbook::application::registry::PaymentMethodRegistry;
use lockerbook::domain::booking::{Booking, LateFee, Subscription};
use lockerbook::domain::money::Money;
use lockerbook::domain::ports::{
    BookingStore, BookingStoreRef, FeePolicyStoreRef, PaymentMethodStoreRef, PromoCodeStore,
    PromoCodeStoreRef, SubscriptionStore, SubscriptionStoreRef, TenantStore, TenantStoreRef,
    UnitStore, UnitStoreRef,
};
use lockerbook::domain::promo::{PromoCode, PromoRule};
use lockerbook::domain::tenant::Tenant;
use lockerbook::domain::unit::Unit;
use lockerbook::error::{BookingError, Result};
use lockerbook::infrastructure::gateway::{LogNotifier, SandboxGateway};
use lockerbook::infrastructure::in_memory::{
    InMemoryBookingStore, InMemoryFeePolicyStore, InMemoryPaymentMethodStore,
    InMemoryPromoCodeStore, InMemorySubscriptionStore, InMemoryTenantStore, InMemoryUnitStore,
};
use lockerbook::interfaces::csv::occupancy_writer::OccupancyWriter;
use lockerbook::interfaces::csv::scenario_reader::{BookingCommand, CommandOp, ScenarioReader};
use miette::IntoDiagnostic;
use rust_decimal_macros::dec;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scenario CSV file of booking commands
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

struct Stores {
    units: UnitStoreRef,
    bookings: BookingStoreRef,
    subscriptions: SubscriptionStoreRef,
    tenants: TenantStoreRef,
    promos: PromoCodeStoreRef,
    methods: PaymentMethodStoreRef,
    fees: FeePolicyStoreRef,
}

const DEFAULT_RATE: rust_decimal::Decimal = dec!(100.00);

async fn in_memory_stores() -> Stores {
    let fees = InMemoryFeePolicyStore::new();
    fees.set(LateFee {
        amount: Money::new(dec!(25.00)),
        label: "late payment".to_string(),
    })
    .await;
    Stores {
        units: Arc::new(InMemoryUnitStore::new()),
        bookings: Arc::new(InMemoryBookingStore::new()),
        subscriptions: Arc::new(InMemorySubscriptionStore::new()),
        tenants: Arc::new(InMemoryTenantStore::new()),
        promos: Arc::new(InMemoryPromoCodeStore::new()),
        methods: Arc::new(InMemoryPaymentMethodStore::new()),
        fees: Arc::new(fees),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn rocksdb_stores(path: PathBuf) -> Result<Stores> {
    use lockerbook::infrastructure::rocksdb::RocksStore;

    let store = RocksStore::open(path)?;
    store.set_late_fee(&LateFee {
        amount: Money::new(dec!(25.00)),
        label: "late payment".to_string(),
    })?;
    Ok(Stores {
        units: Arc::new(store.clone()),
        bookings: Arc::new(store.clone()),
        subscriptions: Arc::new(store.clone()),
        tenants: Arc::new(store.clone()),
        promos: Arc::new(store.clone()),
        methods: Arc::new(store.clone()),
        fees: Arc::new(store),
    })
}

/// Replays a scenario file against the orchestrator, provisioning tenants,
/// units, subscriptions and bookings on first reference so scenario files
/// stay small.
struct ScenarioRunner {
    stores: Stores,
    registry: PaymentMethodRegistry,
    orchestrator: BookingOrchestrator,
    next_promo_id: u32,
}

impl ScenarioRunner {
    fn new(stores: Stores) -> Self {
        let gateway = Arc::new(SandboxGateway::new());
        let registry = PaymentMethodRegistry::new(
            stores.methods.clone(),
            stores.tenants.clone(),
            gateway.clone(),
        );
        let orchestrator = BookingOrchestrator::new(
            stores.bookings.clone(),
            stores.subscriptions.clone(),
            stores.tenants.clone(),
            stores.methods.clone(),
            stores.fees.clone(),
            PromoCodeEvaluator::new(stores.promos.clone(), stores.subscriptions.clone()),
            UnitLockManager::new(stores.units.clone()),
            gateway,
            Some(Arc::new(LogNotifier)),
        );
        Self {
            stores,
            registry,
            orchestrator,
            next_promo_id: 1,
        }
    }

    async fn run(&mut self, command: BookingCommand) -> Result<()> {
        match command.op {
            CommandOp::Promo => self.seed_promo(command).await,
            CommandOp::Complete => self.complete(command).await,
            CommandOp::Abandon => {
                self.orchestrator.abandon(required(command.booking, "booking")?).await
            }
            CommandOp::Fee => {
                self.orchestrator
                    .apply_fee(required(command.booking, "booking")?)
                    .await
                    .map(|_| ())
            }
            CommandOp::Refund => {
                self.orchestrator
                    .refund(required(command.booking, "booking")?)
                    .await
                    .map(|_| ())
            }
        }
    }

    async fn seed_promo(&mut self, command: BookingCommand) -> Result<()> {
        let code = command
            .promo
            .ok_or_else(|| BookingError::Validation("promo op needs a code".to_string()))?;
        let percent = command
            .amount
            .ok_or_else(|| BookingError::Validation("promo op needs a percent amount".to_string()))?;
        let promo = PromoCode::new(self.next_promo_id, code, PromoRule::Percent(percent));
        self.next_promo_id += 1;
        self.stores.promos.put(promo).await
    }

    async fn complete(&mut self, command: BookingCommand) -> Result<()> {
        let booking_id = required(command.booking, "booking")?;
        let tenant_id = required(command.tenant, "tenant")?;
        let unit_id = required(command.unit, "unit")?;
        let subscription_id = required(command.subscription, "subscription")?;
        let token = command
            .token
            .ok_or_else(|| BookingError::Validation("complete op needs a token".to_string()))?;

        if self.stores.tenants.get(tenant_id).await?.is_none() {
            self.stores
                .tenants
                .put(Tenant::new(tenant_id, format!("tenant{tenant_id}@example.com")))
                .await?;
        }
        if self.stores.units.get(unit_id).await?.is_none() {
            self.stores.units.put(Unit::new(unit_id)).await?;
        }
        if self.stores.subscriptions.get(subscription_id).await?.is_none() {
            let rate = Money::new(command.amount.unwrap_or(DEFAULT_RATE));
            let months = command.months.unwrap_or(1);
            self.stores
                .subscriptions
                .put(Subscription::new(subscription_id, unit_id, rate, months))
                .await?;
        }
        if self.stores.bookings.get(booking_id).await?.is_none() {
            self.stores
                .bookings
                .put(Booking::new(
                    booking_id,
                    unit_id,
                    tenant_id,
                    Utc::now().date_naive(),
                ))
                .await?;
        }

        let promo_code = match command.promo {
            Some(code) => Some(
                self.stores
                    .promos
                    .find_by_code(&code)
                    .await?
                    .ok_or_else(|| BookingError::InvalidCode(code))?
                    .id,
            ),
            None => None,
        };

        let method = self.registry.register(tenant_id, &token).await?;
        self.orchestrator
            .complete_booking(CompleteBooking {
                tenant: tenant_id,
                subscription: subscription_id,
                booking: booking_id,
                promo_code,
                payment_method: method.id,
                repay: command.repay.unwrap_or(false),
            })
            .await
            .map(|_| ())
    }
}

fn required(value: Option<u32>, field: &str) -> Result<u32> {
    value.ok_or_else(|| BookingError::Validation(format!("missing {field} column")))
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let stores = match cli.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => rocksdb_stores(db_path).into_diagnostic()?,
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            return Err(miette::miette!(
                "this build has no persistent storage; rebuild with --features storage-rocksdb"
            ));
        }
        None => in_memory_stores().await,
    };
    let units = stores.units.clone();
    let mut runner = ScenarioRunner::new(stores);

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = ScenarioReader::new(file);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                if let Err(e) = runner.run(command).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let stdout = io::stdout();
    let mut writer = OccupancyWriter::new(stdout.lock());
    writer
        .write_units(units.all().await.into_diagnostic()?)
        .into_diagnostic()?;

    Ok(())
}
