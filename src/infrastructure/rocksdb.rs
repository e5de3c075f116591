use crate::domain::booking::{Booking, LateFee, Subscription};
use crate::domain::payment::PaymentMethod;
use crate::domain::ports::{
    BookingStore, FeePolicyStore, NewPaymentMethod, PaymentMethodStore, PromoCodeStore,
    SubscriptionStore, TenantStore, UnitStore,
};
use crate::domain::promo::PromoCode;
use crate::domain::tenant::Tenant;
use crate::domain::unit::{LockOutcome, Unit, UnitStatus};
use crate::domain::{BookingId, PaymentMethodId, PromoCodeId, SubscriptionId, TenantId, UnitId};
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CF_UNITS: &str = "units";
pub const CF_BOOKINGS: &str = "bookings";
pub const CF_SUBSCRIPTIONS: &str = "subscriptions";
pub const CF_TENANTS: &str = "tenants";
pub const CF_PROMOS: &str = "promos";
pub const CF_PAYMENTS: &str = "payments";
pub const CF_META: &str = "meta";

const META_PAYMENT_SEQ: &str = "payment_method_seq";
const META_LATE_FEE: &str = "late_fee";

/// Persistent store implementation backed by RocksDB.
///
/// One column family per entity, JSON-encoded values. Conditional unit
/// operations and id allocation serialize through `write_gate` so the
/// check-and-set on `locked_by` is a single atomic step for every clone of
/// this store within the process.
#[derive(Clone)]
pub struct RocksStore {
    db: Arc<DB>,
    write_gate: Arc<Mutex<()>>,
}

impl RocksStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [
            CF_UNITS,
            CF_BOOKINGS,
            CF_SUBSCRIPTIONS,
            CF_TENANTS,
            CF_PROMOS,
            CF_PAYMENTS,
            CF_META,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cfs).map_err(BookingError::internal)?;
        Ok(Self {
            db: Arc::new(db),
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            BookingError::internal(std::io::Error::other(format!(
                "column family {name} not found"
            )))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: u32) -> Result<Option<T>> {
        let cf = self.cf(cf)?;
        let bytes = self
            .db
            .get_cf(cf, key.to_be_bytes())
            .map_err(BookingError::internal)?;
        match bytes {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(BookingError::internal)?,
            )),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf: &str, key: u32, value: &T) -> Result<()> {
        let cf = self.cf(cf)?;
        let bytes = serde_json::to_vec(value).map_err(BookingError::internal)?;
        self.db
            .put_cf(cf, key.to_be_bytes(), bytes)
            .map_err(BookingError::internal)?;
        Ok(())
    }

    fn scan_json<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, bytes) = item.map_err(BookingError::internal)?;
            values.push(serde_json::from_slice(&bytes).map_err(BookingError::internal)?);
        }
        Ok(values)
    }

    /// Installs or replaces the active late-fee policy.
    pub fn set_late_fee(&self, fee: &LateFee) -> Result<()> {
        let cf = self.cf(CF_META)?;
        let bytes = serde_json::to_vec(fee).map_err(BookingError::internal)?;
        self.db
            .put_cf(cf, META_LATE_FEE, bytes)
            .map_err(BookingError::internal)?;
        Ok(())
    }
}

#[async_trait]
impl UnitStore for RocksStore {
    async fn get(&self, unit_id: UnitId) -> Result<Option<Unit>> {
        self.get_json(CF_UNITS, unit_id)
    }

    async fn put(&self, unit: Unit) -> Result<()> {
        self.put_json(CF_UNITS, unit.id, &unit)
    }

    async fn all(&self) -> Result<Vec<Unit>> {
        self.scan_json(CF_UNITS)
    }

    async fn lock_if_free(
        &self,
        unit_id: UnitId,
        booking: BookingId,
        at: DateTime<Utc>,
    ) -> Result<LockOutcome> {
        let _gate = self.write_gate.lock().await;
        let mut unit: Unit = self
            .get_json(CF_UNITS, unit_id)?
            .ok_or_else(|| BookingError::NotFound(format!("unit {unit_id}")))?;
        if unit.status == UnitStatus::Booked {
            return Ok(LockOutcome::AlreadyLocked {
                by: unit.booked_by.unwrap_or(booking),
            });
        }
        match unit.locked_by {
            Some(holder) if holder != booking => Ok(LockOutcome::AlreadyLocked { by: holder }),
            _ => {
                unit.lock(booking, at);
                self.put_json(CF_UNITS, unit_id, &unit)?;
                Ok(LockOutcome::Acquired)
            }
        }
    }

    async fn unlock_if_held(&self, unit_id: UnitId, booking: BookingId) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let mut unit: Unit = self
            .get_json(CF_UNITS, unit_id)?
            .ok_or_else(|| BookingError::NotFound(format!("unit {unit_id}")))?;
        if unit.is_locked_by(booking) {
            unit.unlock();
            self.put_json(CF_UNITS, unit_id, &unit)?;
        }
        Ok(())
    }

    async fn mark_booked(&self, unit_id: UnitId, booking: BookingId) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let mut unit: Unit = self
            .get_json(CF_UNITS, unit_id)?
            .ok_or_else(|| BookingError::NotFound(format!("unit {unit_id}")))?;
        if !unit.is_locked_by(booking) {
            return Err(BookingError::Conflict(format!(
                "unit {unit_id} is not locked by booking {booking}"
            )));
        }
        unit.book();
        self.put_json(CF_UNITS, unit_id, &unit)
    }
}

#[async_trait]
impl BookingStore for RocksStore {
    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        self.get_json(CF_BOOKINGS, booking_id)
    }

    async fn put(&self, booking: Booking) -> Result<()> {
        self.put_json(CF_BOOKINGS, booking.id, &booking)
    }
}

#[async_trait]
impl SubscriptionStore for RocksStore {
    async fn get(&self, subscription_id: SubscriptionId) -> Result<Option<Subscription>> {
        self.get_json(CF_SUBSCRIPTIONS, subscription_id)
    }

    async fn put(&self, subscription: Subscription) -> Result<()> {
        self.put_json(CF_SUBSCRIPTIONS, subscription.id, &subscription)
    }
}

#[async_trait]
impl TenantStore for RocksStore {
    async fn get(&self, tenant_id: TenantId) -> Result<Option<Tenant>> {
        self.get_json(CF_TENANTS, tenant_id)
    }

    async fn put(&self, tenant: Tenant) -> Result<()> {
        self.put_json(CF_TENANTS, tenant.id, &tenant)
    }
}

#[async_trait]
impl PromoCodeStore for RocksStore {
    async fn get(&self, promo_id: PromoCodeId) -> Result<Option<PromoCode>> {
        self.get_json(CF_PROMOS, promo_id)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCode>> {
        let promos: Vec<PromoCode> = self.scan_json(CF_PROMOS)?;
        Ok(promos.into_iter().find(|p| p.code == code))
    }

    async fn put(&self, promo: PromoCode) -> Result<()> {
        self.put_json(CF_PROMOS, promo.id, &promo)
    }
}

#[async_trait]
impl PaymentMethodStore for RocksStore {
    async fn get(&self, method_id: PaymentMethodId) -> Result<Option<PaymentMethod>> {
        self.get_json(CF_PAYMENTS, method_id)
    }

    async fn find_by_fingerprint(
        &self,
        tenant: TenantId,
        fingerprint: &str,
    ) -> Result<Option<PaymentMethod>> {
        let methods: Vec<PaymentMethod> = self.scan_json(CF_PAYMENTS)?;
        Ok(methods
            .into_iter()
            .find(|m| m.tenant == tenant && m.fingerprint == fingerprint))
    }

    async fn insert(&self, new: NewPaymentMethod) -> Result<PaymentMethod> {
        let _gate = self.write_gate.lock().await;
        let cf = self.cf(CF_META)?;
        let next_id = match self
            .db
            .get_cf(cf, META_PAYMENT_SEQ)
            .map_err(BookingError::internal)?
        {
            Some(bytes) => {
                let bytes: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    BookingError::internal(std::io::Error::other("corrupt payment sequence"))
                })?;
                u32::from_be_bytes(bytes) + 1
            }
            None => 1,
        };
        self.db
            .put_cf(cf, META_PAYMENT_SEQ, next_id.to_be_bytes())
            .map_err(BookingError::internal)?;

        let method = PaymentMethod {
            id: next_id,
            tenant: new.tenant,
            kind: new.profile.kind,
            fingerprint: new.profile.fingerprint,
            external_ref: new.external_ref,
            last4: new.profile.last4,
            expiry: new.profile.expiry,
        };
        self.put_json(CF_PAYMENTS, method.id, &method)?;
        Ok(method)
    }
}

#[async_trait]
impl FeePolicyStore for RocksStore {
    async fn active_fee(&self) -> Result<Option<LateFee>> {
        let cf = self.cf(CF_META)?;
        let bytes = self
            .db
            .get_cf(cf, META_LATE_FEE)
            .map_err(BookingError::internal)?;
        match bytes {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(BookingError::internal)?,
            )),
            None => Ok(None),
        }
    }
}
