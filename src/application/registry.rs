use crate::domain::payment::PaymentMethod;
use crate::domain::ports::{
    GatewayRef, NewPaymentMethod, PaymentGateway, PaymentMethodStore, PaymentMethodStoreRef,
    TenantStore, TenantStoreRef,
};
use crate::domain::TenantId;
use crate::error::{BookingError, Result};
use tracing::{debug, info};

/// Registers a tenant's payment instruments, deduplicated by content
/// fingerprint.
///
/// An instrument the tenant already uses is returned unchanged without any
/// gateway-side registration; only genuinely new instruments are attached to
/// the tenant's gateway customer and persisted.
pub struct PaymentMethodRegistry {
    methods: PaymentMethodStoreRef,
    tenants: TenantStoreRef,
    gateway: GatewayRef,
}

impl PaymentMethodRegistry {
    pub fn new(
        methods: PaymentMethodStoreRef,
        tenants: TenantStoreRef,
        gateway: GatewayRef,
    ) -> Self {
        Self {
            methods,
            tenants,
            gateway,
        }
    }

    /// Exchanges `token` for a stored `PaymentMethod`.
    ///
    /// Idempotent on `(tenant, fingerprint)`: registering the same
    /// instrument twice yields the same record both times. A gateway decline
    /// surfaces as `InstrumentRejected` with nothing persisted; that is a
    /// terminal, user-correctable failure and is never retried here.
    pub async fn register(&self, tenant_id: TenantId, token: &str) -> Result<PaymentMethod> {
        let mut tenant = self
            .tenants
            .get(tenant_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("tenant {tenant_id}")))?;

        let profile = self.gateway.inspect_instrument(token).await?;

        if let Some(existing) = self
            .methods
            .find_by_fingerprint(tenant_id, &profile.fingerprint)
            .await?
        {
            debug!(
                tenant = tenant_id,
                method = existing.id,
                "instrument already registered, reusing"
            );
            return Ok(existing);
        }

        let customer_ref = match &tenant.gateway_customer {
            Some(customer) => customer.clone(),
            None => {
                let customer = self.gateway.ensure_customer(&tenant).await?;
                tenant.gateway_customer = Some(customer.clone());
                self.tenants.put(tenant).await?;
                customer
            }
        };

        let external_ref = self.gateway.attach_instrument(&customer_ref, token).await?;

        let method = self
            .methods
            .insert(NewPaymentMethod {
                tenant: tenant_id,
                profile,
                external_ref,
            })
            .await?;
        info!(tenant = tenant_id, method = method.id, "payment method registered");
        Ok(method)
    }
}
