use crate::domain::TenantId;
use serde::{Deserialize, Serialize};

/// A renting customer. Owned by the surrounding CRUD layer; the core only
/// needs the gateway-side customer handle for charges.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Tenant {
    pub id: TenantId,
    pub email: String,
    /// Customer record on the payment gateway, created lazily on the first
    /// instrument registration.
    pub gateway_customer: Option<String>,
}

impl Tenant {
    pub fn new(id: TenantId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            gateway_customer: None,
        }
    }
}
