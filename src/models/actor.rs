// src/models/actor.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Vendor,
    Tailor,
}

/// Who is asking. Vendor and tailor actors carry the id they are scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub tenant_id: Option<Uuid>,
    pub user_id: Uuid,
    pub role: Role,
    pub vendor_id: Option<Uuid>,
    pub tailor_id: Option<Uuid>,
}

impl ActorContext {
    pub fn admin(tenant_id: Uuid) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            user_id: Uuid::new_v4(),
            role: Role::Admin,
            vendor_id: None,
            tailor_id: None,
        }
    }

    pub fn vendor(tenant_id: Uuid, vendor_id: Uuid) -> Self {
        Self {
            role: Role::Vendor,
            vendor_id: Some(vendor_id),
            ..Self::admin(tenant_id)
        }
    }

    pub fn tailor(tenant_id: Uuid, tailor_id: Uuid) -> Self {
        Self {
            role: Role::Tailor,
            tailor_id: Some(tailor_id),
            ..Self::admin(tenant_id)
        }
    }
}

// Claims carried by the portal's JWT.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActorClaims {
    pub sub: Uuid,
    pub tenant_id: Option<Uuid>,
    pub role: Role,
    pub vendor_id: Option<Uuid>,
    pub tailor_id: Option<Uuid>,
    pub exp: usize,
    pub iat: usize,
}

impl From<ActorClaims> for ActorContext {
    fn from(claims: ActorClaims) -> Self {
        Self {
            tenant_id: claims.tenant_id,
            user_id: claims.sub,
            role: claims.role,
            vendor_id: claims.vendor_id,
            tailor_id: claims.tailor_id,
        }
    }
}
