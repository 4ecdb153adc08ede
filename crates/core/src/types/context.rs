//! Per-request tenant context.

use serde::{Deserialize, Serialize};

use super::id::{ActorId, TenantId};

/// The identity under which an engine operation runs.
///
/// Resolved upstream by the authentication/role middleware and passed into
/// every engine call. All reads and writes are scoped to `tenant_id`; no
/// operation may see or mutate another tenant's rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantContext {
    /// Tenant isolation boundary.
    pub tenant_id: TenantId,
    /// The authenticated user performing the operation.
    pub actor_id: ActorId,
}

impl TenantContext {
    /// Create a new tenant context.
    #[must_use]
    pub const fn new(tenant_id: TenantId, actor_id: ActorId) -> Self {
        Self {
            tenant_id,
            actor_id,
        }
    }
}
