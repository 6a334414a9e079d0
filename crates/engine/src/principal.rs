//! The authenticated caller, as the engine sees it.
//!
//! Authentication itself happens upstream; by the time a request reaches
//! the engine it has been reduced to an owner id, a role (used only to pick
//! chunk-size thresholds) and the id of the per-user root directory (used
//! only by the root-operation guard).

use uuid::Uuid;

/// Account tier. Decides nothing but the chunk-size threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Guest,
    User,
    Admin,
}

/// An authenticated principal acting on its own tree.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    /// The per-user root. Mutating operations on this id are rejected.
    pub root_dir_id: Uuid,
}

impl Principal {
    pub fn new(user_id: Uuid, role: Role, root_dir_id: Uuid) -> Self {
        Self { user_id, role, root_dir_id }
    }
}
