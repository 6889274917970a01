//! Lifecycle and attribution fields shared by every entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Creation/update timestamps, the soft-delete flag, and the acting user.
///
/// Entities never delete rows: `deactivate` flips `is_active` and the row is
/// kept for history. Every mutator bumps `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_by: Option<UserId>,
    pub updated_by: Option<UserId>,
}

impl Audit {
    /// Audit fields for a freshly created, active entity.
    #[must_use]
    pub fn new(actor: Option<UserId>) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            is_active: true,
            created_by: actor,
            updated_by: actor,
        }
    }

    /// Record a mutation.
    pub fn touch(&mut self, actor: Option<UserId>) {
        self.updated_at = Utc::now();
        if actor.is_some() {
            self.updated_by = actor;
        }
    }

    /// Soft-delete. Returns `false` when already inactive (no change made).
    pub fn deactivate(&mut self, actor: Option<UserId>) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.touch(actor);
        true
    }

    /// Undo a soft-delete. Returns `false` when already active.
    pub fn reactivate(&mut self, actor: Option<UserId>) -> bool {
        if self.is_active {
            return false;
        }
        self.is_active = true;
        self.touch(actor);
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deactivate_is_idempotent() {
        let actor = Some(UserId::generate());
        let mut audit = Audit::new(None);
        assert!(audit.deactivate(actor));
        assert!(!audit.is_active);
        assert_eq!(audit.updated_by, actor);

        let stamp = audit.updated_at;
        assert!(!audit.deactivate(None));
        assert_eq!(audit.updated_at, stamp);
    }

    #[test]
    fn test_reactivate_restores_flag() {
        let mut audit = Audit::new(None);
        assert!(!audit.reactivate(None));
        audit.deactivate(None);
        assert!(audit.reactivate(None));
        assert!(audit.is_active);
    }
}
