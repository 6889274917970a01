//! Item diff applied on bundle update.

use std::collections::{HashMap, HashSet};

use super::bundle::{Bundle, BundleItem, ItemSpec};
use crate::types::{ProductId, UserId, VariantId};

/// Counts of what a reconcile pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub created: usize,
    pub reactivated: usize,
    pub requantified: usize,
    pub deactivated: usize,
}

impl Bundle {
    /// Make the active item set match `specs`, keyed by `(product, variant)`.
    ///
    /// Existing rows are reused where the key matches (an active row wins
    /// over an inactive one with the same key). Keys no longer requested are
    /// soft-deleted.
    pub fn reconcile_items(&mut self, specs: &[ItemSpec], actor: Option<UserId>) -> ReconcileSummary {
        let bundle_id = self.id();
        let items = self.items_mut();

        let mut index: HashMap<(ProductId, Option<VariantId>), usize> = HashMap::new();
        for (i, item) in items.iter().enumerate() {
            let replace = index
                .get(&item.key())
                .and_then(|&j| items.get(j))
                .is_none_or(|current| !current.audit.is_active && item.audit.is_active);
            if replace {
                index.insert(item.key(), i);
            }
        }

        let mut summary = ReconcileSummary::default();
        let mut requested = HashSet::new();
        for spec in specs {
            requested.insert(spec.key());
            match index.get(&spec.key()).and_then(|&i| items.get_mut(i)) {
                Some(item) => {
                    if item.audit.reactivate(actor) {
                        summary.reactivated += 1;
                    }
                    if item.quantity != spec.quantity {
                        item.quantity = spec.quantity;
                        item.audit.touch(actor);
                        summary.requantified += 1;
                    }
                }
                None => {
                    items.push(BundleItem::new(bundle_id, *spec, actor));
                    summary.created += 1;
                }
            }
        }

        for item in items.iter_mut() {
            if !requested.contains(&item.key()) && item.audit.deactivate(actor) {
                summary.deactivated += 1;
            }
        }
        summary
    }
}
