//! In-place update of an existing product.
//!
//! Rows are never replaced wholesale. Options, values, variants, and
//! combinations are matched against the request and reactivated, edited,
//! created, or soft-deleted so ids stay stable across edits.

use std::collections::{HashMap, HashSet};

use super::input::{OptionInput, ProductInput, VariantInput};
use super::key::match_key;
use super::product::{Product, ProductError, Variant, VariantOption, VariantOptionValue, lookup_key};
use crate::types::UserId;
use crate::validation::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum VariantUpdateError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    /// A requested selection no longer resolves after the option pass. The
    /// whole update must be abandoned.
    #[error("variant {index} selects '{option}: {value}', which is not an active option value")]
    UnresolvedSelection {
        index: usize,
        option: String,
        value: String,
    },
    #[error("updated product violates an invariant: {0}")]
    Invariant(#[from] ProductError),
}

impl VariantUpdateError {
    /// Whether this is an internal failure rather than bad client input.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }
}

/// Apply `input` to `product`.
///
/// # Errors
///
/// Returns [`VariantUpdateError::Validation`] for bad input, or a fatal
/// variant when the option pass left the aggregate unable to satisfy the
/// request.
pub fn apply_product_update(
    product: &mut Product,
    input: &ProductInput,
    actor: Option<UserId>,
) -> Result<(), VariantUpdateError> {
    input.validate()?;
    product.update_details(input.header(), actor)?;
    sync_options(product, &input.options, actor);
    sync_variants(product, &input.variants, actor)?;
    product.settle_base_stock(input.base_stock, actor)?;
    product.check_invariants()?;
    Ok(())
}

/// Index by lowercased key, preferring the active entry on collisions.
fn index_preferring_active<I>(entries: I) -> HashMap<String, usize>
where
    I: Iterator<Item = (String, bool)>,
{
    let mut index: HashMap<String, (usize, bool)> = HashMap::new();
    for (i, (key, active)) in entries.enumerate() {
        match index.get(&key) {
            Some((_, true)) => {}
            Some((_, false)) if !active => {}
            _ => {
                index.insert(key, (i, active));
            }
        }
    }
    index.into_iter().map(|(k, (i, _))| (k, i)).collect()
}

fn sync_options(product: &mut Product, requested: &[OptionInput], actor: Option<UserId>) {
    let product_id = product.id();
    let options = product.options_mut();
    let existing = index_preferring_active(
        options
            .iter()
            .map(|o| (o.name.trim().to_lowercase(), o.audit.is_active)),
    );

    let mut matched = HashSet::new();
    for request in requested {
        let key = request.name.trim().to_lowercase();
        if let Some(&i) = existing.get(&key)
            && let Some(option) = options.get_mut(i)
        {
            matched.insert(i);
            option.audit.reactivate(actor);
            option.name = request.name.trim().to_owned();
            option.audit.touch(actor);
            sync_values(option, &request.values, actor);
        } else {
            options.push(VariantOption::new(product_id, &request.name, &request.values, actor));
            matched.insert(options.len() - 1);
        }
    }

    for (i, option) in options.iter_mut().enumerate() {
        if !matched.contains(&i) {
            option.deactivate(actor);
        }
    }
}

fn sync_values(option: &mut VariantOption, requested: &[String], actor: Option<UserId>) {
    let existing = index_preferring_active(
        option
            .values
            .iter()
            .map(|v| (v.value.trim().to_lowercase(), v.audit.is_active)),
    );

    let mut matched = HashSet::new();
    for value in requested {
        let key = value.trim().to_lowercase();
        if let Some(&i) = existing.get(&key)
            && let Some(stored) = option.values.get_mut(i)
        {
            matched.insert(i);
            stored.audit.reactivate(actor);
            if stored.value != value.trim() {
                stored.value = value.trim().to_owned();
                stored.audit.touch(actor);
            }
        } else {
            option
                .values
                .push(VariantOptionValue::new(option.id, value, actor));
            matched.insert(option.values.len() - 1);
        }
    }

    for (i, value) in option.values.iter_mut().enumerate() {
        if !matched.contains(&i) {
            value.audit.deactivate(actor);
        }
    }
}

fn sync_variants(
    product: &mut Product,
    requested: &[VariantInput],
    actor: Option<UserId>,
) -> Result<(), VariantUpdateError> {
    let product_id = product.id();
    let lookup = product.option_value_lookup();
    let existing = index_preferring_active(product.variants().iter().map(|v| {
        let selections = product.selections_of(v);
        (match_key(v.sku.as_deref(), &selections), v.audit.is_active)
    }));

    let mut resolved = Vec::with_capacity(requested.len());
    for (index, request) in requested.iter().enumerate() {
        let mut value_ids = Vec::with_capacity(request.selections.len());
        for selection in &request.selections {
            let Some(hit) = lookup.get(&lookup_key(&selection.option, &selection.value)) else {
                return Err(VariantUpdateError::UnresolvedSelection {
                    index,
                    option: selection.option.trim().to_owned(),
                    value: selection.value.trim().to_owned(),
                });
            };
            value_ids.push(hit.value_id);
        }
        resolved.push(value_ids);
    }

    let variants = product.variants_mut();
    let mut matched = HashSet::new();
    for (request, value_ids) in requested.iter().zip(resolved) {
        let key = match_key(request.sku.as_deref(), &request.pairs());
        if let Some(&i) = existing.get(&key)
            && let Some(variant) = variants.get_mut(i)
        {
            matched.insert(i);
            variant.audit.reactivate(actor);
            variant.sku = super::product::normalize_sku(request.sku.as_deref());
            variant.price = request.price;
            variant.stock = request.stock;
            variant.audit.touch(actor);
            variant.replace_combinations(&value_ids, actor);
        } else {
            let mut variant = Variant::new(
                product_id,
                request.sku.as_deref(),
                request.price,
                request.stock,
                actor,
            );
            variant.replace_combinations(&value_ids, actor);
            variants.push(variant);
            matched.insert(variants.len() - 1);
        }
    }

    for (i, variant) in variants.iter_mut().enumerate() {
        if !matched.contains(&i) {
            variant.deactivate_with_combinations(actor);
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::catalog::build::build_product;
    use crate::catalog::input::SelectionInput;

    fn selection(option: &str, value: &str) -> SelectionInput {
        SelectionInput {
            option: option.to_owned(),
            value: value.to_owned(),
        }
    }

    fn variant(sku: Option<&str>, stock: i32, picks: &[(&str, &str)]) -> VariantInput {
        VariantInput {
            sku: sku.map(str::to_owned),
            price: Decimal::new(25, 0),
            stock,
            selections: picks.iter().map(|(o, v)| selection(o, v)).collect(),
        }
    }

    fn hoodie() -> ProductInput {
        ProductInput {
            name: "Hoodie".to_owned(),
            description: None,
            base_price: Decimal::new(25, 0),
            sku: None,
            base_stock: None,
            options: vec![OptionInput {
                name: "Color".to_owned(),
                values: vec!["Black".to_owned(), "Grey".to_owned()],
            }],
            variants: vec![
                variant(None, 3, &[("Color", "Black")]),
                variant(Some("HOOD-GRY"), 2, &[("Color", "Grey")]),
            ],
        }
    }

    #[test]
    fn test_matched_variants_keep_their_ids() {
        let mut product = build_product(&hoodie(), None).unwrap();
        let ids: Vec<_> = product.variants().iter().map(|v| v.id).collect();

        let mut request = hoodie();
        request.variants[0].stock = 9;
        request.variants[1].selections[0].value = "black".to_owned();
        request.variants[0].selections[0].value = "Grey".to_owned();
        // sku-keyed variant moves to Black; the selection-keyed one is now Grey
        // and therefore a different variant.
        request.variants.swap(0, 1);
        apply_product_update(&mut product, &request, None).unwrap();

        let by_sku = product
            .active_variants()
            .find(|v| v.sku.as_deref() == Some("HOOD-GRY"))
            .unwrap();
        assert_eq!(by_sku.id, ids[1]);
        assert_eq!(
            product.selections_of(by_sku),
            vec![("Color".to_owned(), "Black".to_owned())]
        );

        let old_black = product.variant(ids[0]).unwrap();
        assert!(!old_black.audit.is_active);
        assert_eq!(product.active_variants().count(), 2);
        assert!(product.check_invariants().is_ok());
    }

    #[test]
    fn test_removed_values_and_options_are_soft_deleted() {
        let mut product = build_product(&hoodie(), None).unwrap();
        let color_id = product.options()[0].id;

        let mut request = hoodie();
        request.options = vec![OptionInput {
            name: "Size".to_owned(),
            values: vec!["M".to_owned()],
        }];
        request.variants = vec![variant(Some("HOOD-M"), 1, &[("Size", "M")])];
        apply_product_update(&mut product, &request, None).unwrap();

        let color = product.options().iter().find(|o| o.id == color_id).unwrap();
        assert!(!color.audit.is_active);
        assert!(color.values.iter().all(|v| !v.audit.is_active));
        assert_eq!(product.active_options().count(), 1);
        assert_eq!(product.active_variants().count(), 1);
        assert!(product.check_invariants().is_ok());
    }

    #[test]
    fn test_option_matching_reactivates_and_renames() {
        let mut product = build_product(&hoodie(), None).unwrap();
        let color_id = product.options()[0].id;
        let grey_id = product.options()[0].values[1].id;

        let mut request = hoodie();
        request.options[0].values.pop();
        request.variants.pop();
        apply_product_update(&mut product, &request, None).unwrap();
        assert!(!product.options()[0].values[1].audit.is_active);

        let mut request = hoodie();
        request.options[0].name = "COLOR".to_owned();
        request.options[0].values[1] = "GREY".to_owned();
        for v in &mut request.variants {
            v.selections[0].option = "COLOR".to_owned();
        }
        apply_product_update(&mut product, &request, None).unwrap();

        let option = &product.options()[0];
        assert_eq!(option.id, color_id);
        assert_eq!(option.name, "COLOR");
        let grey = option.values.iter().find(|v| v.id == grey_id).unwrap();
        assert!(grey.audit.is_active);
        assert_eq!(grey.value, "GREY");
        assert_eq!(option.values.len(), 2);
    }

    #[test]
    fn test_dropping_all_variants_restores_base_stock() {
        let mut product = build_product(&hoodie(), None).unwrap();
        assert_eq!(product.base_stock(), None);

        let mut request = hoodie();
        request.options.clear();
        request.variants.clear();
        request.base_stock = Some(7);
        apply_product_update(&mut product, &request, None).unwrap();

        assert_eq!(product.base_stock(), Some(7));
        assert!(!product.has_active_variants());
    }

    #[test]
    fn test_base_stock_ignored_while_variants_remain() {
        let mut product = build_product(&hoodie(), None).unwrap();
        let mut request = hoodie();
        request.base_stock = Some(50);
        apply_product_update(&mut product, &request, None).unwrap();
        assert_eq!(product.base_stock(), None);
    }

    #[test]
    fn test_unresolvable_selection_is_fatal() {
        let mut product = build_product(&hoodie(), None).unwrap();
        let err = sync_variants(&mut product, &[variant(None, 1, &[("Color", "Pink")])], None)
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            VariantUpdateError::UnresolvedSelection { index: 0, ref value, .. } if value == "Pink"
        ));
    }

    #[test]
    fn test_invalid_request_is_not_fatal() {
        let mut product = build_product(&hoodie(), None).unwrap();
        let mut request = hoodie();
        request.variants[0].selections[0].value = "Pink".to_owned();
        let err = apply_product_update(&mut product, &request, None).unwrap_err();
        assert!(!err.is_fatal());
    }
}
