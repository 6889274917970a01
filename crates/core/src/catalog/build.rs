//! Building a new product from a request.

use super::input::ProductInput;
use super::product::{Product, ProductError, Variant, VariantOption, lookup_key};
use crate::types::UserId;
use crate::validation::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum VariantBuildError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("built product violates an invariant: {0}")]
    Invariant(#[from] ProductError),
}

/// Build a product, its option matrix, and its variants.
///
/// Nothing is produced unless the whole request is valid. When at least one
/// variant is supplied the product carries no base stock.
///
/// # Errors
///
/// Returns [`VariantBuildError::Validation`] with every problem found.
pub fn build_product(input: &ProductInput, actor: Option<UserId>) -> Result<Product, VariantBuildError> {
    input.validate()?;

    let mut product = Product::new(input.header(), actor)?;
    let product_id = product.id();

    let options = input
        .options
        .iter()
        .map(|o| VariantOption::new(product_id, &o.name, &o.values, actor))
        .collect();
    product.add_options(options, actor);

    let lookup = product.option_value_lookup();
    let mut variants = Vec::with_capacity(input.variants.len());
    let mut errors = ValidationErrors::new();
    for (i, requested) in input.variants.iter().enumerate() {
        let mut value_ids = Vec::with_capacity(requested.selections.len());
        for selection in &requested.selections {
            match lookup.get(&lookup_key(&selection.option, &selection.value)) {
                Some(resolved) => value_ids.push(resolved.value_id),
                None => errors.push(
                    format!("variants[{i}].selections"),
                    format!(
                        "option '{}' with value '{}' does not exist",
                        selection.option.trim(),
                        selection.value.trim()
                    ),
                ),
            }
        }
        let mut variant = Variant::new(
            product_id,
            requested.sku.as_deref(),
            requested.price,
            requested.stock,
            actor,
        );
        variant.replace_combinations(&value_ids, actor);
        variants.push(variant);
    }
    errors.into_result()?;

    product.add_variants(variants, actor);
    product.settle_base_stock(input.base_stock, actor)?;
    product.check_invariants()?;
    Ok(product)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::catalog::input::{OptionInput, SelectionInput, VariantInput};

    fn selection(option: &str, value: &str) -> SelectionInput {
        SelectionInput {
            option: option.to_owned(),
            value: value.to_owned(),
        }
    }

    fn tee() -> ProductInput {
        ProductInput {
            name: "Tee".to_owned(),
            description: Some("Cotton".to_owned()),
            base_price: Decimal::new(20, 0),
            sku: Some("TEE".to_owned()),
            base_stock: Some(10),
            options: vec![
                OptionInput {
                    name: "Color".to_owned(),
                    values: vec!["Black".to_owned(), "White".to_owned()],
                },
                OptionInput {
                    name: "Size".to_owned(),
                    values: vec!["S".to_owned(), "M".to_owned()],
                },
            ],
            variants: vec![
                VariantInput {
                    sku: Some("TEE-BLK-S".to_owned()),
                    price: Decimal::new(20, 0),
                    stock: 4,
                    selections: vec![selection("color", "black"), selection("SIZE", "s")],
                },
                VariantInput {
                    sku: None,
                    price: Decimal::new(22, 0),
                    stock: 0,
                    selections: vec![selection("Color", "White"), selection("Size", "M")],
                },
            ],
        }
    }

    #[test]
    fn test_builds_matrix_and_nulls_base_stock() {
        let product = build_product(&tee(), None).unwrap();
        assert_eq!(product.options().len(), 2);
        assert_eq!(product.variants().len(), 2);
        assert_eq!(product.base_stock(), None);

        let first = &product.variants()[0];
        assert_eq!(first.combinations.len(), 2);
        assert_eq!(
            product.selections_of(first),
            vec![
                ("Color".to_owned(), "Black".to_owned()),
                ("Size".to_owned(), "S".to_owned())
            ]
        );
        assert!(product.check_invariants().is_ok());
    }

    #[test]
    fn test_without_variants_keeps_requested_stock() {
        let mut request = tee();
        request.options.clear();
        request.variants.clear();
        let product = build_product(&request, None).unwrap();
        assert_eq!(product.base_stock(), Some(10));

        request.base_stock = None;
        let product = build_product(&request, None).unwrap();
        assert_eq!(product.base_stock(), None);
    }

    #[test]
    fn test_every_missing_selection_reported_together() {
        let mut request = tee();
        request.variants[0].selections[0].value = "Red".to_owned();
        request.variants[1].selections[1].value = "XL".to_owned();

        let Err(VariantBuildError::Validation(errors)) = build_product(&request, None) else {
            panic!("expected validation failure");
        };
        let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["variants[0].selections", "variants[1].selections"]);
    }

    #[test]
    fn test_trims_names_without_deduplicating() {
        let mut request = tee();
        request.options[0].values = vec![" Black ".to_owned(), "White".to_owned()];
        let product = build_product(&request, None).unwrap();
        let values: Vec<&str> = product.options()[0]
            .values
            .iter()
            .map(|v| v.value.as_str())
            .collect();
        assert_eq!(values, vec!["Black", "White"]);
    }
}
