//! The product aggregate.
//!
//! A [`Product`] owns its [`VariantOption`]s (each owning its
//! [`VariantOptionValue`]s) and its [`Variant`]s (each owning its
//! [`ProductVariantCombination`]s). Children reference their parent by id
//! only; the owning `Vec` is the single source of truth.

use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::audit::Audit;
use crate::types::{CombinationId, OptionValueId, ProductId, UserId, VariantId, VariantOptionId};
use crate::validation::ValidationErrors;

/// Errors raised when a mutation would break a product invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
    #[error("base stock cannot be negative")]
    NegativeStock,
    #[error("product has active variants, stock is tracked per variant")]
    StockOwnedByVariants,
    #[error("variant {variant} does not cover the product's options")]
    IncompleteCoverage { variant: VariantId },
}

/// One value of an option, e.g. `Black` for `Color`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantOptionValue {
    pub id: OptionValueId,
    pub option_id: VariantOptionId,
    pub value: String,
    pub audit: Audit,
}

impl VariantOptionValue {
    #[must_use]
    pub fn new(option_id: VariantOptionId, value: &str, actor: Option<UserId>) -> Self {
        Self {
            id: OptionValueId::generate(),
            option_id,
            value: value.trim().to_owned(),
            audit: Audit::new(actor),
        }
    }
}

/// A product dimension such as `Color` or `Size`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantOption {
    pub id: VariantOptionId,
    pub product_id: ProductId,
    pub name: String,
    pub values: Vec<VariantOptionValue>,
    pub audit: Audit,
}

impl VariantOption {
    /// Create an option with one value per entry of `values` (trimmed).
    #[must_use]
    pub fn new<S: AsRef<str>>(
        product_id: ProductId,
        name: &str,
        values: &[S],
        actor: Option<UserId>,
    ) -> Self {
        let id = VariantOptionId::generate();
        Self {
            id,
            product_id,
            name: name.trim().to_owned(),
            values: values
                .iter()
                .map(|v| VariantOptionValue::new(id, v.as_ref(), actor))
                .collect(),
            audit: Audit::new(actor),
        }
    }

    pub fn active_values(&self) -> impl Iterator<Item = &VariantOptionValue> {
        self.values.iter().filter(|v| v.audit.is_active)
    }

    /// Deactivate the option and all of its values.
    pub fn deactivate(&mut self, actor: Option<UserId>) -> bool {
        for value in &mut self.values {
            value.audit.deactivate(actor);
        }
        self.audit.deactivate(actor)
    }
}

/// Pins one variant to one option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariantCombination {
    pub id: CombinationId,
    pub variant_id: VariantId,
    pub option_value_id: OptionValueId,
    pub audit: Audit,
}

impl ProductVariantCombination {
    #[must_use]
    pub fn new(variant_id: VariantId, option_value_id: OptionValueId, actor: Option<UserId>) -> Self {
        Self {
            id: CombinationId::generate(),
            variant_id,
            option_value_id,
            audit: Audit::new(actor),
        }
    }
}

/// A purchasable combination of option values with its own price and stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub sku: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub combinations: Vec<ProductVariantCombination>,
    pub audit: Audit,
}

impl Variant {
    #[must_use]
    pub fn new(
        product_id: ProductId,
        sku: Option<&str>,
        price: Decimal,
        stock: i32,
        actor: Option<UserId>,
    ) -> Self {
        Self {
            id: VariantId::generate(),
            product_id,
            sku: normalize_sku(sku),
            price,
            stock,
            combinations: Vec::new(),
            audit: Audit::new(actor),
        }
    }

    /// Option value ids of the active combinations.
    pub fn active_value_ids(&self) -> impl Iterator<Item = OptionValueId> + '_ {
        self.combinations
            .iter()
            .filter(|c| c.audit.is_active)
            .map(|c| c.option_value_id)
    }

    /// Make the active combination set exactly `value_ids`.
    ///
    /// Existing rows are reused (reactivated) so the `(variant, value)` pair
    /// stays unique; rows outside the set are deactivated.
    pub fn replace_combinations(&mut self, value_ids: &[OptionValueId], actor: Option<UserId>) {
        let wanted: BTreeSet<OptionValueId> = value_ids.iter().copied().collect();
        for combination in &mut self.combinations {
            if wanted.contains(&combination.option_value_id) {
                combination.audit.reactivate(actor);
            } else {
                combination.audit.deactivate(actor);
            }
        }
        for value_id in wanted {
            if !self.combinations.iter().any(|c| c.option_value_id == value_id) {
                self.combinations
                    .push(ProductVariantCombination::new(self.id, value_id, actor));
            }
        }
    }

    /// Deactivate the variant and all of its combinations.
    pub fn deactivate_with_combinations(&mut self, actor: Option<UserId>) -> bool {
        for combination in &mut self.combinations {
            combination.audit.deactivate(actor);
        }
        self.audit.deactivate(actor)
    }
}

/// Trim a SKU, mapping blank input to `None`.
#[must_use]
pub fn normalize_sku(sku: Option<&str>) -> Option<String> {
    sku.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Fields of the product row itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductHeader {
    pub name: String,
    pub description: Option<String>,
    pub base_price: Decimal,
    pub sku: Option<String>,
}

impl ProductHeader {
    /// Check the header fields, pushing failures under `request.*` fields.
    pub fn validate(&self, errors: &mut ValidationErrors) {
        if self.name.trim().is_empty() {
            errors.push("request.name", "name is required");
        }
        if self.base_price.is_sign_negative() && !self.base_price.is_zero() {
            errors.push("request.basePrice", "base price cannot be negative");
        }
    }
}

/// Every stored field of a product, used to rehydrate one from storage.
#[derive(Debug, Clone)]
pub struct ProductParts {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub base_price: Decimal,
    pub sku: Option<String>,
    pub base_stock: Option<i32>,
    pub audit: Audit,
    pub options: Vec<VariantOption>,
    pub variants: Vec<Variant>,
}

/// A resolved `(option, value)` pair, keyed case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedValue {
    pub option_id: VariantOptionId,
    pub value_id: OptionValueId,
}

/// Case-insensitive `(option name, value)` lookup over active options.
pub type OptionValueLookup = HashMap<(String, String), ResolvedValue>;

/// Lookup key for option/value names: trimmed and lowercased.
#[must_use]
pub fn lookup_key(option: &str, value: &str) -> (String, String) {
    (option.trim().to_lowercase(), value.trim().to_lowercase())
}

/// The product aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    description: Option<String>,
    base_price: Decimal,
    sku: Option<String>,
    base_stock: Option<i32>,
    audit: Audit,
    options: Vec<VariantOption>,
    variants: Vec<Variant>,
}

impl Product {
    /// Create a product with no options, variants, or stock.
    ///
    /// # Errors
    ///
    /// Returns validation errors for a blank name or negative price.
    pub fn new(header: ProductHeader, actor: Option<UserId>) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        header.validate(&mut errors);
        errors.into_result()?;

        Ok(Self {
            id: ProductId::generate(),
            name: header.name.trim().to_owned(),
            description: header.description,
            base_price: header.base_price,
            sku: normalize_sku(header.sku.as_deref()),
            base_stock: None,
            audit: Audit::new(actor),
            options: Vec::new(),
            variants: Vec::new(),
        })
    }

    /// Rebuild a product from stored rows. No validation is performed.
    #[must_use]
    pub fn restore(parts: ProductParts) -> Self {
        Self {
            id: parts.id,
            name: parts.name,
            description: parts.description,
            base_price: parts.base_price,
            sku: parts.sku,
            base_stock: parts.base_stock,
            audit: parts.audit,
            options: parts.options,
            variants: parts.variants,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ProductId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub const fn base_price(&self) -> Decimal {
        self.base_price
    }

    #[must_use]
    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    #[must_use]
    pub const fn base_stock(&self) -> Option<i32> {
        self.base_stock
    }

    #[must_use]
    pub const fn audit(&self) -> &Audit {
        &self.audit
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.audit.is_active
    }

    /// All options, including deactivated ones.
    #[must_use]
    pub fn options(&self) -> &[VariantOption] {
        &self.options
    }

    /// All variants, including deactivated ones.
    #[must_use]
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn active_options(&self) -> impl Iterator<Item = &VariantOption> {
        self.options.iter().filter(|o| o.audit.is_active)
    }

    pub fn active_variants(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter().filter(|v| v.audit.is_active)
    }

    #[must_use]
    pub fn has_active_variants(&self) -> bool {
        self.variants.iter().any(|v| v.audit.is_active)
    }

    #[must_use]
    pub fn variant(&self, id: VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub(crate) fn options_mut(&mut self) -> &mut Vec<VariantOption> {
        &mut self.options
    }

    pub(crate) fn variants_mut(&mut self) -> &mut Vec<Variant> {
        &mut self.variants
    }

    /// Replace the header fields.
    ///
    /// # Errors
    ///
    /// Returns validation errors for a blank name or negative price.
    pub fn update_details(
        &mut self,
        header: ProductHeader,
        actor: Option<UserId>,
    ) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        header.validate(&mut errors);
        errors.into_result()?;

        self.name = header.name.trim().to_owned();
        self.description = header.description;
        self.base_price = header.base_price;
        self.sku = normalize_sku(header.sku.as_deref());
        self.audit.touch(actor);
        Ok(())
    }

    /// Set product-level stock.
    ///
    /// `None` is always accepted. A value is rejected while any variant is
    /// active, since stock then lives on the variants.
    ///
    /// # Errors
    ///
    /// Returns [`ProductError::NegativeStock`] or
    /// [`ProductError::StockOwnedByVariants`].
    pub fn set_base_stock(
        &mut self,
        stock: Option<i32>,
        actor: Option<UserId>,
    ) -> Result<(), ProductError> {
        if let Some(value) = stock {
            if value < 0 {
                return Err(ProductError::NegativeStock);
            }
            if self.has_active_variants() {
                return Err(ProductError::StockOwnedByVariants);
            }
        }
        self.base_stock = stock;
        self.audit.touch(actor);
        Ok(())
    }

    /// Apply the stock rule after variants changed: variant-driven products
    /// carry no base stock, others take `requested`.
    ///
    /// # Errors
    ///
    /// Returns [`ProductError::NegativeStock`] for a negative request.
    pub fn settle_base_stock(
        &mut self,
        requested: Option<i32>,
        actor: Option<UserId>,
    ) -> Result<(), ProductError> {
        let stock = if self.has_active_variants() { None } else { requested };
        self.set_base_stock(stock, actor)
    }

    pub fn add_options(&mut self, options: Vec<VariantOption>, actor: Option<UserId>) {
        self.options.extend(options);
        self.audit.touch(actor);
    }

    pub fn add_variants(&mut self, variants: Vec<Variant>, actor: Option<UserId>) {
        self.variants.extend(variants);
        self.audit.touch(actor);
    }

    /// Soft-delete the product and everything it owns.
    ///
    /// Returns `false` if the product was already inactive.
    pub fn deactivate(&mut self, actor: Option<UserId>) -> bool {
        if !self.audit.is_active {
            return false;
        }
        for option in &mut self.options {
            option.deactivate(actor);
        }
        for variant in &mut self.variants {
            variant.deactivate_with_combinations(actor);
        }
        self.audit.deactivate(actor)
    }

    /// Case-insensitive `(option, value)` lookup over active options/values.
    #[must_use]
    pub fn option_value_lookup(&self) -> OptionValueLookup {
        self.active_options()
            .flat_map(|option| {
                option.active_values().map(move |value| {
                    (
                        lookup_key(&option.name, &value.value),
                        ResolvedValue {
                            option_id: option.id,
                            value_id: value.id,
                        },
                    )
                })
            })
            .collect()
    }

    /// The `(option name, value)` pairs a variant currently represents.
    ///
    /// Only active combinations pointing at active options are included,
    /// ordered by option name (case-insensitive).
    #[must_use]
    pub fn selections_of(&self, variant: &Variant) -> Vec<(String, String)> {
        let mut values: HashMap<OptionValueId, (&str, &str)> = HashMap::new();
        for option in self.active_options() {
            for value in &option.values {
                values.insert(value.id, (option.name.as_str(), value.value.as_str()));
            }
        }

        let mut selections: Vec<(String, String)> = variant
            .active_value_ids()
            .filter_map(|id| values.get(&id))
            .map(|(option, value)| ((*option).to_owned(), (*value).to_owned()))
            .collect();
        selections.sort_by_key(|(option, _)| option.to_lowercase());
        selections
    }

    /// Verify the aggregate invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), ProductError> {
        if self.has_active_variants() && self.base_stock.is_some() {
            return Err(ProductError::StockOwnedByVariants);
        }
        if self.base_stock.is_some_and(|s| s < 0) {
            return Err(ProductError::NegativeStock);
        }

        let mut option_of_value: HashMap<OptionValueId, VariantOptionId> = HashMap::new();
        for option in self.active_options() {
            for value in option.active_values() {
                option_of_value.insert(value.id, option.id);
            }
        }
        let expected: BTreeSet<VariantOptionId> = self.active_options().map(|o| o.id).collect();

        for variant in self.active_variants() {
            let mut covered = BTreeSet::new();
            for value_id in variant.active_value_ids() {
                let Some(option_id) = option_of_value.get(&value_id) else {
                    return Err(ProductError::IncompleteCoverage {
                        variant: variant.id,
                    });
                };
                if !covered.insert(*option_id) {
                    return Err(ProductError::IncompleteCoverage {
                        variant: variant.id,
                    });
                }
            }
            if covered != expected {
                return Err(ProductError::IncompleteCoverage {
                    variant: variant.id,
                });
            }
        }
        Ok(())
    }
}
