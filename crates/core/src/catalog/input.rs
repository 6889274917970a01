//! Request shapes accepted by the build and update engines.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::key::match_key;
use super::product::{ProductHeader, lookup_key};
use crate::validation::ValidationErrors;

/// One `{option, value}` pick of a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionInput {
    pub option: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionInput {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantInput {
    #[serde(default)]
    pub sku: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    #[serde(default)]
    pub selections: Vec<SelectionInput>,
}

impl VariantInput {
    /// Selections as `(option, value)` pairs.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.selections
            .iter()
            .map(|s| (s.option.as_str(), s.value.as_str()))
            .collect()
    }
}

/// Full description of a product, used for both create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub base_price: Decimal,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub base_stock: Option<i32>,
    #[serde(default)]
    pub options: Vec<OptionInput>,
    #[serde(default)]
    pub variants: Vec<VariantInput>,
}

impl ProductInput {
    #[must_use]
    pub fn header(&self) -> ProductHeader {
        ProductHeader {
            name: self.name.clone(),
            description: self.description.clone(),
            base_price: self.base_price,
            sku: self.sku.clone(),
        }
    }

    /// Check the whole request, collecting every problem.
    ///
    /// Selections are resolved against the requested options, so a request
    /// that passes here resolves cleanly once its options are applied.
    ///
    /// # Errors
    ///
    /// Returns all field errors found.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        self.header().validate(&mut errors);
        if self.base_stock.is_some_and(|s| s < 0) {
            errors.push("request.baseStock", "base stock cannot be negative");
        }
        self.validate_options(&mut errors);
        self.validate_variants(&mut errors);
        errors.into_result()
    }

    fn validate_options(&self, errors: &mut ValidationErrors) {
        let mut names = HashSet::new();
        for (i, option) in self.options.iter().enumerate() {
            let name = option.name.trim();
            if name.is_empty() {
                errors.push(format!("options[{i}].name"), "option name is required");
            } else if !names.insert(name.to_lowercase()) {
                errors.push(
                    format!("options[{i}].name"),
                    format!("option '{name}' is listed more than once"),
                );
            }

            if option.values.is_empty() {
                errors.push(
                    format!("options[{i}].values"),
                    format!("option '{name}' needs at least one value"),
                );
            }
            let mut values = HashSet::new();
            for value in &option.values {
                let value = value.trim();
                if value.is_empty() {
                    errors.push(format!("options[{i}].values"), "option values cannot be blank");
                } else if !values.insert(value.to_lowercase()) {
                    errors.push(
                        format!("options[{i}].values"),
                        format!("value '{value}' is listed more than once for option '{name}'"),
                    );
                }
            }
        }
    }

    fn validate_variants(&self, errors: &mut ValidationErrors) {
        let known: HashSet<(String, String)> = self
            .options
            .iter()
            .flat_map(|o| o.values.iter().map(|v| lookup_key(&o.name, v)))
            .collect();
        let option_names: HashMap<String, &str> = self
            .options
            .iter()
            .map(|o| (o.name.trim().to_lowercase(), o.name.trim()))
            .collect();

        let mut keys = HashSet::new();
        for (i, variant) in self.variants.iter().enumerate() {
            if variant.price.is_sign_negative() && !variant.price.is_zero() {
                errors.push(format!("variants[{i}].price"), "price cannot be negative");
            }
            if variant.stock < 0 {
                errors.push(format!("variants[{i}].stock"), "stock cannot be negative");
            }

            let mut picked = HashSet::new();
            for selection in &variant.selections {
                let key = lookup_key(&selection.option, &selection.value);
                if !known.contains(&key) {
                    errors.push(
                        format!("variants[{i}].selections"),
                        format!(
                            "option '{}' with value '{}' does not exist",
                            selection.option.trim(),
                            selection.value.trim()
                        ),
                    );
                }
                if !picked.insert(key.0) {
                    errors.push(
                        format!("variants[{i}].selections"),
                        format!("option '{}' is selected more than once", selection.option.trim()),
                    );
                }
            }
            for (lower, name) in &option_names {
                if !picked.contains(lower) {
                    errors.push(
                        format!("variants[{i}].selections"),
                        format!("no value selected for option '{name}'"),
                    );
                }
            }

            if !keys.insert(match_key(variant.sku.as_deref(), &variant.pairs())) {
                errors.push(format!("variants[{i}]"), "duplicate variant");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> ProductInput {
        ProductInput {
            name: "Tee".to_owned(),
            description: None,
            base_price: Decimal::new(20, 0),
            sku: None,
            base_stock: None,
            options: vec![OptionInput {
                name: "Color".to_owned(),
                values: vec!["Black".to_owned(), "White".to_owned()],
            }],
            variants: vec![VariantInput {
                sku: None,
                price: Decimal::new(20, 0),
                stock: 5,
                selections: vec![SelectionInput {
                    option: "color".to_owned(),
                    value: "BLACK".to_owned(),
                }],
            }],
        }
    }

    #[test]
    fn test_valid_input_passes() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn test_unknown_selections_are_batched_per_variant() {
        let mut request = input();
        request.variants[0].selections[0].value = "Red".to_owned();
        let mut second = request.variants[0].clone();
        second.selections[0].option = "Material".to_owned();
        request.variants.push(second);

        let errors = request.validate().unwrap_err();
        let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"variants[0].selections"));
        assert!(fields.contains(&"variants[1].selections"));
        assert!(errors.errors().iter().any(|e| e.error.contains("'Red'")));
    }

    #[test]
    fn test_duplicate_option_names_and_values() {
        let mut request = input();
        request.options.push(OptionInput {
            name: " COLOR ".to_owned(),
            values: vec!["Blue".to_owned(), "blue".to_owned()],
        });
        let errors = request.validate().unwrap_err();
        assert!(errors.errors().iter().any(|e| e.field == "options[1].name"));
        assert!(errors.errors().iter().any(|e| e.field == "options[1].values"));
    }

    #[test]
    fn test_variant_must_cover_every_option() {
        let mut request = input();
        request.options.push(OptionInput {
            name: "Size".to_owned(),
            values: vec!["S".to_owned()],
        });
        let errors = request.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.errors()[0].error, "no value selected for option 'Size'");
    }

    #[test]
    fn test_duplicate_variants_rejected() {
        let mut request = input();
        request.variants.push(request.variants[0].clone());
        let errors = request.validate().unwrap_err();
        assert_eq!(errors.errors()[0].field, "variants[1]");
    }

    #[test]
    fn test_deserializes_camel_case() {
        let json = r#"{"name":"Mug","basePrice":"9.50","baseStock":3}"#;
        let request: ProductInput = serde_json::from_str(json).unwrap();
        assert_eq!(request.base_stock, Some(3));
        assert!(request.options.is_empty());
    }
}
