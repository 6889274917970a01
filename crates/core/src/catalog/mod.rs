//! Products and their variant matrix.

pub mod build;
pub mod input;
pub mod key;
pub mod product;
pub mod update;

pub use build::{VariantBuildError, build_product};
pub use input::{OptionInput, ProductInput, SelectionInput, VariantInput};
pub use key::{match_key, variant_key};
pub use product::{
    Product, ProductError, ProductHeader, ProductParts, ProductVariantCombination, Variant,
    VariantOption, VariantOptionValue,
};
pub use update::{VariantUpdateError, apply_product_update};
