//! Bundles: fixed-price groups of products and variants.

pub mod bundle;
pub mod reconcile;
pub mod request;
pub mod summary;

pub use bundle::{Bundle, BundleHeader, BundleItem, BundleParts, ItemSpec};
pub use reconcile::ReconcileSummary;
pub use request::{
    BundleProductInput, BundleRequest, BundleRequestError, BundleVariantInput, CatalogSnapshot,
    PRODUCTS_FIELD,
};
pub use summary::{BundleProductLine, BundleSummary, BundleVariantLine};
