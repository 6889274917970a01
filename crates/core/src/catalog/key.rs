//! Variant identity keys.
//!
//! During an update, requested variants are matched to stored ones by key:
//! the trimmed SKU when there is one, otherwise the rendered selections.

/// Render the identity key of a variant.
///
/// A non-blank SKU wins. Otherwise the `(option, value)` pairs are trimmed,
/// sorted by option name ignoring case, and joined as
/// `Option:Value|Option:Value`.
///
/// ```
/// use stockroom_core::catalog::variant_key;
///
/// assert_eq!(variant_key(Some(" TEE-BLK "), &[("Color", "Black")]), "TEE-BLK");
/// assert_eq!(
///     variant_key(None, &[("size", "S"), ("Color", "Black")]),
///     "Color:Black|size:S"
/// );
/// ```
#[must_use]
pub fn variant_key<O: AsRef<str>, V: AsRef<str>>(sku: Option<&str>, selections: &[(O, V)]) -> String {
    if let Some(sku) = sku.map(str::trim).filter(|s| !s.is_empty()) {
        return sku.to_owned();
    }

    let mut pairs: Vec<(&str, &str)> = selections
        .iter()
        .map(|(o, v)| (o.as_ref().trim(), v.as_ref().trim()))
        .collect();
    pairs.sort_by_cached_key(|(option, _)| option.to_lowercase());
    pairs
        .iter()
        .map(|(option, value)| format!("{option}:{value}"))
        .collect::<Vec<_>>()
        .join("|")
}

/// Key used for matching: [`variant_key`] folded to lowercase, since option
/// names and values compare case-insensitively.
#[must_use]
pub fn match_key<O: AsRef<str>, V: AsRef<str>>(sku: Option<&str>, selections: &[(O, V)]) -> String {
    variant_key(sku, selections).to_lowercase()
}
