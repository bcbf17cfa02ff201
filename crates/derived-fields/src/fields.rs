//! `raw_field -> product` classification table.
//!
//! Mirrors the teacher's parameter-to-level classification table, adapted
//! from a GRIB2-level-type lookup to a product-tier lookup: most providers
//! split surface fields and pressure-level fields into separate product
//! files, so the fetcher needs to know which product(s) to request for a
//! given set of raw fields.

/// Canonical raw field names the Data Fetcher understands.
pub mod raw_fields {
    pub const TMP2M: &str = "tmp2m";
    pub const TMP_850: &str = "tmp_850";
    pub const UGRD_850: &str = "ugrd_850";
    pub const VGRD_850: &str = "vgrd_850";
    pub const UGRD10M: &str = "ugrd10m";
    pub const VGRD10M: &str = "vgrd10m";
    pub const PRMSL: &str = "prmsl";
    pub const TP: &str = "tp";
    pub const PRATE: &str = "prate";
    pub const CSNOW: &str = "csnow";
    pub const REFC: &str = "refc";
}

/// Upstream product tier a raw field is served from.
pub const SFC_PRODUCT: &str = "sfc";
pub const PRES_PRODUCT: &str = "pres";

/// Classify one raw field into its upstream product tier.
pub fn product_for_field(field: &str) -> &'static str {
    use raw_fields::*;
    match field {
        TMP_850 | UGRD_850 | VGRD_850 => PRES_PRODUCT,
        TMP2M | UGRD10M | VGRD10M | PRMSL | TP | PRATE | CSNOW | REFC => SFC_PRODUCT,
        _ => SFC_PRODUCT,
    }
}

/// Partition `fields` into the distinct products that must be fetched.
pub fn products_for_fields(fields: &std::collections::HashSet<String>) -> Vec<&'static str> {
    let mut products: Vec<&'static str> = fields
        .iter()
        .map(|f| product_for_field(f))
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    products.sort_unstable();
    products
}
