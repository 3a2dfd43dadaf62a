//! CRS handling for the coastline layer. The projection math itself is
//! delegated to proj4rs.

pub mod crs;

pub use crs::CrsTransform;

/// Canonical spelling of a CRS identifier: trimmed, with an upper-case
/// authority prefix ("epsg:4326" -> "EPSG:4326"). PROJ strings pass through.
pub fn normalize_crs(crs: &str) -> String {
    let crs = crs.trim();
    match crs.split_once(':') {
        Some((authority, code)) if !crs.starts_with('+') => {
            format!("{}:{}", authority.to_ascii_uppercase(), code.trim())
        }
        _ => crs.to_string(),
    }
}

/// Whether two CRS identifiers name the same CRS, compared textually after
/// normalization.
pub fn same_crs(a: &str, b: &str) -> bool {
    normalize_crs(a) == normalize_crs(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_epsg() {
        assert_eq!(normalize_crs(" epsg:4326 "), "EPSG:4326");
        assert_eq!(normalize_crs("EPSG: 32633"), "EPSG:32633");
    }

    #[test]
    fn test_proj_string_untouched() {
        let s = "+proj=utm +zone=33 +datum=WGS84";
        assert_eq!(normalize_crs(s), s);
    }

    #[test]
    fn test_same_crs() {
        assert!(same_crs("epsg:32610", "EPSG:32610"));
        assert!(!same_crs("EPSG:32610", "EPSG:4326"));
    }
}
