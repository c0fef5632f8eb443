//! Geometry type classification.
//!
//! The target store's geo index accepts simple GeoJSON geometries only.
//! `GeometryCollection` and anything unrecognised is "unsupported" and goes
//! through the run's [`UnsupportedGeometryPolicy`](crate::UnsupportedGeometryPolicy).

/// Geometry types the geo index can hold.
pub const SUPPORTED_GEOMETRY_TYPES: [&str; 6] = [
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
];

/// Whether `kind` names a supported geometry type. Matching is exact.
///
/// # Examples
/// ```
/// use osmload_core::is_supported_geometry_type;
///
/// assert!(is_supported_geometry_type("Polygon"));
/// assert!(!is_supported_geometry_type("GeometryCollection"));
/// ```
#[must_use]
pub fn is_supported_geometry_type(kind: &str) -> bool {
    SUPPORTED_GEOMETRY_TYPES.contains(&kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn accepts_simple_geometries(
        #[values(
            "Point",
            "MultiPoint",
            "LineString",
            "MultiLineString",
            "Polygon",
            "MultiPolygon"
        )]
        kind: &str,
    ) {
        assert!(is_supported_geometry_type(kind));
    }

    #[rstest]
    fn rejects_collections_and_unknown(
        #[values("GeometryCollection", "point", "Circle", "")] kind: &str,
    ) {
        assert!(!is_supported_geometry_type(kind));
    }
}
