//! Shared helpers for the transport integration tests.

use osmload_core::{FeatureDocument, Geometry, Tags};
use serde_json::json;

/// A keyed point document tagged `name=<name>`.
pub fn named_point(key: &str, name: &str) -> FeatureDocument {
    FeatureDocument::new(
        Some(key.to_owned()),
        Geometry::new("Point", json!([13.4, 52.5])),
        Tags::from([("name".to_owned(), name.to_owned())]),
    )
}
