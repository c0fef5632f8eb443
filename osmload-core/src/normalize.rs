//! Turn converter output into [`FeatureDocument`] values.
//!
//! The converter emits one GeoJSON `Feature` per element. Tags arrive as
//! `properties`; element attributes arrive either as `@`-prefixed
//! properties (`@type`, `@id`, ...) or as a top-level `id` such as `n123`.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::document::{ElementAttributes, FeatureDocument, Geometry, Tags, sanitize_key};

/// Errors raised while normalising a record.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The record is not a JSON object.
    #[error("record is not a JSON object")]
    NotAnObject,
    /// `geometry.type` is absent or empty.
    #[error("record has no geometry type")]
    MissingGeometryType,
    /// The `geometry` member could not be interpreted.
    #[error("record geometry is malformed: {source}")]
    InvalidGeometry {
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
    /// An already-normalised document did not have the expected shape.
    #[error("record is not a valid feature document: {source}")]
    InvalidDocument {
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// Normalise a GeoJSON feature into a document.
///
/// # Errors
/// Fails with [`NormalizeError::MissingGeometryType`] when the feature has no
/// usable `geometry.type`.
///
/// # Examples
/// ```
/// use osmload_core::normalize_feature;
/// use serde_json::json;
///
/// let feature = json!({
///     "type": "Feature",
///     "geometry": {"type": "Point", "coordinates": [13.4, 52.5]},
///     "properties": {"@type": "node", "@id": 42, "amenity": "cafe"}
/// });
/// let doc = normalize_feature(feature)?;
/// assert_eq!(doc.key.as_deref(), Some("node_42"));
/// assert_eq!(doc.tags_kv(), ["amenity=cafe"]);
/// # Ok::<(), osmload_core::NormalizeError>(())
/// ```
pub fn normalize_feature(value: Value) -> Result<FeatureDocument, NormalizeError> {
    let Value::Object(mut feature) = value else {
        return Err(NormalizeError::NotAnObject);
    };
    let geometry = take_geometry(&mut feature)?;
    let properties = match feature.remove("properties") {
        Some(Value::Object(properties)) => properties,
        _ => Map::new(),
    };
    let (tags, mut attributes) = split_properties(properties);
    if attributes.id.is_none()
        && let Some((element_type, id)) = feature.get("id").and_then(parse_feature_id)
    {
        attributes.id = Some(id);
        if attributes.element_type.is_none() && !element_type.is_empty() {
            attributes.element_type = Some(element_type);
        }
    }
    let key = element_key(&attributes);
    Ok(FeatureDocument::new(key, geometry, tags).with_attributes(attributes))
}

fn take_geometry(feature: &mut Map<String, Value>) -> Result<Geometry, NormalizeError> {
    let raw = match feature.remove("geometry") {
        Some(value @ Value::Object(_)) => value,
        _ => return Err(NormalizeError::MissingGeometryType),
    };
    let has_type = raw
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|kind| !kind.is_empty());
    if !has_type {
        return Err(NormalizeError::MissingGeometryType);
    }
    serde_json::from_value(raw).map_err(|source| NormalizeError::InvalidGeometry { source })
}

fn split_properties(properties: Map<String, Value>) -> (Tags, ElementAttributes) {
    let mut tags = Tags::new();
    let mut attributes = ElementAttributes::default();
    for (name, value) in properties {
        match name.strip_prefix('@') {
            Some("type") => attributes.element_type = as_text(&value),
            Some("id") => attributes.id = as_integer(&value),
            Some("version") => attributes.version = as_integer(&value),
            Some("changeset") => attributes.changeset = as_integer(&value),
            Some("timestamp") => attributes.timestamp = as_text(&value),
            Some("uid") => attributes.uid = as_integer(&value),
            Some("user") => attributes.user = as_text(&value),
            Some(_) => {}
            None => {
                if let Some(text) = as_text(&value) {
                    tags.insert(name, text);
                }
            }
        }
    }
    (tags, attributes)
}

/// Parse ids such as `n123`, `w45`, `r6` or plain numbers.
fn parse_feature_id(value: &Value) -> Option<(String, i64)> {
    match value {
        Value::Number(number) => number.as_i64().map(|id| (String::new(), id)),
        Value::String(text) => {
            let mut chars = text.chars();
            let element_type = match chars.next()? {
                'n' => "node",
                'w' => "way",
                'r' => "relation",
                'a' => "area",
                _ => return text.parse().ok().map(|id| (String::new(), id)),
            };
            let id = chars.as_str().parse().ok()?;
            Some((element_type.to_owned(), id))
        }
        _ => None,
    }
}

fn element_key(attributes: &ElementAttributes) -> Option<String> {
    let id = attributes.id?;
    match attributes.element_type.as_deref() {
        Some(element_type) if !element_type.is_empty() => {
            sanitize_key(&format!("{element_type}_{id}"))
        }
        _ => sanitize_key(&id.to_string()),
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}
