//! Feature documents as stored in the target collection.

use std::collections::BTreeMap;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geometry::is_supported_geometry_type;
use crate::normalize::NormalizeError;

/// Tag map keyed by OSM tag name. Ordered so derived views are deterministic.
pub type Tags = BTreeMap<String, String>;

/// Longest `_key` the store accepts, in bytes.
pub const MAX_KEY_BYTES: usize = 254;

/// GeoJSON-style geometry value.
///
/// Only the `type` member is validated; coordinates and any other members,
/// such as `bbox`, are carried verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    /// Geometry type such as `Point` or `GeometryCollection`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Coordinate array for simple geometries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<serde_json::Value>,
    /// Member geometries of a `GeometryCollection`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometries: Option<Vec<Geometry>>,
    /// Members not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Geometry {
    /// Construct a geometry with coordinates.
    ///
    /// # Examples
    /// ```
    /// use osmload_core::Geometry;
    /// use serde_json::json;
    ///
    /// let point = Geometry::new("Point", json!([13.4, 52.5]));
    /// assert!(point.is_supported());
    /// ```
    pub fn new(kind: impl Into<String>, coordinates: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            coordinates: Some(coordinates),
            geometries: None,
            extra: Map::new(),
        }
    }

    /// Construct a `GeometryCollection` from member geometries.
    #[must_use]
    pub fn collection(geometries: Vec<Self>) -> Self {
        Self {
            kind: "GeometryCollection".to_owned(),
            coordinates: None,
            geometries: Some(geometries),
            extra: Map::new(),
        }
    }

    /// Whether the geometry type is one the target geo index can hold.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        is_supported_geometry_type(&self.kind)
    }
}

/// Core OSM element attributes. All optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElementAttributes {
    /// Element type: `node`, `way` or `relation`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
    /// OSM element identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Element version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Changeset that last touched the element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changeset: Option<i64>,
    /// ISO-8601 timestamp of the last edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// User identifier of the last editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    /// User name of the last editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// One geospatial feature ready for upload.
///
/// `tagsKeys` and `tagsKV` are private and recomputed whenever the tag map
/// changes, including on deserialisation. Members with no field of their
/// own, and attributes whose value has an unexpected type, are kept in
/// [`FeatureDocument::extra`] and written back out unchanged.
///
/// # Examples
/// ```
/// use osmload_core::{FeatureDocument, Geometry, Tags};
/// use serde_json::json;
///
/// let tags = Tags::from([("amenity".into(), "cafe".into())]);
/// let doc = FeatureDocument::new(Some("node_1".into()), Geometry::new("Point", json!([0, 0])), tags);
/// assert_eq!(doc.tags_keys(), ["amenity"]);
/// assert_eq!(doc.tags_kv(), ["amenity=cafe"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDocument")]
pub struct FeatureDocument {
    /// Sanitised document key; `None` lets the store assign one.
    #[serde(rename = "_key", skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Feature geometry.
    pub geometry: Geometry,
    tags: Tags,
    #[serde(rename = "tagsKeys")]
    tags_keys: Vec<String>,
    #[serde(rename = "tagsKV")]
    tags_kv: Vec<String>,
    /// Core element attributes, flattened into the document.
    #[serde(flatten)]
    pub attributes: ElementAttributes,
    /// Members carried through from pass-through input.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeatureDocument {
    /// Build a document, deriving the tag views from `tags`.
    #[must_use]
    pub fn new(key: Option<String>, geometry: Geometry, tags: Tags) -> Self {
        let (tags_keys, tags_kv) = derive_tag_views(&tags);
        Self {
            key,
            geometry,
            tags,
            tags_keys,
            tags_kv,
            attributes: ElementAttributes::default(),
            extra: Map::new(),
        }
    }

    /// Attach element attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: ElementAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Interpret an already-normalised JSON value as a document.
    ///
    /// # Errors
    /// Returns [`NormalizeError::MissingGeometryType`] when `geometry.type` is
    /// absent or empty, and [`NormalizeError::InvalidDocument`] when the value
    /// does not have the document shape.
    pub fn from_value(value: serde_json::Value) -> Result<Self, NormalizeError> {
        if !value.is_object() {
            return Err(NormalizeError::NotAnObject);
        }
        let document: Self = serde_json::from_value(value)
            .map_err(|source| NormalizeError::InvalidDocument { source })?;
        if document.geometry.kind.is_empty() {
            return Err(NormalizeError::MissingGeometryType);
        }
        Ok(document)
    }

    /// Tag map.
    #[must_use]
    pub const fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Tag keys in map order.
    #[must_use]
    pub fn tags_keys(&self) -> &[String] {
        &self.tags_keys
    }

    /// `key=value` strings in map order.
    #[must_use]
    pub fn tags_kv(&self) -> &[String] {
        &self.tags_kv
    }

    /// Whether the tag map contains `key`.
    #[must_use]
    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    /// Value of tag `key`, if present.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Replace the tag map and rebuild the derived views.
    pub fn set_tags(&mut self, tags: Tags) {
        let (tags_keys, tags_kv) = derive_tag_views(&tags);
        self.tags = tags;
        self.tags_keys = tags_keys;
        self.tags_kv = tags_kv;
    }
}

#[derive(Deserialize)]
#[serde(transparent)]
struct RawDocument {
    members: Map<String, Value>,
}

impl TryFrom<RawDocument> for FeatureDocument {
    type Error = serde_json::Error;

    fn try_from(raw: RawDocument) -> Result<Self, Self::Error> {
        let mut members = raw.members;
        let key = match members.remove("_key") {
            None | Some(Value::Null) => None,
            Some(Value::String(key)) => Some(key),
            Some(other) => {
                return Err(serde_json::Error::custom(format!(
                    "`_key` must be a string, found {other}"
                )));
            }
        };
        let geometry = match members.remove("geometry") {
            None | Some(Value::Null) => Geometry::default(),
            Some(geometry) => serde_json::from_value(geometry)?,
        };
        let tags = match members.remove("tags") {
            None | Some(Value::Null) => Tags::new(),
            Some(Value::Object(tags)) => tags_from_members(tags),
            Some(other) => {
                return Err(serde_json::Error::custom(format!(
                    "`tags` must be an object, found {other}"
                )));
            }
        };
        // Derived views are always rebuilt from `tags`.
        members.remove("tagsKeys");
        members.remove("tagsKV");
        let attributes = ElementAttributes {
            element_type: take_member(&mut members, "type"),
            id: take_member(&mut members, "id"),
            version: take_member(&mut members, "version"),
            changeset: take_member(&mut members, "changeset"),
            timestamp: take_member(&mut members, "timestamp"),
            uid: take_member(&mut members, "uid"),
            user: take_member(&mut members, "user"),
        };
        let mut document = Self::new(key, geometry, tags).with_attributes(attributes);
        document.extra = members;
        Ok(document)
    }
}

/// Remove `name` when its value has type `T`; otherwise leave it in place.
fn take_member<T: DeserializeOwned>(members: &mut Map<String, Value>, name: &str) -> Option<T> {
    let parsed = T::deserialize(members.get(name)?).ok()?;
    members.remove(name);
    Some(parsed)
}

/// Strings are kept as-is, nulls dropped and other values stored as JSON text.
fn tags_from_members(members: Map<String, Value>) -> Tags {
    members
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(text) => Some((key, text)),
            other => Some((key, other.to_string())),
        })
        .collect()
}

fn derive_tag_views(tags: &Tags) -> (Vec<String>, Vec<String>) {
    let keys = tags.keys().cloned().collect();
    let pairs = tags
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    (keys, pairs)
}

/// Map `raw` onto the store's key alphabet.
///
/// Characters outside `A-Z a-z 0-9 _ - : . @ ( ) + , = ; $ ! * ' %` become
/// `_`; the result is truncated to [`MAX_KEY_BYTES`]. Empty input yields
/// `None`.
///
/// # Examples
/// ```
/// use osmload_core::sanitize_key;
///
/// assert_eq!(sanitize_key("node/42").as_deref(), Some("node_42"));
/// assert_eq!(sanitize_key(""), None);
/// ```
#[must_use]
pub fn sanitize_key(raw: &str) -> Option<String> {
    let mut key: String = raw
        .chars()
        .map(|ch| if is_key_char(ch) { ch } else { '_' })
        .collect();
    // Every retained character is ASCII, so byte truncation is char-safe.
    key.truncate(MAX_KEY_BYTES);
    (!key.is_empty()).then_some(key)
}

const fn is_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '_' | '-' | ':' | '.' | '@' | '(' | ')' | '+' | ',' | '=' | ';' | '$' | '!' | '*'
                | '\'' | '%'
        )
}
