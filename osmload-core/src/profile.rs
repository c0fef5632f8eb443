//! Named tag-based inclusion filters applied before batching.

use std::str::FromStr;

use crate::document::FeatureDocument;
use crate::policy::UnknownPolicyError;

const POI_KEYS: [&str; 7] = [
    "amenity", "shop", "tourism", "leisure", "historic", "craft", "office",
];

/// Built-in import profiles.
///
/// # Examples
/// ```
/// use osmload_core::{FeatureDocument, Geometry, Profile, Tags};
/// use serde_json::json;
///
/// let road = FeatureDocument::new(
///     None,
///     Geometry::new("LineString", json!([[0, 0], [1, 1]])),
///     Tags::from([("highway".into(), "primary".into())]),
/// );
/// assert!(Profile::Roads.accepts(&road));
/// assert!(!Profile::Buildings.accepts(&road));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    /// Every feature.
    All,
    /// Amenities, shops, tourism, leisure, historic sites, crafts and offices.
    Pois,
    /// Anything tagged `highway`.
    Roads,
    /// Anything tagged `building`.
    Buildings,
    /// Administrative and other boundaries.
    Boundaries,
    /// Water bodies and waterways.
    Water,
}

impl Profile {
    /// Every built-in profile, in display order.
    pub const ALL: [Self; 6] = [
        Self::All,
        Self::Pois,
        Self::Roads,
        Self::Buildings,
        Self::Boundaries,
        Self::Water,
    ];

    /// Return the profile as a lowercase `&str`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Pois => "pois",
            Self::Roads => "roads",
            Self::Buildings => "buildings",
            Self::Boundaries => "boundaries",
            Self::Water => "water",
        }
    }

    /// Whether `document` belongs to this profile.
    #[must_use]
    pub fn accepts(self, document: &FeatureDocument) -> bool {
        match self {
            Self::All => true,
            Self::Pois => POI_KEYS.iter().any(|key| document.has_tag(key)),
            Self::Roads => document.has_tag("highway"),
            Self::Buildings => document.has_tag("building"),
            Self::Boundaries => document.has_tag("boundary") || document.has_tag("admin_level"),
            Self::Water => {
                document.tag("natural") == Some("water")
                    || document.has_tag("waterway")
                    || document.has_tag("water")
            }
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = UnknownPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPolicyError {
                kind: "profile",
                value: s.to_owned(),
                expected: "all pois roads buildings boundaries water",
            })
    }
}

/// Decides whether a document passes the named profile.
pub trait ProfileFilter: Send + Sync {
    /// Return `false` to drop `document`.
    fn accepts(&self, document: &FeatureDocument, profile: &str) -> bool;
}

/// [`ProfileFilter`] backed by the built-in [`Profile`] table.
///
/// Unknown profile names accept nothing; callers validate names up front.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProfiles;

impl ProfileFilter for BuiltinProfiles {
    fn accepts(&self, document: &FeatureDocument, profile: &str) -> bool {
        profile
            .parse::<Profile>()
            .is_ok_and(|profile| profile.accepts(document))
    }
}
