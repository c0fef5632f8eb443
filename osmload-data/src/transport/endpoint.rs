//! Store coordinates and the URLs derived from them.

use base64::{Engine as _, engine::general_purpose};
use osmload_core::OnDuplicate;
use url::Url;

/// Default store URL.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8529";
/// Default database.
pub const DEFAULT_DATABASE: &str = "_system";
/// Default user.
pub const DEFAULT_USERNAME: &str = "root";

/// Where and as whom to talk to the store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreEndpoint {
    /// Server root, e.g. `http://127.0.0.1:8529`.
    pub base_url: String,
    /// Target database.
    pub database: String,
    /// Basic-auth user.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
}

impl std::fmt::Debug for StoreEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEndpoint")
            .field("base_url", &self.base_url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Default for StoreEndpoint {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            database: DEFAULT_DATABASE.to_owned(),
            username: DEFAULT_USERNAME.to_owned(),
            password: String::new(),
        }
    }
}

impl StoreEndpoint {
    /// Endpoint for `base_url` with default database and credentials.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the Basic-auth credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// `{base_url}/_db/{database}/_api/{segments...}` with every segment
    /// percent-encoded.
    ///
    /// # Errors
    /// Fails when `base_url` is not an absolute hierarchical URL.
    pub fn api_url(&self, database: &str, segments: &[&str]) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(self.base_url.trim_end_matches('/'))?;
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(["_db", database, "_api"])
            .extend(segments);
        Ok(url)
    }

    /// Bulk import URL for `collection`.
    ///
    /// # Errors
    /// Fails when `base_url` is not an absolute hierarchical URL.
    ///
    /// # Examples
    /// ```
    /// use osmload_core::OnDuplicate;
    /// use osmload_data::transport::StoreEndpoint;
    ///
    /// let endpoint = StoreEndpoint::new("http://db:8529/").with_database("osm");
    /// let url = endpoint.import_url("nodes", Some(OnDuplicate::Update))?;
    /// assert_eq!(
    ///     url.as_str(),
    ///     "http://db:8529/_db/osm/_api/import?collection=nodes&type=documents&onDuplicate=update"
    /// );
    /// # Ok::<(), url::ParseError>(())
    /// ```
    pub fn import_url(
        &self,
        collection: &str,
        on_duplicate: Option<OnDuplicate>,
    ) -> Result<Url, url::ParseError> {
        let mut url = self.api_url(&self.database, &["import"])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("collection", collection)
                .append_pair("type", "documents");
            if let Some(mode) = on_duplicate {
                query.append_pair("onDuplicate", mode.as_str());
            }
        }
        Ok(url)
    }

    /// `Basic base64(username:password)`.
    #[must_use]
    pub fn authorization(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password);
        format!("Basic {}", general_purpose::STANDARD.encode(credentials))
    }
}
