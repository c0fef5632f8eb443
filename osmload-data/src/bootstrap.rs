//! Prepare the target database, collection and geo index before an import.
//!
//! Every step is idempotent: a conflict response (HTTP 409) means the object
//! already exists and counts as success.

use log::{debug, info};
use thiserror::Error;

use crate::client::{ClientError, StoreClient};

/// Document field holding the GeoJSON geometry.
pub const GEOMETRY_FIELD: &str = "geometry";

/// Errors raised while preparing the store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BootstrapError {
    /// The database could not be created.
    #[error("failed to create database '{database}': {source}")]
    Database {
        /// Database name.
        database: String,
        /// Client failure.
        #[source]
        source: ClientError,
    },
    /// The collection could not be created.
    #[error("failed to create collection '{collection}': {source}")]
    Collection {
        /// Collection name.
        collection: String,
        /// Client failure.
        #[source]
        source: ClientError,
    },
    /// The geo index could not be created.
    #[error("failed to create geo index on '{collection}.{field}': {source}")]
    GeoIndex {
        /// Collection name.
        collection: String,
        /// Indexed field.
        field: String,
        /// Client failure.
        #[source]
        source: ClientError,
    },
}

/// Outcome of one idempotent step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    /// The object was created.
    Created,
    /// The object already existed.
    Existing,
}

fn tolerate_conflict(result: Result<(), ClientError>) -> Result<Ensured, ClientError> {
    match result {
        Ok(()) => Ok(Ensured::Created),
        Err(ClientError::Api { ref source, .. }) if source.is_conflict() => Ok(Ensured::Existing),
        Err(err) => Err(err),
    }
}

/// Create `database` unless it already exists.
///
/// # Errors
/// Returns [`BootstrapError::Database`] for any failure other than a conflict.
pub async fn ensure_database(
    client: &StoreClient,
    database: &str,
) -> Result<Ensured, BootstrapError> {
    let ensured = tolerate_conflict(client.create_database(database).await).map_err(|source| {
        BootstrapError::Database {
            database: database.to_owned(),
            source,
        }
    })?;
    log_step("database", database, ensured);
    Ok(ensured)
}

/// Create document collection `collection` in the client's database unless
/// it already exists.
///
/// # Errors
/// Returns [`BootstrapError::Collection`] for any failure other than a conflict.
pub async fn ensure_collection(
    client: &StoreClient,
    collection: &str,
) -> Result<Ensured, BootstrapError> {
    let ensured = tolerate_conflict(client.create_collection(collection).await).map_err(
        |source| BootstrapError::Collection {
            collection: collection.to_owned(),
            source,
        },
    )?;
    log_step("collection", collection, ensured);
    Ok(ensured)
}

/// Ensure a GeoJSON geo index on `field` of `collection`.
///
/// The store answers an identical existing index with success, so
/// [`Ensured::Created`] does not guarantee a new index was built.
///
/// # Errors
/// Returns [`BootstrapError::GeoIndex`] for any failure other than a conflict.
pub async fn ensure_geo_index(
    client: &StoreClient,
    collection: &str,
    field: &str,
) -> Result<Ensured, BootstrapError> {
    let ensured = tolerate_conflict(client.ensure_geo_index(collection, field).await).map_err(
        |source| BootstrapError::GeoIndex {
            collection: collection.to_owned(),
            field: field.to_owned(),
            source,
        },
    )?;
    debug!("geo index on {collection}.{field}: {ensured:?}");
    Ok(ensured)
}

/// Create `database`, then `collection` inside it, then a geo index on
/// [`GEOMETRY_FIELD`].
///
/// # Errors
/// Returns the first failing step's [`BootstrapError`].
pub async fn bootstrap(
    client: &StoreClient,
    database: &str,
    collection: &str,
) -> Result<(), BootstrapError> {
    ensure_database(client, database).await?;
    let scoped = client.for_database(database);
    ensure_collection(&scoped, collection).await?;
    ensure_geo_index(&scoped, collection, GEOMETRY_FIELD).await?;
    info!("store ready: {database}/{collection} with a geo index on {GEOMETRY_FIELD}");
    Ok(())
}

fn log_step(kind: &str, name: &str, ensured: Ensured) {
    match ensured {
        Ensured::Created => info!("created {kind} '{name}'"),
        Ensured::Existing => debug!("{kind} '{name}' already exists"),
    }
}
