//! Model-cache and store-metadata extraction for object-graph stores.
//!
//! A `.store` file is an ordinary SQLite database with two reserved tables on
//! top: `Z_METADATA`, whose `Z_PLIST` column holds a serialized metadata
//! property list, and `Z_MODELCACHE`, whose `Z_CONTENT` column holds the
//! compressed keyed archive describing the object-graph schema. Everything in
//! this module is best-effort: a missing table, a truncated blob or a corrupt
//! archive degrades to "no object-graph schema", never a failed connect.

use std::collections::BTreeMap;
use std::io::Read;

use flate2::read::{DeflateDecoder, ZlibDecoder};
use rusqlite::Connection;

use crate::models::{DatabaseMetadata, EntityDescriptor, Property, match_column, match_table};
use crate::storage::archive::{self, ArchivedModel};
use crate::storage::schema;
use crate::{Error, Result};

/// Metadata key carrying the persistence framework version.
const PERSISTENCE_VERSION_KEY: &str = "NSPersistenceFrameworkVersion";

/// Loads persistence metadata and the archived model from an open handle.
///
/// Each half loads independently: a store with readable metadata but a
/// corrupt model cache still reports its metadata, and vice versa. Failures
/// are logged and swallowed.
#[must_use]
pub fn load(conn: &Connection) -> (Option<DatabaseMetadata>, Option<ArchivedModel>) {
    let metadata = match read_store_metadata(conn) {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            tracing::warn!(%err, "store metadata unavailable");
            None
        },
    };
    let model = match read_model_cache(conn) {
        Ok(model) => Some(model),
        Err(err) => {
            tracing::warn!(%err, "model cache unavailable");
            None
        },
    };
    (metadata, model)
}

/// Reads the metadata property list out of `Z_METADATA`.
pub fn read_store_metadata(conn: &Connection) -> Result<DatabaseMetadata> {
    let blob: Vec<u8> = conn
        .query_row("SELECT Z_PLIST FROM Z_METADATA", [], |row| row.get(0))
        .map_err(|err| Error::Metadata {
            cause: format!("cannot read Z_METADATA: {err}"),
        })?;

    let raw = plist::Value::from_reader(std::io::Cursor::new(&blob))
        .map_err(|err| Error::Metadata {
            cause: format!("Z_PLIST is not a property list: {err}"),
        })?
        .into_dictionary()
        .ok_or(Error::Metadata {
            cause: "Z_PLIST is not a dictionary".to_string(),
        })?;

    let persistence_version = raw
        .get(PERSISTENCE_VERSION_KEY)
        .and_then(plist::Value::as_signed_integer);

    Ok(DatabaseMetadata {
        persistence_version,
        raw,
    })
}

/// Reads, decompresses and decodes the archived model out of `Z_MODELCACHE`.
pub fn read_model_cache(conn: &Connection) -> Result<ArchivedModel> {
    let blob: Vec<u8> = conn
        .query_row("SELECT Z_CONTENT FROM Z_MODELCACHE", [], |row| row.get(0))
        .map_err(|err| Error::Metadata {
            cause: format!("cannot read Z_MODELCACHE: {err}"),
        })?;

    let data = inflate(&blob).map_err(|err| Error::Metadata {
        cause: format!("cannot decompress model cache: {err}"),
    })?;

    archive::read_model_archive(&data)
}

/// Inflates the model-cache blob. Stores written by the platform frameworks
/// carry either a zlib-wrapped or a raw DEFLATE stream, so both are tried.
fn inflate(blob: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::new();
    match ZlibDecoder::new(blob).read_to_end(&mut data) {
        Ok(_) => Ok(data),
        Err(zlib_err) => {
            data.clear();
            DeflateDecoder::new(blob)
                .read_to_end(&mut data)
                .map_err(|_| zlib_err)?;
            Ok(data)
        },
    }
}

/// Resolves the archived model against the introspected schema, producing one
/// [`EntityDescriptor`] per entity whose table could be found.
///
/// Matching follows the storage conventions: the uppercased entity name must
/// appear as a substring of a table name (tables scanned in the catalog's
/// lexicographic order, first match wins), and attributes match a column by
/// dropping the column name's first character and comparing
/// case-insensitively. Entities and attributes that fail to resolve are
/// skipped with a warning.
pub fn resolve_entities(conn: &Connection, model: &ArchivedModel) -> Result<Vec<EntityDescriptor>> {
    let tables = schema::list_tables(conn)?;
    let mut entities = Vec::new();

    for entity in &model.entities {
        let Some(table_name) = match_table(&entity.name, &tables) else {
            tracing::warn!(entity = entity.name, "no table matches archived entity");
            continue;
        };
        // Matching is by name only, so the match can land on a table this
        // process cannot introspect (an externally produced store may carry a
        // virtual table whose module is not loaded here). Skip the entity
        // rather than failing the whole resolution.
        let table = match schema::describe_table(conn, table_name) {
            Ok(table) => table,
            Err(err) => {
                tracing::warn!(
                    entity = entity.name,
                    table = %table_name,
                    %err,
                    "matched table cannot be described"
                );
                continue;
            },
        };

        let mut properties = BTreeMap::new();
        for attribute in &entity.attributes {
            let Some(column) = match_column(&attribute.name, &table.columns) else {
                tracing::warn!(
                    entity = entity.name,
                    attribute = attribute.name,
                    "no column matches archived attribute"
                );
                continue;
            };
            properties.insert(
                attribute.name.clone(),
                Property {
                    name: attribute.name.clone(),
                    type_name: attribute.type_name(),
                    column: column.clone(),
                },
            );
        }

        entities.push(EntityDescriptor {
            display_name: entity.name.clone(),
            properties,
            table,
        });
    }

    Ok(entities)
}
