//! Data models for sqlscope.
//!
//! This module contains the core data structures produced by schema
//! introspection and cell decoding. All of them are recomputed on every
//! fetch; none are cached or mutated in place.

mod entity;
mod metadata;
mod record;
mod table;
mod value;

pub use entity::{EntityDescriptor, Property, match_column, match_table};
pub use metadata::{AccessMode, DatabaseMetadata, DisplayMode, DisplayedObject};
pub use record::Record;
pub use table::{Column, Table};
pub use value::{ImageFormat, Value};
