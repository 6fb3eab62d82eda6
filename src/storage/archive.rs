//! Narrow keyed-archive reader for archived object-graph models.
//!
//! The model cache embedded in a `.store` file is an `NSKeyedArchiver`
//! archive: a property list holding a flat `$objects` table in which objects
//! reference each other by UID. This reader is deliberately not a general
//! object-graph decoder: it recognizes exactly the archived classes needed
//! to recover an entity/attribute schema (`NSManagedObjectModel`,
//! `NSEntityDescription`, `NSAttributeDescription`) and ignores everything
//! else, relationships included.

use std::io::Cursor;

use plist::Value as Plist;

use crate::{Error, Result};

/// Attribute type codes as archived by the persistence framework.
const TYPE_INT16: i64 = 100;
const TYPE_INT32: i64 = 200;
const TYPE_INT64: i64 = 300;
const TYPE_DECIMAL: i64 = 400;
const TYPE_DOUBLE: i64 = 500;
const TYPE_FLOAT: i64 = 600;
const TYPE_BOOLEAN: i64 = 800;
const TYPE_DATE: i64 = 900;
const TYPE_BINARY_DATA: i64 = 1000;

/// One attribute of an archived entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedAttribute {
    /// Logical attribute name.
    pub name: String,
    /// Archived attribute type code.
    pub attribute_type: i64,
    /// Whether the attribute is declared optional.
    pub optional: bool,
}

impl ArchivedAttribute {
    /// Display type for this attribute, with `?` appended when optional.
    #[must_use]
    pub fn type_name(&self) -> String {
        let base = match self.attribute_type {
            TYPE_BINARY_DATA => "Data",
            TYPE_BOOLEAN => "Bool",
            TYPE_DATE => "Date",
            TYPE_DECIMAL => "Decimal",
            TYPE_DOUBLE => "Double",
            TYPE_FLOAT => "Float",
            TYPE_INT16 | TYPE_INT32 | TYPE_INT64 => "Int",
            _ => "String",
        };
        if self.optional {
            format!("{base}?")
        } else {
            base.to_string()
        }
    }
}

/// One entity of the archived model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedEntity {
    /// Entity name.
    pub name: String,
    /// Attributes in archive order; relationships are not carried over.
    pub attributes: Vec<ArchivedAttribute>,
}

/// The entity/attribute schema recovered from a model-cache archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedModel {
    /// Entities in archive order.
    pub entities: Vec<ArchivedEntity>,
}

/// Reads an archived object-graph model from decompressed archive bytes.
///
/// Accepts only `NSKeyedArchiver` archives whose root object is an
/// `NSManagedObjectModel`; anything else is a [`Error::Metadata`]. Within
/// the model, unrecognized entities and properties are skipped, not errors.
pub fn read_model_archive(data: &[u8]) -> Result<ArchivedModel> {
    let plist = Plist::from_reader(Cursor::new(data))
        .map_err(|err| metadata_err(format!("archive is not a property list: {err}")))?;
    let archive = plist
        .as_dictionary()
        .ok_or_else(|| metadata_err("archive root is not a dictionary"))?;

    let archiver = archive.get("$archiver").and_then(Plist::as_string);
    if archiver != Some("NSKeyedArchiver") {
        return Err(metadata_err("not an NSKeyedArchiver archive"));
    }

    let objects = archive
        .get("$objects")
        .and_then(Plist::as_array)
        .ok_or_else(|| metadata_err("archive has no $objects table"))?;
    let root_uid = archive
        .get("$top")
        .and_then(Plist::as_dictionary)
        .and_then(|top| top.get("root"))
        .and_then(Plist::as_uid)
        .ok_or_else(|| metadata_err("archive has no root object"))?;

    let root = objects
        .get(usize::try_from(root_uid.get()).unwrap_or(usize::MAX))
        .ok_or_else(|| metadata_err("root UID points outside $objects"))?;
    let root = root
        .as_dictionary()
        .filter(|obj| class_name(objects, obj) == Some("NSManagedObjectModel"))
        .ok_or_else(|| metadata_err("root object is not a managed object model"))?;

    let mut entities = Vec::new();
    for entity in container_items(objects, root.get("NSEntities")) {
        let Some(entity) = entity
            .as_dictionary()
            .filter(|obj| class_name(objects, obj) == Some("NSEntityDescription"))
        else {
            continue;
        };
        let Some(name) = resolve(objects, entity.get("NSEntityName")).and_then(Plist::as_string)
        else {
            tracing::warn!("skipping archived entity without a name");
            continue;
        };

        let mut attributes = Vec::new();
        for property in container_items(objects, entity.get("NSProperties")) {
            // Only plain attributes; relationships and fetched properties
            // are ignored.
            let Some(property) = property
                .as_dictionary()
                .filter(|obj| class_name(objects, obj) == Some("NSAttributeDescription"))
            else {
                continue;
            };
            let Some(attr_name) =
                resolve(objects, property.get("NSPropertyName")).and_then(Plist::as_string)
            else {
                tracing::warn!(entity = name, "skipping archived attribute without a name");
                continue;
            };
            let attribute_type = resolve(objects, property.get("NSAttributeType"))
                .and_then(Plist::as_signed_integer)
                .unwrap_or(0);
            let optional = resolve(objects, property.get("NSIsOptional"))
                .and_then(Plist::as_boolean)
                .unwrap_or(false);

            attributes.push(ArchivedAttribute {
                name: attr_name.to_string(),
                attribute_type,
                optional,
            });
        }

        entities.push(ArchivedEntity {
            name: name.to_string(),
            attributes,
        });
    }

    Ok(ArchivedModel { entities })
}

fn metadata_err(cause: impl Into<String>) -> Error {
    Error::Metadata {
        cause: cause.into(),
    }
}

/// Follows one level of UID indirection into the `$objects` table.
fn resolve<'a>(objects: &'a [Plist], value: Option<&'a Plist>) -> Option<&'a Plist> {
    match value {
        Some(Plist::Uid(uid)) => objects.get(usize::try_from(uid.get()).ok()?),
        other => other,
    }
}

/// Class name of an archived object, via its `$class` reference.
fn class_name<'a>(objects: &'a [Plist], object: &'a plist::Dictionary) -> Option<&'a str> {
    resolve(objects, object.get("$class"))?
        .as_dictionary()?
        .get("$classname")?
        .as_string()
}

/// Items of an archived container, which may be an `NSArray`-style object
/// (`NS.objects`) or a bare plist array, with elements behind UIDs.
fn container_items<'a>(objects: &'a [Plist], value: Option<&'a Plist>) -> Vec<&'a Plist> {
    let Some(container) = resolve(objects, value) else {
        return Vec::new();
    };
    let items = match container {
        Plist::Array(items) => items.as_slice(),
        Plist::Dictionary(dict) => match dict.get("NS.objects").and_then(Plist::as_array) {
            Some(items) => items.as_slice(),
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    items
        .iter()
        .filter_map(|item| resolve(objects, Some(item)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use plist::{Dictionary, Uid};

    fn class(objects: &mut Vec<Plist>, name: &str) -> Uid {
        let mut dict = Dictionary::new();
        dict.insert("$classname".into(), Plist::String(name.to_string()));
        objects.push(Plist::Dictionary(dict));
        Uid::new((objects.len() - 1) as u64)
    }

    /// Builds a minimal archived model with one `Person` entity carrying
    /// `name: String?` and `age: Int`.
    fn person_archive() -> Vec<u8> {
        let mut objects: Vec<Plist> = vec![Plist::String("$null".to_string())];

        let model_class = class(&mut objects, "NSManagedObjectModel");
        let entity_class = class(&mut objects, "NSEntityDescription");
        let attr_class = class(&mut objects, "NSAttributeDescription");
        let array_class = class(&mut objects, "NSArray");

        let mut name_attr = Dictionary::new();
        name_attr.insert("$class".into(), Plist::Uid(attr_class));
        name_attr.insert("NSPropertyName".into(), Plist::String("name".into()));
        name_attr.insert("NSAttributeType".into(), Plist::Integer(700.into()));
        name_attr.insert("NSIsOptional".into(), Plist::Boolean(true));
        objects.push(Plist::Dictionary(name_attr));
        let name_uid = Uid::new((objects.len() - 1) as u64);

        let mut age_attr = Dictionary::new();
        age_attr.insert("$class".into(), Plist::Uid(attr_class));
        age_attr.insert("NSPropertyName".into(), Plist::String("age".into()));
        age_attr.insert("NSAttributeType".into(), Plist::Integer(300.into()));
        objects.push(Plist::Dictionary(age_attr));
        let age_uid = Uid::new((objects.len() - 1) as u64);

        let mut props = Dictionary::new();
        props.insert("$class".into(), Plist::Uid(array_class));
        props.insert(
            "NS.objects".into(),
            Plist::Array(vec![Plist::Uid(name_uid), Plist::Uid(age_uid)]),
        );
        objects.push(Plist::Dictionary(props));
        let props_uid = Uid::new((objects.len() - 1) as u64);

        let mut entity = Dictionary::new();
        entity.insert("$class".into(), Plist::Uid(entity_class));
        entity.insert("NSEntityName".into(), Plist::String("Person".into()));
        entity.insert("NSProperties".into(), Plist::Uid(props_uid));
        objects.push(Plist::Dictionary(entity));
        let entity_uid = Uid::new((objects.len() - 1) as u64);

        let mut entities = Dictionary::new();
        entities.insert("$class".into(), Plist::Uid(array_class));
        entities.insert("NS.objects".into(), Plist::Array(vec![Plist::Uid(entity_uid)]));
        objects.push(Plist::Dictionary(entities));
        let entities_uid = Uid::new((objects.len() - 1) as u64);

        let mut root = Dictionary::new();
        root.insert("$class".into(), Plist::Uid(model_class));
        root.insert("NSEntities".into(), Plist::Uid(entities_uid));
        objects.push(Plist::Dictionary(root));
        let root_uid = Uid::new((objects.len() - 1) as u64);

        let mut top = Dictionary::new();
        top.insert("root".into(), Plist::Uid(root_uid));

        let mut archive = Dictionary::new();
        archive.insert("$archiver".into(), Plist::String("NSKeyedArchiver".into()));
        archive.insert("$version".into(), Plist::Integer(100_000.into()));
        archive.insert("$objects".into(), Plist::Array(objects));
        archive.insert("$top".into(), Plist::Dictionary(top));

        let mut buf = Vec::new();
        Plist::Dictionary(archive)
            .to_writer_binary(&mut buf)
            .unwrap();
        buf
    }

    #[test]
    fn test_reads_entities_and_attributes() {
        let model = read_model_archive(&person_archive()).unwrap();
        assert_eq!(model.entities.len(), 1);

        let entity = &model.entities[0];
        assert_eq!(entity.name, "Person");
        assert_eq!(entity.attributes.len(), 2);
        assert_eq!(entity.attributes[0].name, "name");
        assert_eq!(entity.attributes[0].type_name(), "String?");
        assert_eq!(entity.attributes[1].name, "age");
        assert_eq!(entity.attributes[1].type_name(), "Int");
    }

    #[test]
    fn test_rejects_non_archive_plist() {
        let mut buf = Vec::new();
        Plist::String("just a string".into())
            .to_writer_binary(&mut buf)
            .unwrap();
        assert!(matches!(
            read_model_archive(&buf),
            Err(Error::Metadata { .. })
        ));
    }

    #[test]
    fn test_rejects_garbage_bytes() {
        assert!(matches!(
            read_model_archive(b"definitely not a plist"),
            Err(Error::Metadata { .. })
        ));
    }

    #[test]
    fn test_rejects_wrong_root_class() {
        // A valid archive whose root is not a managed object model.
        let mut objects: Vec<Plist> = vec![Plist::String("$null".to_string())];
        let other_class = class(&mut objects, "NSString");
        let mut root = Dictionary::new();
        root.insert("$class".into(), Plist::Uid(other_class));
        objects.push(Plist::Dictionary(root));
        let root_uid = Uid::new((objects.len() - 1) as u64);

        let mut top = Dictionary::new();
        top.insert("root".into(), Plist::Uid(root_uid));
        let mut archive = Dictionary::new();
        archive.insert("$archiver".into(), Plist::String("NSKeyedArchiver".into()));
        archive.insert("$objects".into(), Plist::Array(objects));
        archive.insert("$top".into(), Plist::Dictionary(top));

        let mut buf = Vec::new();
        Plist::Dictionary(archive)
            .to_writer_binary(&mut buf)
            .unwrap();
        assert!(matches!(
            read_model_archive(&buf),
            Err(Error::Metadata { .. })
        ));
    }

    #[test]
    fn test_type_name_mapping() {
        let attr = |code, optional| ArchivedAttribute {
            name: "x".into(),
            attribute_type: code,
            optional,
        };
        assert_eq!(attr(100, false).type_name(), "Int");
        assert_eq!(attr(500, false).type_name(), "Double");
        assert_eq!(attr(800, false).type_name(), "Bool");
        assert_eq!(attr(900, true).type_name(), "Date?");
        assert_eq!(attr(1000, false).type_name(), "Data");
        assert_eq!(attr(700, true).type_name(), "String?");
        // Unknown codes display as String.
        assert_eq!(attr(1800, false).type_name(), "String");
    }
}
