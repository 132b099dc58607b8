//! The document envelope and payload conversion.
//!
//! Every stored document is a domain payload plus a [`BaseEntity`] envelope holding the
//! store-assigned identifier and the two timestamps. The envelope keys are owned by the
//! layer: they are stripped from caller payloads before anything is written, and split off
//! stored documents before the payload is deserialized.

use bson::{Bson, DateTime as BsonDateTime, Document, de::deserialize_from_document, oid::ObjectId, ser::serialize_to_document};
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{DbError, DbResult};

/// Key of the store-assigned identifier.
pub const ID_FIELD: &str = "_id";
/// Key of the creation timestamp, set once at insert.
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Key of the modification timestamp, set at insert and on every update.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

const ENVELOPE_FIELDS: [&str; 3] = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

/// The envelope the layer maintains around every payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BaseEntity {
    /// Identifier assigned by the store on first insert.
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BaseEntity {
    /// Splits the envelope keys off a stored document, leaving only the payload fields.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if `_id` is not an ObjectId or a timestamp is not
    /// a datetime.
    pub fn split_from(document: &mut Document) -> DbResult<Self> {
        let id = match document.remove(ID_FIELD) {
            None | Some(Bson::Null) => None,
            Some(Bson::ObjectId(id)) => Some(id),
            Some(other) => {
                return Err(DbError::Serialization(format!(
                    "Expected ObjectId for {ID_FIELD}, found {other}"
                )));
            }
        };

        Ok(Self {
            id,
            created_at: take_timestamp(document, CREATED_AT_FIELD)?,
            updated_at: take_timestamp(document, UPDATED_AT_FIELD)?,
        })
    }
}

fn take_timestamp(document: &mut Document, key: &str) -> DbResult<Option<DateTime<Utc>>> {
    match document.remove(key) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::DateTime(value)) => Ok(Some(value.to_chrono())),
        Some(other) => Err(DbError::Serialization(format!(
            "Expected datetime for {key}, found {other}"
        ))),
    }
}

/// A payload of type `T` as it exists in the store, together with its envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stored<T> {
    #[serde(flatten)]
    pub base: BaseEntity,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Stored<T> {
    pub fn id(&self) -> Option<ObjectId> {
        self.base.id
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.base.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.base.updated_at
    }

    /// Discards the envelope and returns the payload.
    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T: DeserializeOwned> Stored<T> {
    /// Decodes a stored document into its envelope and typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if the envelope is malformed or the remaining
    /// fields do not deserialize into `T`.
    pub fn from_document(mut document: Document) -> DbResult<Self> {
        let base = BaseEntity::split_from(&mut document)?;

        Ok(Self {
            base,
            data: deserialize_from_document(document)?,
        })
    }
}

/// Serializes a caller payload into a document with every envelope key removed.
///
/// # Errors
///
/// Returns [`DbError::Serialization`] if the payload does not serialize to a document
/// (for example a bare string or number).
pub fn payload_document<P: Serialize + ?Sized>(payload: &P) -> DbResult<Document> {
    let mut document = serialize_to_document(payload)?;

    for key in ENVELOPE_FIELDS {
        document.remove(key);
    }

    Ok(document)
}

/// Looks up a field by dotted path (`"address.city"`) through nested documents.
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// The current instant at the store's millisecond precision.
pub(crate) fn now() -> BsonDateTime {
    BsonDateTime::now()
}

/// Field sets of an upsert.
///
/// `set` is applied whether or not a document matches; `set_on_insert` is only applied
/// when the upsert creates a new document. Keeping the two apart prevents insert-only
/// fields from leaking into the update path. When a key appears in both, the `set` value
/// wins and the insert-only value is dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Upsert {
    set: Document,
    set_on_insert: Document,
}

impl Upsert {
    /// Creates an upsert that applies `set` in both branches.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if `set` does not serialize to a document.
    pub fn new<S: Serialize + ?Sized>(set: &S) -> DbResult<Self> {
        Ok(Self {
            set: payload_document(set)?,
            set_on_insert: Document::new(),
        })
    }

    /// Adds fields that are only written when the upsert inserts.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if `data` does not serialize to a document.
    pub fn on_insert<I: Serialize + ?Sized>(mut self, data: &I) -> DbResult<Self> {
        self.set_on_insert = payload_document(data)?;
        Ok(self)
    }

    /// Builds an upsert from already encoded field sets.
    pub fn from_documents(mut set: Document, mut set_on_insert: Document) -> Self {
        for key in ENVELOPE_FIELDS {
            set.remove(key);
            set_on_insert.remove(key);
        }

        Self { set, set_on_insert }
    }

    pub fn set(&self) -> &Document {
        &self.set
    }

    pub fn set_on_insert(&self) -> &Document {
        &self.set_on_insert
    }

    /// Returns the two field sets with overlapping insert-only keys removed.
    pub(crate) fn into_parts(self) -> (Document, Document) {
        let Self { set, set_on_insert } = self;
        let set_on_insert = set_on_insert
            .into_iter()
            .filter(|(key, _)| !set.contains_key(key))
            .collect();

        (set, set_on_insert)
    }
}
