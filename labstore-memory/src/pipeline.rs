//! Aggregation pipelines and result shaping over in-memory documents.
//!
//! Stages run in order over the documents of one collection. The supported stages are
//! `$match`, `$sort`, `$skip`, `$limit`, `$project` (field inclusion or exclusion) and
//! `$count`; any other stage fails with an operation error naming it.

use std::cmp::Ordering;
use bson::{Bson, Document};

use labstore_core::{
    document::{ID_FIELD, get_path},
    error::{DbError, DbResult},
    query::{Sort, SortDirection},
};

use crate::{
    evaluator::{Comparable, DocumentEvaluator},
    parse::parse_filter,
};

/// Runs `pipeline` over `documents`.
pub fn run(mut documents: Vec<Document>, pipeline: &[Document]) -> DbResult<Vec<Document>> {
    for stage in pipeline {
        let mut entries = stage.iter();

        let (Some((name, operand)), None) = (entries.next(), entries.next()) else {
            return Err(DbError::operation(
                None,
                "A pipeline stage must have exactly one field",
            ));
        };

        documents = match name.as_str() {
            "$match" => {
                let filter = parse_filter(stage_document(name, operand)?)?;
                let mut matched = Vec::with_capacity(documents.len());

                for document in documents {
                    if DocumentEvaluator::matches(&document, &filter)? {
                        matched.push(document);
                    }
                }

                matched
            }
            "$sort" => {
                let keys = sort_keys(stage_document(name, operand)?)?;
                sort_documents(&mut documents, &keys);
                documents
            }
            "$skip" => documents.into_iter().skip(count_operand(name, operand)?).collect(),
            "$limit" => documents.into_iter().take(count_operand(name, operand)?).collect(),
            "$project" => {
                let projection = stage_document(name, operand)?;
                documents
                    .iter()
                    .map(|document| project(document, projection))
                    .collect::<DbResult<Vec<_>>>()?
            }
            "$count" => {
                let Bson::String(field) = operand else {
                    return Err(DbError::operation(None, "$count needs a field name"));
                };

                match documents.len() {
                    0 => Vec::new(),
                    total => {
                        let total = i32::try_from(total)
                            .map(Bson::Int32)
                            .unwrap_or(Bson::Int64(total as i64));

                        let mut counted = Document::new();
                        counted.insert(field.clone(), total);
                        vec![counted]
                    }
                }
            }
            other => {
                return Err(DbError::operation(
                    None,
                    format!("Unsupported pipeline stage: {other}"),
                ));
            }
        };
    }

    Ok(documents)
}

fn stage_document<'a>(name: &str, operand: &'a Bson) -> DbResult<&'a Document> {
    match operand {
        Bson::Document(document) => Ok(document),
        _ => Err(DbError::operation(None, format!("{name} needs a document"))),
    }
}

fn count_operand(name: &str, operand: &Bson) -> DbResult<usize> {
    let value = match operand {
        Bson::Int32(value) => i64::from(*value),
        Bson::Int64(value) => *value,
        Bson::Double(value) if value.fract() == 0.0 => *value as i64,
        _ => return Err(DbError::operation(None, format!("{name} needs an integer"))),
    };

    usize::try_from(value)
        .map_err(|_| DbError::operation(None, format!("{name} must not be negative")))
}

fn sort_keys(operand: &Document) -> DbResult<Vec<Sort>> {
    operand.iter()
        .map(|(field, direction)| {
            let direction = match direction {
                Bson::Int32(1) | Bson::Int64(1) => SortDirection::Asc,
                Bson::Int32(-1) | Bson::Int64(-1) => SortDirection::Desc,
                Bson::Double(value) if *value == 1.0 => SortDirection::Asc,
                Bson::Double(value) if *value == -1.0 => SortDirection::Desc,
                _ => {
                    return Err(DbError::operation(
                        None,
                        format!("Invalid sort direction for {field}"),
                    ));
                }
            };

            Ok(Sort { field: field.clone(), direction })
        })
        .collect()
}

/// Sorts documents by `keys`, the first key taking precedence. The sort is stable.
pub fn sort_documents(documents: &mut [Document], keys: &[Sort]) {
    if keys.is_empty() {
        return;
    }

    documents.sort_by(|a, b| {
        for key in keys {
            let left = Comparable::from(get_path(a, &key.field));
            let right = Comparable::from(get_path(b, &key.field));

            let ordering = match key.direction {
                SortDirection::Asc => left.sort_cmp(&right),
                SortDirection::Desc => right.sort_cmp(&left),
            };

            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    });
}

fn included(value: &Bson) -> DbResult<bool> {
    match value {
        Bson::Boolean(value) => Ok(*value),
        Bson::Int32(value) => Ok(*value != 0),
        Bson::Int64(value) => Ok(*value != 0),
        Bson::Double(value) => Ok(*value != 0.0),
        _ => Err(DbError::operation(
            None,
            "Only field inclusion and exclusion are supported in projections",
        )),
    }
}

/// Applies an inclusion (`{ "name": 1 }`) or exclusion (`{ "notes": 0 }`) projection.
///
/// `_id` is kept unless the projection excludes it explicitly. Mixing inclusion and
/// exclusion of other fields is an error.
pub fn project(document: &Document, projection: &Document) -> DbResult<Document> {
    let mut keep_id = true;
    let mut inclusions = Vec::new();
    let mut exclusions = Vec::new();

    for (field, value) in projection {
        let include = included(value)?;

        if field == ID_FIELD {
            keep_id = include;
        } else if include {
            inclusions.push(field.as_str());
        } else {
            exclusions.push(field.as_str());
        }
    }

    if !inclusions.is_empty() && !exclusions.is_empty() {
        return Err(DbError::operation(
            None,
            "Cannot mix inclusion and exclusion in a projection",
        ));
    }

    if inclusions.is_empty() {
        let mut projected = document.clone();
        for field in exclusions {
            remove_path(&mut projected, field);
        }
        if !keep_id {
            projected.remove(ID_FIELD);
        }

        return Ok(projected);
    }

    let mut projected = Document::new();
    if keep_id && let Some(id) = document.get(ID_FIELD) {
        projected.insert(ID_FIELD, id.clone());
    }
    for field in inclusions {
        if let Some(value) = get_path(document, field) {
            set_path(&mut projected, field, value.clone());
        }
    }

    Ok(projected)
}

/// Writes `value` at a dotted `path`, creating intermediate documents as needed.
pub fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }

            if let Some(Bson::Document(child)) = document.get_mut(head) {
                set_path(child, rest, value);
            }
        }
    }
}

fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = document.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn samples() -> Vec<Document> {
        vec![
            doc! { "_id": 1, "test": "glucose", "price": 30, "meta": { "lab": "north" } },
            doc! { "_id": 2, "test": "lipid", "price": 120, "meta": { "lab": "south" } },
            doc! { "_id": 3, "test": "cbc", "price": 45, "meta": { "lab": "north" } },
            doc! { "_id": 4, "test": "hba1c" },
        ]
    }

    fn ids(documents: &[Document]) -> Vec<i32> {
        documents.iter().map(|d| d.get_i32("_id").unwrap()).collect()
    }

    #[test]
    fn match_sort_and_page() {
        let pipeline = vec![
            doc! { "$match": { "meta.lab": "north" } },
            doc! { "$sort": { "price": -1 } },
            doc! { "$limit": 1 },
        ];

        assert_eq!(ids(&run(samples(), &pipeline).unwrap()), vec![3]);

        let skipped = run(samples(), &[doc! { "$sort": { "price": 1 } }, doc! { "$skip": 2 }]).unwrap();
        assert_eq!(ids(&skipped), vec![3, 2]);
    }

    #[test]
    fn missing_sort_fields_come_first_ascending() {
        let mut documents = samples();
        sort_documents(&mut documents, &[Sort { field: "price".into(), direction: SortDirection::Asc }]);

        assert_eq!(ids(&documents), vec![4, 1, 3, 2]);
    }

    #[test]
    fn count_stage() {
        let counted = run(samples(), &[doc! { "$match": { "price": { "$gt": 40 } } }, doc! { "$count": "total" }]).unwrap();
        assert_eq!(counted, vec![doc! { "total": 2 }]);

        let none = run(samples(), &[doc! { "$match": { "price": 0 } }, doc! { "$count": "total" }]).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn projections() {
        let document = doc! { "_id": 9, "test": "cbc", "price": 45, "meta": { "lab": "north", "room": 2 } };

        assert_eq!(
            project(&document, &doc! { "test": 1, "meta.lab": 1 }).unwrap(),
            doc! { "_id": 9, "test": "cbc", "meta": { "lab": "north" } }
        );
        assert_eq!(
            project(&document, &doc! { "_id": 0, "price": 0, "meta.room": 0 }).unwrap(),
            doc! { "test": "cbc", "meta": { "lab": "north" } }
        );
        assert!(project(&document, &doc! { "test": 1, "price": 0 }).is_err());
        assert!(project(&document, &doc! { "label": "$test" }).is_err());
    }

    #[test]
    fn unsupported_stages_are_rejected() {
        let error = run(samples(), &[doc! { "$lookup": { "from": "Order" } }]).unwrap_err();

        assert_eq!(error, DbError::operation(None, "Unsupported pipeline stage: $lookup"));
    }

    #[test]
    fn set_path_creates_intermediate_documents() {
        let mut document = doc! { "status": "new" };
        set_path(&mut document, "result.value", Bson::Double(5.4));
        set_path(&mut document, "status", Bson::String("done".into()));

        assert_eq!(document, doc! { "status": "done", "result": { "value": 5.4 } });
    }
}
