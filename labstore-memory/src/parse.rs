//! Parsing of native filter documents into filter expressions.
//!
//! Filters written in the store's query syntax (`{ "age": { "$gte": 18 } }`) are turned into
//! [`Expr`] trees so the evaluator can apply them. Supported operators:
//! `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists`, `$not`, `$all` on
//! fields, and `$and`, `$or`, `$nor` at the top level. Anything else is rejected with an
//! operation error.

use bson::{Bson, Document};

use labstore_core::{
    error::{DbError, DbResult},
    query::{Expr, FieldOp},
};

/// Parses a filter document. An empty document matches everything.
pub fn parse_filter(document: &Document) -> DbResult<Expr> {
    let mut exprs = document
        .iter()
        .map(|(key, value)| parse_entry(key, value))
        .collect::<DbResult<Vec<_>>>()?;

    Ok(match exprs.len() {
        1 => exprs.remove(0),
        _ => Expr::And(exprs),
    })
}

fn parse_entry(key: &str, value: &Bson) -> DbResult<Expr> {
    match key {
        "$and" => Ok(Expr::And(parse_clauses(key, value)?)),
        "$or" => Ok(Expr::Or(parse_clauses(key, value)?)),
        "$nor" => Ok(Expr::Or(parse_clauses(key, value)?).not()),
        operator if operator.starts_with('$') => Err(unsupported(operator)),
        field => parse_condition(field, value),
    }
}

fn parse_clauses(operator: &str, value: &Bson) -> DbResult<Vec<Expr>> {
    let Bson::Array(clauses) = value else {
        return Err(DbError::operation(None, format!("{operator} must be an array")));
    };

    clauses
        .iter()
        .map(|clause| match clause {
            Bson::Document(document) => parse_filter(document),
            _ => Err(DbError::operation(None, format!("{operator} entries must be documents"))),
        })
        .collect()
}

fn is_operator_document(value: &Bson) -> bool {
    matches!(value, Bson::Document(document) if document.keys().next().is_some_and(|key| key.starts_with('$')))
}

fn parse_condition(field: &str, value: &Bson) -> DbResult<Expr> {
    let Bson::Document(operators) = value else {
        return Ok(Expr::field(field.to_string(), FieldOp::Eq, value.clone()));
    };

    if !is_operator_document(value) {
        return Ok(Expr::field(field.to_string(), FieldOp::Eq, value.clone()));
    }

    let mut exprs = operators
        .iter()
        .map(|(operator, operand)| parse_operator(field, operator, operand))
        .collect::<DbResult<Vec<_>>>()?;

    Ok(match exprs.len() {
        1 => exprs.remove(0),
        _ => Expr::And(exprs),
    })
}

fn parse_operator(field: &str, operator: &str, operand: &Bson) -> DbResult<Expr> {
    let compare = |op: FieldOp| Ok(Expr::field(field.to_string(), op, operand.clone()));

    match operator {
        "$eq" => compare(FieldOp::Eq),
        "$ne" => compare(FieldOp::Ne),
        "$gt" => compare(FieldOp::Gt),
        "$gte" => compare(FieldOp::Gte),
        "$lt" => compare(FieldOp::Lt),
        "$lte" => compare(FieldOp::Lte),
        "$in" | "$nin" => {
            if !matches!(operand, Bson::Array(_)) {
                return Err(DbError::operation(None, format!("{operator} needs an array")));
            }

            compare(if operator == "$in" { FieldOp::AnyOf } else { FieldOp::NoneOf })
        }
        "$all" => match operand {
            Bson::Array(values) => Ok(Expr::And(
                values
                    .iter()
                    .map(|value| Expr::field(field.to_string(), FieldOp::Eq, value.clone()))
                    .collect(),
            )),
            _ => Err(DbError::operation(None, "$all needs an array")),
        },
        "$exists" => Ok(Expr::Exists(field.to_string(), truthy(operand))),
        "$not" if is_operator_document(operand) => Ok(parse_condition(field, operand)?.not()),
        "$not" => Err(DbError::operation(None, "$not needs an operator expression")),
        other => Err(unsupported(other)),
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(value) => *value,
        Bson::Int32(value) => *value != 0,
        Bson::Int64(value) => *value != 0,
        Bson::Double(value) => *value != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

fn unsupported(operator: &str) -> DbError {
    DbError::operation(None, format!("Unsupported query operator: {operator}"))
}

/// Collects the top-level equality conditions of `filter`.
///
/// These seed the document an upsert inserts when nothing matched, the way the store does.
pub fn equality_fields(filter: &Expr) -> DbResult<Document> {
    let mut seed = Document::new();
    collect_equalities(filter, &mut seed)?;

    Ok(seed)
}

fn collect_equalities(filter: &Expr, seed: &mut Document) -> DbResult<()> {
    match filter {
        Expr::And(exprs) => {
            for expr in exprs {
                collect_equalities(expr, seed)?;
            }
        }
        Expr::Field { field, op: FieldOp::Eq, value } if !field.contains('.') => {
            seed.insert(field.clone(), value.clone());
        }
        Expr::Raw(document) => collect_equalities(&parse_filter(document)?, seed)?,
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};
    use labstore_core::query::Filter;

    #[test]
    fn plain_values_are_equality() {
        assert_eq!(parse_filter(&doc! { "code": "CBC" }).unwrap(), Filter::eq("code", "CBC"));
        assert_eq!(parse_filter(&doc! {}).unwrap(), Filter::all());
    }

    #[test]
    fn embedded_documents_without_operators_are_equality() {
        let filter = parse_filter(&doc! { "address": { "city": "Hue" } }).unwrap();

        assert_eq!(filter, Filter::eq("address", doc! { "city": "Hue" }));
    }

    #[test]
    fn operator_documents_are_expanded() {
        let filter = parse_filter(&doc! { "price": { "$gte": 10, "$lt": 50 } }).unwrap();

        assert_eq!(filter, Expr::And(vec![Filter::gte("price", 10), Filter::lt("price", 50)]));
    }

    #[test]
    fn logical_operators() {
        let filter = parse_filter(&doc! {
            "$or": [{ "status": "new" }, { "status": { "$in": ["paid", "held"] } }],
        })
        .unwrap();

        assert_eq!(
            filter,
            Expr::Or(vec![
                Filter::eq("status", "new"),
                Filter::any_of("status", vec!["paid", "held"]),
            ])
        );

        let negated = parse_filter(&doc! { "price": { "$not": { "$gt": 5 } } }).unwrap();
        assert_eq!(negated, Filter::gt("price", 5).not());
    }

    #[test]
    fn unsupported_operators_are_operation_errors() {
        let error = parse_filter(&doc! { "name": { "$regex": "^A" } }).unwrap_err();
        assert!(matches!(error, DbError::Operation { .. }));

        assert!(parse_filter(&doc! { "$where": "true" }).is_err());
        assert!(parse_filter(&doc! { "tags": { "$in": "x" } }).is_err());
    }

    #[test]
    fn equality_fields_seed_upserts() {
        let id = ObjectId::new();
        let filter = Filter::id(id)
            .and(Filter::gt("stock", 0))
            .and(Filter::raw(doc! { "sku": "A-1", "meta.source": "import" }));

        assert_eq!(equality_fields(&filter).unwrap(), doc! { "_id": id, "sku": "A-1" });
    }
}
