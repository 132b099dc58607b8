//! Query expression evaluation for in-memory document filtering.
//!
//! This module provides the evaluation engine for filter expressions and the value ordering
//! used for sorting, following the store's comparison rules: comparisons only match values
//! of the same kind, while sorting orders values of different kinds by kind.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use labstore_core::{
    document::get_path,
    error::{DbError, DbResult},
    query::{Expr, FieldOp, QueryVisitor},
};

use crate::parse::parse_filter;


/// Type-erased, comparable representation of BSON values.
///
/// Int32 and Int64 share one integer variant and compare exactly. Integers and doubles
/// compare by numeric value, and NaN sorts below every other number.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null or missing value
    Null,
    /// Integer value (Int32 and Int64)
    Int(i64),
    /// Floating point value
    Double(f64),
    /// String value
    String(&'a str),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// ObjectId value
    ObjectId(ObjectId),
    /// Boolean value
    Bool(bool),
    /// DateTime value
    DateTime(DateTime),
    /// Types without a defined ordering
    Other,
}

impl<'a> Comparable<'a> {
    /// Position of the value's kind in the cross-kind sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Int(_) | Comparable::Double(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
            Comparable::Other => 8,
        }
    }

    /// Total order used for sorting: values of different kinds are ordered by kind.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        match self.partial_cmp(other) {
            Some(ordering) => ordering,
            None => self.rank().cmp(&other.rank()),
        }
    }

    fn is_nan(&self) -> bool {
        matches!(self, Comparable::Double(value) if value.is_nan())
    }
}

/// Total numeric order: exact between integers, NaN lowest and equal to itself.
fn cmp_numbers(left: &Comparable<'_>, right: &Comparable<'_>) -> Option<Ordering> {
    match (left, right) {
        (Comparable::Int(a), Comparable::Int(b)) => Some(a.cmp(b)),
        (Comparable::Double(a), Comparable::Double(b)) => Some(cmp_doubles(*a, *b)),
        (Comparable::Int(a), Comparable::Double(b)) => Some(cmp_int_double(*a, *b)),
        (Comparable::Double(a), Comparable::Int(b)) => Some(cmp_int_double(*b, *a).reverse()),
        _ => None,
    }
}

fn cmp_doubles(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn cmp_int_double(int: i64, double: f64) -> Ordering {
    // 2^63, the first double above every i64.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;

    if double.is_nan() || double < -LIMIT {
        return Ordering::Greater;
    }
    if double >= LIMIT {
        return Ordering::Less;
    }

    let whole = double.trunc();
    match int.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(double - whole)).unwrap_or(Ordering::Equal),
        ordering => ordering,
    }
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Other,
        }
    }
}

impl<'a> From<Option<&'a Bson>> for Comparable<'a> {
    fn from(bson: Option<&'a Bson>) -> Self {
        bson.map(Comparable::from).unwrap_or(Comparable::Null)
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => cmp_numbers(self, other) == Some(Ordering::Equal),
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes().partial_cmp(&b.bytes()),
            _ => cmp_numbers(self, other),
        }
    }
}


/// Evaluates filter expressions against a single document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DbResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns `true` if `document` satisfies `expr`.
    pub fn matches(document: &Document, expr: &Expr) -> DbResult<bool> {
        DocumentEvaluator::new(document).evaluate(expr)
    }

    fn matches_any(field_value: &Bson, value: &Bson) -> bool {
        let candidates = match value {
            Bson::Array(values) => values.iter().collect::<Vec<_>>(),
            single => vec![single],
        };

        candidates
            .into_iter()
            .any(|candidate| Self::equals(Some(field_value), candidate))
    }

    /// Equality as the store applies it: an array field matches when any element equals
    /// the value, and a missing field equals null.
    fn equals(field_value: Option<&Bson>, value: &Bson) -> bool {
        let left = Comparable::from(field_value);
        let right = Comparable::from(value);

        if left == right {
            return true;
        }

        match (&left, &right) {
            (Comparable::Array(items), right) if !matches!(right, Comparable::Array(_)) => {
                items.iter().any(|item| item == right)
            }
            _ => false,
        }
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DbError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(get_path(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = get_path(self.document, field) else {
            // A missing field only satisfies negative operators and equality with null.
            return Ok(match op {
                FieldOp::Eq => matches!(value, Bson::Null),
                FieldOp::Ne => !matches!(value, Bson::Null),
                FieldOp::NotContains => true,
                FieldOp::NoneOf => !Self::matches_any(&Bson::Null, value),
                _ => false,
            });
        };

        match op {
            FieldOp::Eq => Ok(Self::equals(Some(field_value), value)),
            FieldOp::Ne => Ok(!Self::equals(Some(field_value), value)),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                let left = Comparable::from(field_value);
                let right = Comparable::from(value);

                // NaN only compares with NaN.
                if left.is_nan() != right.is_nan() {
                    return Ok(false);
                }

                match left.partial_cmp(&right) {
                    Some(ordering) => Ok(match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        FieldOp::Lte => ordering != Ordering::Greater,
                        _ => unreachable!(),
                    }),
                    None => Ok(false),
                }
            },
            FieldOp::Contains | FieldOp::NotContains => {
                let contains = match (Comparable::from(field_value), Comparable::from(value)) {
                    (Comparable::Array(array), needle) => array.iter().any(|item| item == &needle),
                    (Comparable::String(left), Comparable::String(right)) => {
                        left.to_lowercase().contains(&right.to_lowercase())
                    }
                    _ => false,
                };

                Ok(contains == matches!(op, FieldOp::Contains))
            },
            FieldOp::StartsWith => match (Comparable::from(field_value), Comparable::from(value)) {
                (Comparable::String(left), Comparable::String(right)) => {
                    Ok(left.to_lowercase().starts_with(&right.to_lowercase()))
                }
                _ => Ok(false),
            },
            FieldOp::EndsWith => match (Comparable::from(field_value), Comparable::from(value)) {
                (Comparable::String(left), Comparable::String(right)) => {
                    Ok(left.to_lowercase().ends_with(&right.to_lowercase()))
                }
                _ => Ok(false),
            },
            FieldOp::AnyOf => Ok(Self::matches_any(field_value, value)),
            FieldOp::NoneOf => Ok(!Self::matches_any(field_value, value)),
        }
    }

    fn visit_raw(&mut self, document: &Document) -> Result<Self::Output, Self::Error> {
        self.visit_expr(&parse_filter(document)?)
    }
}
