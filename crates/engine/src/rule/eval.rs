// Rule evaluator - evaluates a parsed rule against one row

use std::cmp::Ordering;

use chrono::{Duration, NaiveDate};
use tally_core::{Record, Value};

use super::parser::{Expr, Op};
use crate::error::RuleError;

/// Evaluate `expr` against a row. `lookup` returns the value of a column, or
/// `None` when the row has no such column.
pub fn eval<F>(expr: &Expr, lookup: &F) -> Result<Value, RuleError>
where
    F: Fn(&str) -> Option<Value>,
{
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Text(s) => Ok(Value::Text(s.clone())),
        Expr::Boolean(b) => Ok(Value::Bool(*b)),
        Expr::Column(name) => lookup(name).ok_or_else(|| RuleError::UnknownColumn(name.clone())),
        Expr::List(_) => Err(RuleError::Eval("a value list is only valid after IN".to_string())),
        Expr::Negate(inner) => match eval(inner, lookup)? {
            Value::Empty => Ok(Value::Empty),
            Value::Number(n) => Ok(Value::Number(-n)),
            other => Err(RuleError::Eval(format!("cannot negate {}", type_name(&other)))),
        },
        Expr::Not(inner) => Ok(Value::Bool(!eval(inner, lookup)?.is_truthy())),
        Expr::BinaryOp { op, left, right } => match op {
            Op::And => {
                if !eval(left, lookup)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(eval(right, lookup)?.is_truthy()))
            }
            Op::Or => {
                if eval(left, lookup)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(eval(right, lookup)?.is_truthy()))
            }
            Op::In | Op::NotIn => {
                let needle = eval(left, lookup)?;
                let found = match right.as_ref() {
                    Expr::List(items) => {
                        let mut found = false;
                        for item in items {
                            if values_equal(&needle, &eval(item, lookup)?) {
                                found = true;
                                break;
                            }
                        }
                        found
                    }
                    single => values_equal(&needle, &eval(single, lookup)?),
                };
                Ok(Value::Bool(if *op == Op::In { found } else { !found }))
            }
            Op::Eq | Op::NotEq | Op::Lt | Op::Gt | Op::LtEq | Op::GtEq => {
                let l = eval(left, lookup)?;
                let r = eval(right, lookup)?;
                compare(*op, &l, &r)
            }
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod => {
                let l = eval(left, lookup)?;
                let r = eval(right, lookup)?;
                arithmetic(*op, l, r)
            }
        },
    }
}

impl Expr {
    pub fn eval<F>(&self, lookup: &F) -> Result<Value, RuleError>
    where
        F: Fn(&str) -> Option<Value>,
    {
        eval(self, lookup)
    }

    /// Evaluate as a condition.
    pub fn test<F>(&self, lookup: &F) -> Result<bool, RuleError>
    where
        F: Fn(&str) -> Option<Value>,
    {
        Ok(eval(self, lookup)?.is_truthy())
    }

    pub fn eval_record(&self, record: &Record) -> Result<Value, RuleError> {
        eval(self, &|column: &str| record.get(column))
    }

    pub fn test_record(&self, record: &Record) -> Result<bool, RuleError> {
        Ok(self.eval_record(record)?.is_truthy())
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Empty => "empty",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::Date(_) => "date",
        Value::Text(_) => "text",
    }
}

// Missing values never compare equal, like NaN.
fn values_equal(l: &Value, r: &Value) -> bool {
    l.matches(r)
}

fn compare(op: Op, l: &Value, r: &Value) -> Result<Value, RuleError> {
    if l.is_empty() || r.is_empty() {
        return Ok(Value::Bool(op == Op::NotEq));
    }

    let ordering = match (l, r) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    };

    let result = match (op, ordering) {
        (Op::Eq, ord) => ord == Some(Ordering::Equal),
        (Op::NotEq, ord) => ord != Some(Ordering::Equal),
        (_, None) => {
            return Err(RuleError::Eval(format!(
                "cannot compare {} {} {}",
                type_name(l),
                op.symbol(),
                type_name(r)
            )))
        }
        (Op::Lt, Some(ord)) => ord == Ordering::Less,
        (Op::Gt, Some(ord)) => ord == Ordering::Greater,
        (Op::LtEq, Some(ord)) => ord != Ordering::Greater,
        (Op::GtEq, Some(ord)) => ord != Ordering::Less,
        _ => unreachable!("non-comparison operator passed to compare"),
    };

    Ok(Value::Bool(result))
}

fn arithmetic(op: Op, l: Value, r: Value) -> Result<Value, RuleError> {
    if l.is_empty() || r.is_empty() {
        return Ok(Value::Empty);
    }

    match (op, &l, &r) {
        (_, Value::Number(a), Value::Number(b)) => {
            let (a, b) = (*a, *b);
            let n = match op {
                Op::Add => a + b,
                Op::Sub => a - b,
                Op::Mul => a * b,
                Op::Div | Op::Mod if b == 0.0 => {
                    return Err(RuleError::Eval("division by zero".to_string()));
                }
                Op::Div => a / b,
                Op::Mod => a % b,
                _ => unreachable!("non-arithmetic operator passed to arithmetic"),
            };
            Ok(Value::Number(n))
        }
        (Op::Add, Value::Text(a), Value::Text(b)) => Ok(Value::Text(format!("{a}{b}"))),
        (Op::Add, Value::Date(d), Value::Number(days)) | (Op::Add, Value::Number(days), Value::Date(d)) => {
            shift_days(*d, *days)
        }
        (Op::Sub, Value::Date(d), Value::Number(days)) => shift_days(*d, -*days),
        (Op::Sub, Value::Date(a), Value::Date(b)) => Ok(Value::Number((*a - *b).num_days() as f64)),
        _ => Err(RuleError::Eval(format!(
            "cannot apply {} to {} and {}",
            op.symbol(),
            type_name(&l),
            type_name(&r)
        ))),
    }
}

/// `date` moved by a whole number of days (fractions truncate). Counts that
/// leave chrono's date range are an eval error.
fn shift_days(date: NaiveDate, days: f64) -> Result<Value, RuleError> {
    let out_of_range = || RuleError::Eval(format!("date out of range: {date} shifted by {days} days"));
    if !days.is_finite() || days.abs() > i32::MAX as f64 {
        return Err(out_of_range());
    }
    Duration::try_days(days as i64)
        .and_then(|delta| date.checked_add_signed(delta))
        .map(Value::Date)
        .ok_or_else(out_of_range)
}
