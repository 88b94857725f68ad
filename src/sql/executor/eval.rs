use crate::{
    error::{Error, Result},
    sql::{
        plan::Expr,
        types::{ops, Value},
    },
    storage::Table,
};

/// Evaluates an expression over a whole batch, one value per row.
/// Literals broadcast to the batch length.
pub fn evaluate(expr: &Expr, batch: &Table) -> Result<Vec<Value>> {
    Ok(match expr {
        Expr::Literal(value) => vec![value.clone(); batch.num_rows()],
        Expr::Column { index, name, .. } => batch
            .column(*index)
            .ok_or_else(|| Error::Internal(format!("column {} ({}) is out of range", index, name)))?
            .iter()
            .collect(),
        Expr::Binary { op, left, right, .. } => {
            let left = evaluate(left, batch)?;
            let right = evaluate(right, batch)?;
            left.iter()
                .zip(right.iter())
                .map(|(l, r)| ops::apply_binary(op, l, r))
                .collect::<Result<_>>()?
        }
        Expr::Unary { op, expr, .. } => evaluate(expr, batch)?
            .iter()
            .map(|v| ops::apply_unary(op, v))
            .collect::<Result<_>>()?,
        Expr::IsNull { expr, negated } => evaluate(expr, batch)?
            .into_iter()
            .map(|v| Value::Boolean(v.is_null() != *negated))
            .collect(),
    })
}
