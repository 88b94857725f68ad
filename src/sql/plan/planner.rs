use std::collections::HashSet;

use tracing::debug;

use crate::{
    error::{Error, Result},
    sql::{
        engine::Catalog,
        parser::ast::{self, Consts, SelectItem, TableName},
        plan::{Expr, Node, Plan},
        schema::{Field, Mode, Schema},
        types::{ops, DataType, Value},
    },
    storage::{DatasetRef, TableRef},
};

/// The FROM table as seen by name resolution
struct Source {
    table: TableRef,
    schema: Schema,
}

/// Query planner - resolves names against the catalog and converts the AST
/// into a typed plan
pub struct Planner<'a, C: Catalog> {
    catalog: &'a C,
    project_id: &'a str,
    default_dataset: Option<&'a DatasetRef>,
}

impl<'a, C: Catalog> Planner<'a, C> {
    pub fn new(catalog: &'a C, project_id: &'a str, default_dataset: Option<&'a DatasetRef>) -> Self {
        Self {
            catalog,
            project_id,
            default_dataset,
        }
    }

    /// Builds an execution plan from an AST statement
    pub fn build(&self, stmt: ast::Statement) -> Result<Plan> {
        let ast::Statement::Select {
            select,
            from,
            where_clause,
            limit,
        } = stmt;

        let (mut node, source) = match from {
            Some(name) => {
                let table = self.resolve_table(&name)?;
                let schema = self.catalog.get_schema(&table)?;
                let node = Node::Scan {
                    table: table.clone(),
                    schema: schema.clone(),
                };
                (node, Some(Source { table, schema }))
            }
            None => (Node::SingleRow, None),
        };

        // WHERE
        if let Some(expr) = where_clause {
            let predicate = self.build_expression(expr, source.as_ref())?;
            match predicate.datatype() {
                None | Some(DataType::Boolean) => {}
                Some(t) => {
                    return Err(Error::Type(format!(
                        "WHERE clause must be BOOLEAN, got {}",
                        t
                    )));
                }
            }
            node = Node::Filter {
                source: Box::new(node),
                predicate,
            };
        }

        // LIMIT
        if let Some(expr) = limit {
            node = Node::Limit {
                source: Box::new(node),
                limit: match expr {
                    ast::Expression::Consts(Consts::Integer(i)) if i >= 0 => i as usize,
                    _ => {
                        return Err(Error::Syntax(
                            "LIMIT expects a non-negative integer literal".into(),
                        ));
                    }
                },
            };
        }

        // projection
        let (exprs, schema) = self.build_projection(select, source.as_ref())?;
        debug!(fields = schema.len(), "planned query");
        Ok(Plan {
            root: Node::Projection {
                source: Box::new(node),
                exprs,
                schema: schema.clone(),
            },
            schema,
        })
    }

    /// Resolves a FROM table name to a full table reference
    fn resolve_table(&self, name: &TableName) -> Result<TableRef> {
        match (&name.project, &name.dataset) {
            (Some(project), Some(dataset)) => Ok(TableRef::new(project, dataset, &name.table)),
            (None, Some(dataset)) => Ok(TableRef::new(self.project_id, dataset, &name.table)),
            (None, None) => match self.default_dataset {
                Some(dataset) => Ok(dataset.table(&name.table)),
                None => Err(Error::Name(format!(
                    "table name {} missing dataset while no default dataset is set",
                    name
                ))),
            },
            (Some(_), None) => Err(Error::Syntax(format!("invalid table name {}", name))),
        }
    }

    /// Plans the select list and derives the result schema
    fn build_projection(
        &self,
        select: Vec<SelectItem>,
        source: Option<&Source>,
    ) -> Result<(Vec<Expr>, Schema)> {
        let mut exprs = Vec::new();
        let mut fields = Vec::new();
        let mut unnamed = 0;

        for item in select {
            match item {
                SelectItem::Wildcard => {
                    let source = source
                        .ok_or_else(|| Error::Syntax("SELECT * requires a FROM clause".into()))?;
                    for (index, field) in source.schema.fields.iter().enumerate() {
                        exprs.push(Expr::Column {
                            index,
                            name: field.name.clone(),
                            datatype: field.datatype,
                        });
                        fields.push(field.clone());
                    }
                }
                SelectItem::Expression(expr, alias) => {
                    let is_field = matches!(expr, ast::Expression::Field { .. });
                    let planned = self.build_expression(expr, source)?;
                    let name = match (alias, &planned) {
                        (Some(alias), _) => alias,
                        (None, Expr::Column { name, .. }) if is_field => name.clone(),
                        (None, _) => {
                            let name = format!("f{}_", unnamed);
                            unnamed += 1;
                            name
                        }
                    };
                    let mode = match (&planned, source) {
                        (Expr::Column { index, .. }, Some(source)) => source.schema.fields[*index].mode,
                        (Expr::Literal(value), _) if !value.is_null() => Mode::Required,
                        _ => Mode::Nullable,
                    };
                    fields.push(Field {
                        name,
                        datatype: planned.datatype().unwrap_or(DataType::Integer),
                        mode,
                    });
                    exprs.push(planned);
                }
            }
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::Name(format!("duplicate column name {} in result", field.name)));
            }
        }
        Ok((exprs, Schema::new(fields)))
    }

    /// Resolves and type-checks an expression
    fn build_expression(&self, expr: ast::Expression, source: Option<&Source>) -> Result<Expr> {
        Ok(match expr {
            ast::Expression::Consts(c) => Expr::Literal(literal(c)?),
            ast::Expression::Field { qualifier, name } => {
                let source = source.ok_or_else(|| {
                    Error::Name(format!("unrecognized name {} in a query without FROM", name))
                })?;
                if !qualifier_matches(&qualifier, &source.table) {
                    return Err(Error::Name(format!(
                        "unrecognized name {}.{}",
                        qualifier.join("."),
                        name
                    )));
                }
                let index = source
                    .schema
                    .get_field_index(&name)
                    .ok_or_else(|| Error::Name(format!("unrecognized name {}", name)))?;
                Expr::Column {
                    index,
                    datatype: source.schema.fields[index].datatype,
                    name,
                }
            }
            ast::Expression::Binary { op, left, right } => {
                let left = self.build_expression(*left, source)?;
                let right = self.build_expression(*right, source)?;
                let datatype = ops::result_type_of(&op, left.datatype(), right.datatype())?;
                Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    datatype,
                }
            }
            ast::Expression::Unary { op, expr } => {
                let expr = self.build_expression(*expr, source)?;
                let datatype = ops::unary_result_type(&op, expr.datatype())?;
                Expr::Unary {
                    op,
                    expr: Box::new(expr),
                    datatype,
                }
            }
            ast::Expression::IsNull { expr, negated } => Expr::IsNull {
                expr: Box::new(self.build_expression(*expr, source)?),
                negated,
            },
        })
    }
}

fn literal(c: Consts) -> Result<Value> {
    Ok(match c {
        Consts::Null => Value::Null,
        Consts::Boolean(b) => Value::Boolean(b),
        Consts::Integer(i) => Value::Integer(i),
        Consts::Float(f) => Value::Float(f),
        Consts::String(s) => Value::String(s),
        Consts::Timestamp(s) => Value::Timestamp(
            Value::parse_timestamp(&s)
                .ok_or_else(|| Error::Syntax(format!("invalid timestamp literal '{}'", s)))?,
        ),
    })
}

/// `t.f`, `d.t.f` and `p.d.t.f` must name the FROM table
fn qualifier_matches(qualifier: &[String], table: &TableRef) -> bool {
    match qualifier {
        [] => true,
        [t] => *t == table.table_id,
        [d, t] => *d == table.dataset_id && *t == table.table_id,
        [p, d, t] => *p == table.project_id && *d == table.dataset_id && *t == table.table_id,
        _ => false,
    }
}
