use crate::{
    error::Result,
    sql::{
        engine::Catalog,
        executor::Executor,
        parser::ast::{BinaryOperator, UnaryOperator},
        schema::Schema,
        types::{DataType, Value},
    },
    storage::{Table, TableRef},
};

mod planner;

pub use planner::Planner;

/// Typed expression with field references resolved to column positions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Column {
        index: usize,
        name: String,
        datatype: DataType,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
        datatype: DataType,
    },
    Unary {
        op: UnaryOperator,
        expr: Box<Expr>,
        datatype: DataType,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
}

impl Expr {
    /// Static type of the expression; `None` only for a bare NULL literal
    pub fn datatype(&self) -> Option<DataType> {
        match self {
            Expr::Literal(value) => value.datatype(),
            Expr::Column { datatype, .. }
            | Expr::Binary { datatype, .. }
            | Expr::Unary { datatype, .. } => Some(*datatype),
            Expr::IsNull { .. } => Some(DataType::Boolean),
        }
    }
}

/// Execution plan node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// One synthetic row with no fields, for queries without FROM
    SingleRow,
    /// Reads a table snapshot. `schema` is the schema the plan was built against.
    Scan { table: TableRef, schema: Schema },
    /// Keeps rows whose predicate evaluates to TRUE
    Filter { source: Box<Node>, predicate: Expr },
    Limit { source: Box<Node>, limit: usize },
    /// Evaluates the output expressions into the result schema
    Projection {
        source: Box<Node>,
        exprs: Vec<Expr>,
        schema: Schema,
    },
}

/// A planned query: the node tree plus its result schema
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub root: Node,
    pub schema: Schema,
}

impl Plan {
    /// Executes the plan against the catalog, producing the result table
    pub fn execute<C: Catalog + 'static>(self, catalog: &C) -> Result<Table> {
        <dyn Executor<C>>::build(self.root).execute(catalog)
    }
}
