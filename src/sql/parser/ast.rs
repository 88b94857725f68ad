use std::fmt::Display;

/// Abstract Syntax Tree (AST) node definitions for SQL statements
#[derive(Debug, PartialEq)]
pub enum Statement {
    /// SELECT statement
    Select {
        /// Select list items with optional aliases (e.g., 1 + 2 AS three)
        select: Vec<SelectItem>,
        from: Option<TableName>,
        where_clause: Option<Expression>,
        limit: Option<Expression>,
    },
}

/// One item of the select list
#[derive(Debug, PartialEq)]
pub enum SelectItem {
    /// `*`, every field of the source table
    Wildcard,
    Expression(Expression, Option<String>),
}

/// Table reference in a FROM clause, e.g. `my_project:my_dataset.my_table`
#[derive(Debug, PartialEq, Clone)]
pub struct TableName {
    pub project: Option<String>,
    pub dataset: Option<String>,
    pub table: String,
}

impl Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(project) = &self.project {
            write!(f, "{}:", project)?;
        }
        if let Some(dataset) = &self.dataset {
            write!(f, "{}.", dataset)?;
        }
        write!(f, "{}", self.table)
    }
}

/// Expression types (field refs, constants, operations)
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// Field reference, optionally qualified (`t.foo`, `dataset.t.foo`)
    Field {
        qualifier: Vec<String>,
        name: String,
    },
    /// Constant value
    Consts(Consts),
    /// Binary operation, e.g. `a + 1` or `a AND b`
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Unary operation, e.g. `-a` or `NOT b`
    Unary {
        op: UnaryOperator,
        expr: Box<Expression>,
    },
    /// `expr IS [NOT] NULL`
    IsNull {
        expr: Box<Expression>,
        negated: bool,
    },
}

impl Expression {
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field {
            qualifier: Vec::new(),
            name: name.into(),
        }
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// Implements From trait to convert Consts into Expression
impl From<Consts> for Expression {
    fn from(value: Consts) -> Self {
        Self::Consts(value)
    }
}

/// Constant values in SQL expressions
#[derive(Debug, PartialEq, Clone)]
pub enum Consts {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Body of a `TIMESTAMP '...'` literal, validated by the parser
    Timestamp(String),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
}

impl BinaryOperator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::LessThan
                | Self::LessThanOrEqual
                | Self::GreaterThan
                | Self::GreaterThanOrEqual
        )
    }
}

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::And => "AND",
            Self::Or => "OR",
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOperator {
    Minus,
    Plus,
    Not,
}

impl Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Minus => "-",
            Self::Plus => "+",
            Self::Not => "NOT",
        })
    }
}
