use crate::{
    error::Result,
    sql::{
        engine::Catalog,
        executor::query::{Filter, Limit, Projection, Scan, SingleRow},
        plan::Node,
    },
    storage::Table,
};

mod eval;
mod query;

/// Query executor trait. Every executor consumes its source's output table
/// and produces a new one.
pub trait Executor<C: Catalog> {
    fn execute(self: Box<Self>, catalog: &C) -> Result<Table>;
}

/// Builds an executor from a plan node
///
/// The `'static` bound is required for trait object usage in recursive executor building.
impl<C: Catalog + 'static> dyn Executor<C> {
    pub fn build(node: Node) -> Box<dyn Executor<C>> {
        match node {
            Node::SingleRow => SingleRow::new(),
            Node::Scan { table, schema } => Scan::new(table, schema),
            Node::Filter { source, predicate } => Filter::new(Self::build(*source), predicate),
            Node::Limit { source, limit } => Limit::new(Self::build(*source), limit),
            Node::Projection {
                source,
                exprs,
                schema,
            } => Projection::new(Self::build(*source), exprs, schema),
        }
    }
}
