mod discover;
mod error;
mod graph;
mod impact;

pub use discover::ingest_docs;
pub use error::GraphError;
pub use graph::{
    DependencyGraph, DependencyKind, Relation, RelationType, ResourceNode,
};
pub use impact::{Complexity, Impact};
