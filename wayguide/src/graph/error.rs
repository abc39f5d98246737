//! Errors raised while building a graph or resolving a route over it.

use thiserror::Error;

use super::{LinkId, NodeId};

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Structural problems in graph data or in a requested route.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// Two nodes share an identifier
    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// Two links share an identifier
    #[error("Duplicate link id: {0}")]
    DuplicateLink(LinkId),

    /// A link references a node that is not in the graph
    #[error("Link {link} references missing node {node}")]
    MissingNode { link: LinkId, node: NodeId },

    /// A route references a link that is not in the graph
    #[error("Unknown link in route: {0}")]
    UnknownLink(LinkId),

    /// The route contains no links
    #[error("Route is empty")]
    EmptyRoute,

    /// Consecutive route links do not share a node
    #[error("Route is disconnected at step {index}: link {link} does not continue from node {node}")]
    Disconnected {
        index: usize,
        link: LinkId,
        node: NodeId,
    },
}
