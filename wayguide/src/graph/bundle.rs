//! JSON route bundles: a graph plus the link sequence of one route.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::GraphError;
use super::network::RouteGraph;
use super::poi::Poi;
use super::types::{LinkId, LinkRecord, Node};

/// Errors loading a bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Failed to read bundle {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid bundle JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid graph: {0}")]
    Graph(#[from] GraphError),
}

/// Serialized graph and route.
///
/// ```json
/// {
///   "nodes": [{"id": "n1", "location": {"lat": 35.0, "lng": 139.0}}],
///   "links": [{"id": "l1", "source_node": "n1", "target_node": "n2"}],
///   "pois": [],
///   "route": ["l1"]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteBundle {
    pub nodes: Vec<Node>,
    pub links: Vec<LinkRecord>,
    #[serde(default)]
    pub pois: Vec<Poi>,
    #[serde(default)]
    pub route: Vec<LinkId>,
}

impl RouteBundle {
    pub fn from_json_str(s: &str) -> Result<Self, BundleError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BundleError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Build the graph; the route ids are returned unresolved.
    pub fn into_graph(self) -> Result<(RouteGraph, Vec<LinkId>), BundleError> {
        let graph = RouteGraph::build(self.nodes, self.links, self.pois)?;
        Ok((graph, self.route))
    }
}
