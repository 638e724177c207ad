//! Workflow loading and step lookup
//!
//! A [`Workflow`] owns the immutable step tree plus an id→node index built
//! by a single pre-order traversal at load. The index is an explicit owned
//! value, so several independent workflows can live in one process.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::{Error, Result};

use super::definition::{WorkflowDefinition, WorkflowNode};

/// A loaded, indexed workflow. Never mutated after load.
#[derive(Debug)]
pub struct Workflow {
    name: Option<String>,
    root: Arc<WorkflowNode>,
    index: HashMap<String, Arc<WorkflowNode>>,
}

impl Workflow {
    /// Load a workflow definition from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Definition(format!("failed to read workflow file: {}", e)))?;
        Self::parse(&content)
    }

    /// Parse a workflow definition from a JSON string.
    pub fn parse(content: &str) -> Result<Self> {
        let definition: WorkflowDefinition = serde_json::from_str(content)
            .map_err(|e| Error::Definition(format!("failed to parse workflow: {}", e)))?;
        Self::from_definition(definition)
    }

    /// Type the raw tree and build the step index.
    ///
    /// Duplicate ids are rejected here: silently overwriting an index entry
    /// would redirect jump targets and reply resumption to whichever node
    /// happened to load last.
    pub fn from_definition(definition: WorkflowDefinition) -> Result<Self> {
        let WorkflowDefinition { name, tree } = definition;
        let root = Arc::new(WorkflowNode::from_raw(tree)?);

        let mut index = HashMap::new();
        let mut stack = vec![Arc::clone(&root)];
        while let Some(node) = stack.pop() {
            if index.insert(node.id.clone(), Arc::clone(&node)).is_some() {
                return Err(Error::Definition(format!(
                    "duplicate step id: {}",
                    node.id
                )));
            }
            for child in node.children.iter().rev() {
                stack.push(Arc::clone(child));
            }
        }

        Ok(Workflow { name, root, index })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The root container node (not itself executable).
    pub fn root(&self) -> &WorkflowNode {
        &self.root
    }

    /// The first executable step: the root's first child.
    pub fn entry(&self) -> Option<&WorkflowNode> {
        self.root.first_child()
    }

    /// Look a step up by id.
    pub fn lookup(&self, id: &str) -> Option<&WorkflowNode> {
        self.index.get(id).map(|n| n.as_ref())
    }

    /// Number of indexed steps.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
