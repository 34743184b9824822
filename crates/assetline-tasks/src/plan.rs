//! Static description of how a unit will run

use serde::Serialize;

/// Shape of a unit: a leaf task or a series/parallel composite
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlanNode {
    /// Single catalog task
    Task { name: String },
    /// Children run one after another
    Series {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        steps: Vec<PlanNode>,
    },
    /// Children run concurrently
    Parallel {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        members: Vec<PlanNode>,
    },
}

impl PlanNode {
    /// Leaf node
    pub fn task(name: impl Into<String>) -> Self {
        Self::Task { name: name.into() }
    }

    /// Name of the node, if it has one
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Task { name } => Some(name.as_str()),
            Self::Series { name, .. } | Self::Parallel { name, .. } => name.as_deref(),
        }
    }

    /// Every leaf task, depth first in declaration order
    pub fn tasks(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_tasks(&mut out);
        out
    }

    fn collect_tasks<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Task { name } => out.push(name.as_str()),
            Self::Series { steps: nodes, .. } | Self::Parallel { members: nodes, .. } => {
                for node in nodes {
                    node.collect_tasks(out);
                }
            }
        }
    }

    /// Whether a leaf task named `name` appears anywhere in the tree
    pub fn contains_task(&self, name: &str) -> bool {
        self.tasks().contains(&name)
    }

    /// Top-level stages of a series node; any other node is a single stage
    pub fn stages(&self) -> Vec<&PlanNode> {
        match self {
            Self::Series { steps, .. } => steps.iter().collect(),
            other => vec![other],
        }
    }

    /// Names of the direct members of a node (leaf names or composite names)
    pub fn member_names(&self) -> Vec<String> {
        let label = |node: &PlanNode| node.name().unwrap_or("<group>").to_string();
        match self {
            Self::Task { name } => vec![name.clone()],
            Self::Series { steps: nodes, .. } | Self::Parallel { members: nodes, .. } => {
                nodes.iter().map(label).collect()
            }
        }
    }

    /// Human-readable tree of the plan
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        match self {
            Self::Task { name } => {
                out.push_str(&format!("{}- {}\n", indent, name));
            }
            Self::Series { name, steps } => {
                out.push_str(&format!(
                    "{}{} (series, {} step{})\n",
                    indent,
                    name.as_deref().unwrap_or("series"),
                    steps.len(),
                    if steps.len() == 1 { "" } else { "s" }
                ));
                for step in steps {
                    step.render_into(out, depth + 1);
                }
            }
            Self::Parallel { name, members } => {
                out.push_str(&format!(
                    "{}{} (parallel, {} member{})\n",
                    indent,
                    name.as_deref().unwrap_or("parallel"),
                    members.len(),
                    if members.len() == 1 { "" } else { "s" }
                ));
                for member in members {
                    member.render_into(out, depth + 1);
                }
            }
        }
    }
}
