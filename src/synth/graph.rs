//! Resource dependency graph of a stack.

use crate::error::{AcustackError, Result};
use crate::synth::stack::Stack;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

// `${Name}` or `${Name.Attribute}` inside Fn::Sub; pseudo parameters contain `::` and never match
static SUB_REFERENCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9]+)(?:\.[A-Za-z0-9.]+)?\}").expect("Invalid Fn::Sub regex")
});

/// Graph node representing a resource or parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub node_type: GraphNodeType,
}

/// Type of graph node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GraphNodeType {
    Resource,
    Parameter,
}

/// Graph edge pointing from a resource to what it needs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub edge_type: GraphEdgeType,
}

/// Type of graph edge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GraphEdgeType {
    /// Explicit ordering annotation without a data flow
    DependsOn,
    /// `Ref`, `Fn::GetAtt` or `Fn::Sub` usage
    Reference,
}

/// Graph statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub resource_count: usize,
    pub parameter_count: usize,
    pub depends_on_count: usize,
    pub max_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl ResourceGraph {
    pub fn from_stack(stack: &Stack) -> Self {
        let mut nodes = Vec::new();
        let mut known: HashSet<&str> = HashSet::new();

        for (id, parameter) in stack.parameters() {
            known.insert(id);
            nodes.push(GraphNode {
                id: id.to_string(),
                label: parameter.parameter_type.clone(),
                node_type: GraphNodeType::Parameter,
            });
        }
        for (id, resource) in stack.resources() {
            known.insert(id);
            nodes.push(GraphNode {
                id: id.to_string(),
                label: resource.resource_type.clone(),
                node_type: GraphNodeType::Resource,
            });
        }

        let mut edges = Vec::new();
        for (id, resource) in stack.resources() {
            for target in &resource.depends_on {
                edges.push(GraphEdge {
                    from: id.to_string(),
                    to: target.clone(),
                    edge_type: GraphEdgeType::DependsOn,
                });
            }

            let mut refs = Vec::new();
            for value in resource.properties.values() {
                collect_references(value, &mut refs);
            }
            refs.sort();
            refs.dedup();
            for target in refs {
                if target != id && known.contains(target.as_str()) {
                    edges.push(GraphEdge {
                        from: id.to_string(),
                        to: target,
                        edge_type: GraphEdgeType::Reference,
                    });
                }
            }
        }

        Self { nodes, edges }
    }

    /// Every edge must end at a node of the graph.
    pub fn validate(&self, stack_name: &str) -> Result<()> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        match self.edges.iter().find(|e| !ids.contains(e.to.as_str())) {
            Some(edge) => Err(AcustackError::DanglingDependency {
                stack: stack_name.to_string(),
                from: edge.from.clone(),
                to: edge.to.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn has_edge(&self, from: &str, to: &str, edge_type: GraphEdgeType) -> bool {
        self.edges
            .iter()
            .any(|e| e.from == from && e.to == to && e.edge_type == edge_type)
    }

    /// Explicit ordering edges only.
    pub fn explicit_dependencies(&self) -> Vec<&GraphEdge> {
        self.edges
            .iter()
            .filter(|e| e.edge_type == GraphEdgeType::DependsOn)
            .collect()
    }

    pub fn statistics(&self) -> GraphStatistics {
        let resource_count = self
            .nodes
            .iter()
            .filter(|n| n.node_type == GraphNodeType::Resource)
            .count();

        GraphStatistics {
            total_nodes: self.nodes.len(),
            total_edges: self.edges.len(),
            resource_count,
            parameter_count: self.nodes.len() - resource_count,
            depends_on_count: self.explicit_dependencies().len(),
            max_depth: self.max_depth(),
        }
    }

    /// Render in Graphviz DOT format. Explicit dependencies are dashed.
    pub fn to_dot(&self, name: &str) -> String {
        let mut dot = format!("digraph \"{}\" {{\n  rankdir = \"RL\";\n", name);
        for node in &self.nodes {
            let shape = match node.node_type {
                GraphNodeType::Resource => "box",
                GraphNodeType::Parameter => "note",
            };
            dot.push_str(&format!(
                "  \"{}\" [label = \"{}\\n{}\", shape = \"{}\"];\n",
                node.id, node.id, node.label, shape
            ));
        }
        for edge in &self.edges {
            let style = match edge.edge_type {
                GraphEdgeType::DependsOn => " [style = \"dashed\", label = \"depends_on\"]",
                GraphEdgeType::Reference => "",
            };
            dot.push_str(&format!("  \"{}\" -> \"{}\"{};\n", edge.from, edge.to, style));
        }
        dot.push_str("}\n");
        dot
    }

    /// Longest chain of edges starting from a node nothing points at.
    fn max_depth(&self) -> usize {
        let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut has_incoming: HashSet<&str> = HashSet::new();
        for edge in &self.edges {
            adj.entry(&edge.from).or_default().push(&edge.to);
            has_incoming.insert(&edge.to);
        }

        let roots: Vec<&str> = self
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| !has_incoming.contains(id))
            .collect();

        let mut max_depth = 0;
        let mut visited: HashMap<&str, usize> = HashMap::new();

        for root in roots {
            let mut queue = vec![(root, 0usize)];
            while let Some((node, depth)) = queue.pop() {
                if let Some(&prev_depth) = visited.get(node) {
                    if prev_depth >= depth {
                        continue;
                    }
                }
                // Guards against cycles, which CloudFormation rejects anyway
                if depth > self.nodes.len() {
                    continue;
                }
                visited.insert(node, depth);
                max_depth = max_depth.max(depth);

                if let Some(neighbors) = adj.get(node) {
                    for neighbor in neighbors {
                        queue.push((*neighbor, depth + 1));
                    }
                }
            }
        }

        max_depth
    }
}

/// Collect logical IDs referenced by `Ref`, `Fn::GetAtt` and `Fn::Sub`.
fn collect_references(value: &Value, refs: &mut Vec<String>) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(target)) = obj.get("Ref") {
                refs.push(target.clone());
            }
            if let Some(Value::Array(args)) = obj.get("Fn::GetAtt") {
                if let Some(Value::String(target)) = args.first() {
                    refs.push(target.clone());
                }
            }
            if let Some(template) = obj.get("Fn::Sub") {
                let text = match template {
                    Value::String(s) => Some(s.as_str()),
                    Value::Array(parts) => parts.first().and_then(|p| p.as_str()),
                    _ => None,
                };
                if let Some(text) = text {
                    for captures in SUB_REFERENCE_REGEX.captures_iter(text) {
                        refs.push(captures[1].to_string());
                    }
                }
            }
            for v in obj.values() {
                collect_references(v, refs);
            }
        }
        Value::Array(arr) => {
            for item in arr {
                collect_references(item, refs);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::model::{intrinsic, Environment, Parameter, Resource};
    use serde_json::json;

    fn sample_stack() -> Stack {
        let mut stack = Stack::new("Sample", Environment::new("1", "us-east-1"));
        stack
            .add_parameter(
                "Image",
                Parameter {
                    parameter_type: "String".to_string(),
                    default: None,
                    description: None,
                },
            )
            .unwrap();
        let sg = stack
            .add_resource("Sg", Resource::new("AWS::EC2::SecurityGroup"))
            .unwrap();
        stack
            .add_resource("Secret", Resource::new("AWS::SecretsManager::Secret"))
            .unwrap();
        let db = stack
            .add_resource(
                "Db",
                Resource::new("AWS::RDS::DBInstance")
                    .with("VPCSecurityGroups", json!([sg.get_att("GroupId")]))
                    .with(
                        "MasterUsername",
                        intrinsic::sub("{{resolve:secretsmanager:${Secret}:SecretString:username::}}"),
                    ),
            )
            .unwrap();
        let vm = stack
            .add_resource(
                "Vm",
                Resource::new("AWS::EC2::Instance")
                    .with("ImageId", intrinsic::reference("Image"))
                    .with("Region", intrinsic::reference("AWS::Region")),
            )
            .unwrap();
        stack.add_dependency(&vm, &db).unwrap();
        stack
    }

    #[test]
    fn test_edges_from_intrinsics() {
        let graph = sample_stack().graph();
        assert!(graph.has_edge("Db", "Sg", GraphEdgeType::Reference));
        assert!(graph.has_edge("Db", "Secret", GraphEdgeType::Reference));
        assert!(graph.has_edge("Vm", "Image", GraphEdgeType::Reference));
        assert!(graph.has_edge("Vm", "Db", GraphEdgeType::DependsOn));
        // pseudo parameters are not nodes
        assert!(!graph.edges.iter().any(|e| e.to.starts_with("AWS")));
    }

    #[test]
    fn test_statistics() {
        let stats = sample_stack().graph().statistics();
        assert_eq!(stats.resource_count, 4);
        assert_eq!(stats.parameter_count, 1);
        assert_eq!(stats.depends_on_count, 1);
        // Vm -> Db -> Sg
        assert_eq!(stats.max_depth, 2);
    }

    #[test]
    fn test_sub_regex_ignores_pseudo_parameters() {
        let mut refs = Vec::new();
        collect_references(
            &intrinsic::sub("arn:${AWS::Partition}:ssm:${AWS::Region}:${AWS::AccountId}:parameter/${Param}"),
            &mut refs,
        );
        assert_eq!(refs, vec!["Param".to_string()]);

        let mut refs = Vec::new();
        collect_references(&intrinsic::sub("${KeyPair.KeyPairId}"), &mut refs);
        assert_eq!(refs, vec!["KeyPair".to_string()]);
    }

    #[test]
    fn test_to_dot() {
        let dot = sample_stack().graph().to_dot("Sample");
        assert!(dot.starts_with("digraph \"Sample\""));
        assert!(dot.contains("\"Vm\" -> \"Db\" [style = \"dashed\""));
        assert!(dot.contains("\"Db\" -> \"Sg\";"));
    }
}
