//! A deployable unit: resources, parameters and outputs for one environment.

use crate::error::{AcustackError, Result};
use crate::synth::graph::ResourceGraph;
use crate::synth::model::{Environment, LogicalId, Output, Parameter, Resource};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    env: Environment,
    description: Option<String>,
    parameters: BTreeMap<String, Parameter>,
    resources: BTreeMap<String, Resource>,
    outputs: BTreeMap<String, Output>,
    stack_dependencies: Vec<String>,
}

impl Stack {
    pub fn new(name: &str, env: Environment) -> Self {
        Self {
            name: name.to_string(),
            env,
            description: None,
            parameters: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
            stack_dependencies: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Add a resource under a sanitised logical ID.
    pub fn add_resource(&mut self, id: &str, resource: Resource) -> Result<LogicalId> {
        let logical_id = self.claim_id(id)?;
        self.resources
            .insert(logical_id.as_str().to_string(), resource);
        Ok(logical_id)
    }

    pub fn add_parameter(&mut self, id: &str, parameter: Parameter) -> Result<LogicalId> {
        let logical_id = self.claim_id(id)?;
        self.parameters
            .insert(logical_id.as_str().to_string(), parameter);
        Ok(logical_id)
    }

    pub fn add_output(&mut self, id: &str, output: Output) -> Result<LogicalId> {
        let logical_id = LogicalId::sanitize(id);
        if self.outputs.contains_key(logical_id.as_str()) {
            return Err(self.duplicate(logical_id));
        }
        self.outputs.insert(logical_id.as_str().to_string(), output);
        Ok(logical_id)
    }

    /// Declare that `from` must be created after `to`.
    ///
    /// The target is only checked when the template is rendered, so the
    /// order in which resources are added does not matter.
    pub fn add_dependency(&mut self, from: &LogicalId, to: &LogicalId) -> Result<()> {
        let stack = self.name.clone();
        let resource = self.resources.get_mut(from.as_str()).ok_or_else(|| {
            AcustackError::DanglingDependency {
                stack,
                from: from.to_string(),
                to: to.to_string(),
            }
        })?;
        if !resource.depends_on.iter().any(|d| d == to.as_str()) {
            resource.depends_on.push(to.to_string());
        }
        Ok(())
    }

    /// Record that this stack consumes exports of another stack.
    pub fn add_stack_dependency(&mut self, stack_name: &str) {
        if !self.stack_dependencies.iter().any(|s| s == stack_name) {
            self.stack_dependencies.push(stack_name.to_string());
        }
    }

    pub fn stack_dependencies(&self) -> &[String] {
        &self.stack_dependencies
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn resources(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.resources.iter().map(|(id, r)| (id.as_str(), r))
    }

    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Resource)> + 'a {
        self.resources()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.parameters.iter().map(|(id, p)| (id.as_str(), p))
    }

    pub fn output(&self, id: &str) -> Option<&Output> {
        self.outputs.get(id)
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&str, &Output)> {
        self.outputs.iter().map(|(id, o)| (id.as_str(), o))
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn graph(&self) -> ResourceGraph {
        ResourceGraph::from_stack(self)
    }

    /// Render the CloudFormation template.
    pub fn to_template(&self) -> Result<Value> {
        self.graph().validate(&self.name)?;

        let mut template = Map::new();
        template.insert(
            "AWSTemplateFormatVersion".to_string(),
            json!(TEMPLATE_FORMAT_VERSION),
        );
        if let Some(description) = &self.description {
            template.insert("Description".to_string(), json!(description));
        }
        if !self.parameters.is_empty() {
            template.insert(
                "Parameters".to_string(),
                serde_json::to_value(&self.parameters)?,
            );
        }
        template.insert(
            "Resources".to_string(),
            serde_json::to_value(&self.resources)?,
        );
        if !self.outputs.is_empty() {
            template.insert("Outputs".to_string(), serde_json::to_value(&self.outputs)?);
        }
        Ok(Value::Object(template))
    }

    fn claim_id(&self, raw: &str) -> Result<LogicalId> {
        let logical_id = LogicalId::sanitize(raw);
        if self.resources.contains_key(logical_id.as_str())
            || self.parameters.contains_key(logical_id.as_str())
        {
            return Err(self.duplicate(logical_id));
        }
        Ok(logical_id)
    }

    fn duplicate(&self, id: LogicalId) -> AcustackError {
        AcustackError::DuplicateLogicalId {
            stack: self.name.clone(),
            id: id.to_string(),
        }
    }
}
