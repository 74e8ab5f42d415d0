//! CloudFormation template building blocks.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Target account and region of a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub account: String,
    pub region: String,
}

impl Environment {
    pub fn new(account: &str, region: &str) -> Self {
        Self {
            account: account.to_string(),
            region: region.to_string(),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aws://{}/{}", self.account, self.region)
    }
}

/// What CloudFormation does with a resource removed from the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalPolicy {
    Delete,
    Retain,
    Snapshot,
}

/// Logical ID of a resource inside a stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogicalId(String);

impl LogicalId {
    /// Strip everything CloudFormation rejects in a logical ID.
    pub fn sanitize(raw: &str) -> Self {
        Self(raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn reference(&self) -> Value {
        intrinsic::reference(&self.0)
    }

    pub fn get_att(&self, attribute: &str) -> Value {
        intrinsic::get_att(&self.0, attribute)
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single `Resources` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(rename = "Properties", skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(rename = "DeletionPolicy", skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<RemovalPolicy>,
    #[serde(rename = "UpdateReplacePolicy", skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<RemovalPolicy>,
}

impl Resource {
    pub fn new(resource_type: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            properties: Map::new(),
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        let tag = json!({ "Key": key, "Value": value });
        match self.properties.get_mut("Tags") {
            Some(Value::Array(tags)) => tags.push(tag),
            _ => {
                self.properties.insert("Tags".to_string(), json!([tag]));
            }
        }
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self.update_replace_policy = Some(policy);
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// A template `Parameters` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub parameter_type: String,
    #[serde(rename = "Default", skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A template `Outputs` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    #[serde(rename = "Value")]
    pub value: Value,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Export", skip_serializing_if = "Option::is_none")]
    pub export: Option<Export>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Export {
    #[serde(rename = "Name")]
    pub name: String,
}

impl Output {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            description: None,
            export: None,
        }
    }

    pub fn described(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn exported_as(mut self, name: &str) -> Self {
        self.export = Some(Export {
            name: name.to_string(),
        });
        self
    }
}

/// Intrinsic function helpers.
pub mod intrinsic {
    use serde_json::{json, Value};

    pub fn reference(target: &str) -> Value {
        json!({ "Ref": target })
    }

    pub fn get_att(target: &str, attribute: &str) -> Value {
        json!({ "Fn::GetAtt": [target, attribute] })
    }

    pub fn import_value(export_name: &str) -> Value {
        json!({ "Fn::ImportValue": export_name })
    }

    pub fn sub(template: &str) -> Value {
        json!({ "Fn::Sub": template })
    }

    pub fn base64(value: Value) -> Value {
        json!({ "Fn::Base64": value })
    }

    pub fn select(index: usize, list: Value) -> Value {
        json!({ "Fn::Select": [index, list] })
    }

    /// Availability zones of the stack's region.
    pub fn get_azs() -> Value {
        json!({ "Fn::GetAZs": "" })
    }

    pub fn partition_arn(service_path: &str) -> Value {
        sub(&format!("arn:${{AWS::Partition}}:{}", service_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_logical_id() {
        assert_eq!(LogicalId::sanitize("acme-corp-KeyPair").as_str(), "acmecorpKeyPair");
        assert_eq!(LogicalId::sanitize("a_b.c d").as_str(), "abcd");
    }

    #[test]
    fn test_resource_serialization_skips_empty_sections() {
        let resource = Resource::new("AWS::EC2::InternetGateway");
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json, json!({ "Type": "AWS::EC2::InternetGateway" }));
    }

    #[test]
    fn test_tags_accumulate() {
        let resource = Resource::new("AWS::EC2::VPC")
            .with_tag("Name", "main")
            .with_tag("Owner", "ops");
        let tags = resource.property("Tags").unwrap().as_array().unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1]["Key"], "Owner");
    }

    #[test]
    fn test_removal_policy_sets_both_attributes() {
        let json = serde_json::to_value(
            Resource::new("AWS::RDS::DBInstance").with_removal_policy(RemovalPolicy::Delete),
        )
        .unwrap();
        assert_eq!(json["DeletionPolicy"], "Delete");
        assert_eq!(json["UpdateReplacePolicy"], "Delete");
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(
            Environment::new("123", "eu-west-1").to_string(),
            "aws://123/eu-west-1"
        );
    }

    #[test]
    fn test_partition_arn() {
        assert_eq!(
            intrinsic::partition_arn("iam::aws:policy/AmazonSSMManagedInstanceCore"),
            json!({ "Fn::Sub": "arn:${AWS::Partition}:iam::aws:policy/AmazonSSMManagedInstanceCore" })
        );
    }
}
