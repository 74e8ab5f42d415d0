//! Typed security group rules.

use serde_json::{json, Map, Value};

pub const ANY_IPV4: &str = "0.0.0.0/0";

/// Source of inbound traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum Peer {
    AnyIpv4,
    /// A CIDR block, possibly an intrinsic such as an imported value
    Ipv4(Value),
    /// Another security group's ID
    SecurityGroup(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngressRule {
    pub peer: Peer,
    pub port: u16,
    pub description: Option<String>,
}

impl IngressRule {
    pub fn tcp(peer: Peer, port: u16) -> Self {
        Self {
            peer,
            port,
            description: None,
        }
    }

    pub fn described(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Properties shared by inline rules and `AWS::EC2::SecurityGroupIngress`.
    pub fn to_properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("IpProtocol".to_string(), json!("tcp"));
        props.insert("FromPort".to_string(), json!(self.port));
        props.insert("ToPort".to_string(), json!(self.port));
        match &self.peer {
            Peer::AnyIpv4 => {
                props.insert("CidrIp".to_string(), json!(ANY_IPV4));
            }
            Peer::Ipv4(cidr) => {
                props.insert("CidrIp".to_string(), cidr.clone());
            }
            Peer::SecurityGroup(group_id) => {
                props.insert("SourceSecurityGroupId".to_string(), group_id.clone());
            }
        }
        if let Some(description) = &self.description {
            props.insert("Description".to_string(), json!(description));
        }
        props
    }
}

/// Egress to everywhere on every protocol.
pub fn allow_all_outbound() -> Value {
    json!([{
        "CidrIp": ANY_IPV4,
        "Description": "Allow all outbound traffic by default",
        "IpProtocol": "-1"
    }])
}

pub fn inline_ingress(rules: &[IngressRule]) -> Value {
    Value::Array(
        rules
            .iter()
            .map(|r| Value::Object(r.to_properties()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_ipv4_rule() {
        let props = IngressRule::tcp(Peer::AnyIpv4, 3389)
            .described("Allow RDP access")
            .to_properties();
        assert_eq!(props["CidrIp"], ANY_IPV4);
        assert_eq!(props["FromPort"], 3389);
        assert_eq!(props["ToPort"], 3389);
        assert_eq!(props["IpProtocol"], "tcp");
        assert_eq!(props["Description"], "Allow RDP access");
    }

    #[test]
    fn test_security_group_peer() {
        let props = IngressRule::tcp(
            Peer::SecurityGroup(json!({ "Fn::GetAtt": ["Sg", "GroupId"] })),
            1433,
        )
        .to_properties();
        assert!(props.get("CidrIp").is_none());
        assert_eq!(props["SourceSecurityGroupId"]["Fn::GetAtt"][0], "Sg");
        assert!(props.get("Description").is_none());
    }
}
