//! Shared VPC: two availability zones, a public and an isolated subnet in each.

use crate::error::{AcustackError, Result};
use crate::shared::logging;
use crate::synth::model::{intrinsic, Environment, LogicalId, Output, Resource};
use crate::synth::stack::Stack;
use ipnet::Ipv4Net;
use serde_json::{json, Value};

pub const NETWORK_STACK_NAME: &str = "VpcStack";
pub const VPC_CIDR: &str = "10.0.0.0/16";
pub const MAX_AZS: usize = 2;
pub const SUBNET_PREFIX_LEN: u8 = 24;

const VPC_ID: &str = "MyVpc";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubnetTier {
    Public,
    Isolated,
}

impl SubnetTier {
    fn group_name(self) -> &'static str {
        match self {
            SubnetTier::Public => "PublicSubnet",
            SubnetTier::Isolated => "PrivateSubnet",
        }
    }

    fn label(self) -> &'static str {
        match self {
            SubnetTier::Public => "Public",
            SubnetTier::Isolated => "Isolated",
        }
    }
}

/// What other stacks need to know about the network.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkHandle {
    pub stack_name: String,
    pub vpc_name: String,
    /// `Ref` to the VPC, valid only inside the network stack
    pub vpc_id: Value,
    pub vpc_id_export: String,
    pub vpc_cidr_export: String,
    pub public_subnet_exports: Vec<String>,
}

impl NetworkHandle {
    pub fn import_vpc_id(&self) -> Value {
        intrinsic::import_value(&self.vpc_id_export)
    }

    pub fn import_vpc_cidr(&self) -> Value {
        intrinsic::import_value(&self.vpc_cidr_export)
    }

    pub fn import_public_subnets(&self) -> Vec<Value> {
        self.public_subnet_exports
            .iter()
            .map(|name| intrinsic::import_value(name))
            .collect()
    }
}

/// Carve `count` consecutive blocks of `prefix_len` out of `parent`.
pub fn allocate_subnets(parent: Ipv4Net, prefix_len: u8, count: usize) -> Result<Vec<Ipv4Net>> {
    let blocks: Vec<Ipv4Net> = parent
        .subnets(prefix_len)
        .map_err(|e| AcustackError::SubnetAllocation(format!("{}: {}", parent, e)))?
        .take(count)
        .collect();

    if blocks.len() < count {
        return Err(AcustackError::SubnetAllocation(format!(
            "{} has room for only {} /{} blocks, {} requested",
            parent,
            blocks.len(),
            prefix_len,
            count
        )));
    }
    Ok(blocks)
}

pub fn compose_network(env: &Environment, vpc_name: &str) -> Result<(Stack, NetworkHandle)> {
    let mut stack = Stack::new(NETWORK_STACK_NAME, env.clone())
        .with_description(&format!("Shared network for {}", vpc_name));

    let vpc = stack.add_resource(
        VPC_ID,
        Resource::new("AWS::EC2::VPC")
            .with("CidrBlock", json!(VPC_CIDR))
            .with("EnableDnsHostnames", json!(true))
            .with("EnableDnsSupport", json!(true))
            .with("InstanceTenancy", json!("default"))
            .with_tag("Name", vpc_name),
    )?;

    let igw = stack.add_resource(
        &format!("{}IGW", VPC_ID),
        Resource::new("AWS::EC2::InternetGateway").with_tag("Name", vpc_name),
    )?;
    let attachment = stack.add_resource(
        &format!("{}VPCGW", VPC_ID),
        Resource::new("AWS::EC2::VPCGatewayAttachment")
            .with("VpcId", vpc.reference())
            .with("InternetGatewayId", igw.reference()),
    )?;

    let parent: Ipv4Net = VPC_CIDR
        .parse()
        .map_err(|e| AcustackError::SubnetAllocation(format!("{}: {}", VPC_CIDR, e)))?;
    let tiers = [SubnetTier::Public, SubnetTier::Isolated];
    let blocks = allocate_subnets(parent, SUBNET_PREFIX_LEN, tiers.len() * MAX_AZS)?;

    let mut public_subnets = Vec::new();
    for (tier_index, tier) in tiers.iter().enumerate() {
        for az in 0..MAX_AZS {
            let cidr = blocks[tier_index * MAX_AZS + az];
            let subnet = add_subnet(&mut stack, &vpc, &attachment, &igw, vpc_name, *tier, az, cidr)?;
            if *tier == SubnetTier::Public {
                public_subnets.push(subnet);
            }
        }
    }

    let vpc_id_export = format!("{}-VpcId", NETWORK_STACK_NAME);
    let vpc_cidr_export = format!("{}-VpcCidr", NETWORK_STACK_NAME);

    stack.add_output(
        "VpcIdOutput",
        Output::new(vpc.reference()).described("The ID of the VPC"),
    )?;
    stack.add_output(
        "ExportVpcId",
        Output::new(vpc.reference()).exported_as(&vpc_id_export),
    )?;
    stack.add_output(
        "ExportVpcCidr",
        Output::new(vpc.get_att("CidrBlock")).exported_as(&vpc_cidr_export),
    )?;

    let mut public_subnet_exports = Vec::new();
    for (index, subnet) in public_subnets.iter().enumerate() {
        let export = format!("{}-PublicSubnet{}Id", NETWORK_STACK_NAME, index + 1);
        stack.add_output(
            &format!("ExportPublicSubnet{}", index + 1),
            Output::new(subnet.reference()).exported_as(&export),
        )?;
        public_subnet_exports.push(export);
    }

    logging::debug(&format!(
        "Composed {} with {} resources",
        NETWORK_STACK_NAME,
        stack.resource_count()
    ));

    let handle = NetworkHandle {
        stack_name: NETWORK_STACK_NAME.to_string(),
        vpc_name: vpc_name.to_string(),
        vpc_id: vpc.reference(),
        vpc_id_export,
        vpc_cidr_export,
        public_subnet_exports,
    };
    Ok((stack, handle))
}

#[allow(clippy::too_many_arguments)]
fn add_subnet(
    stack: &mut Stack,
    vpc: &LogicalId,
    attachment: &LogicalId,
    igw: &LogicalId,
    vpc_name: &str,
    tier: SubnetTier,
    az: usize,
    cidr: Ipv4Net,
) -> Result<LogicalId> {
    let prefix = format!("{}{}Subnet{}", VPC_ID, tier.group_name(), az + 1);
    let public = tier == SubnetTier::Public;

    let subnet = stack.add_resource(
        &format!("{}Subnet", prefix),
        Resource::new("AWS::EC2::Subnet")
            .with("VpcId", vpc.reference())
            .with("CidrBlock", json!(cidr.to_string()))
            .with(
                "AvailabilityZone",
                intrinsic::select(az, intrinsic::get_azs()),
            )
            .with("MapPublicIpOnLaunch", json!(public))
            .with_tag("Name", &format!("{}/{}Subnet{}", vpc_name, tier.group_name(), az + 1))
            .with_tag("aws-cdk:subnet-name", tier.group_name())
            .with_tag("aws-cdk:subnet-type", tier.label()),
    )?;

    let route_table = stack.add_resource(
        &format!("{}RouteTable", prefix),
        Resource::new("AWS::EC2::RouteTable")
            .with("VpcId", vpc.reference())
            .with_tag("Name", &format!("{}/{}Subnet{}", vpc_name, tier.group_name(), az + 1)),
    )?;
    stack.add_resource(
        &format!("{}RouteTableAssociation", prefix),
        Resource::new("AWS::EC2::SubnetRouteTableAssociation")
            .with("RouteTableId", route_table.reference())
            .with("SubnetId", subnet.reference()),
    )?;

    if public {
        let route = stack.add_resource(
            &format!("{}DefaultRoute", prefix),
            Resource::new("AWS::EC2::Route")
                .with("RouteTableId", route_table.reference())
                .with("DestinationCidrBlock", json!("0.0.0.0/0"))
                .with("GatewayId", igw.reference()),
        )?;
        // The gateway must be attached before a route can target it
        stack.add_dependency(&route, attachment)?;
    }

    Ok(subnet)
}
