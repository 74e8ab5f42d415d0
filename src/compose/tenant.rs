//! Per-tenant Acumatica deployment: database, Windows instance and the wiring between them.

use crate::compose::bootstrap::{self, UserDataTemplate};
use crate::compose::network::NetworkHandle;
use crate::compose::security_group::{self, IngressRule, Peer};
use crate::config::TenantConfig;
use crate::error::Result;
use crate::shared::logging;
use crate::synth::model::{intrinsic, Environment, LogicalId, Output, Parameter, Resource, RemovalPolicy};
use crate::synth::stack::Stack;
use serde_json::{json, Value};

pub const SQL_SERVER_PORT: u16 = 1433;
pub const RDP_PORT: u16 = 3389;
pub const HTTP_PORT: u16 = 80;
pub const HTTPS_PORT: u16 = 443;

pub const DB_ENGINE: &str = "sqlserver-web";
pub const DB_ENGINE_VERSION: &str = "16.00.4095.4.v1";
pub const DB_INSTANCE_CLASS: &str = "db.m5.large";
pub const DB_ALLOCATED_STORAGE_GIB: u32 = 100;
pub const DB_MAX_ALLOCATED_STORAGE_GIB: u32 = 200;
pub const DB_MASTER_USERNAME: &str = "admin";

pub const INSTANCE_TYPE: &str = "m3.large";
pub const WINDOWS_IMAGE_SSM_PATH: &str =
    "/aws/service/ami-windows-latest/Windows_Server-2022-English-Full-Base";

const WINDOWS_IMAGE_PARAMETER: &str = "SsmParameterValueWindowsServer2022EnglishFullBase";

/// Logical IDs and names of what [`compose_tenant`] created.
#[derive(Debug, Clone)]
pub struct TenantResources {
    pub key_pair: LogicalId,
    pub instance_security_group: LogicalId,
    pub database_security_group: LogicalId,
    pub database_secret: LogicalId,
    pub database: LogicalId,
    pub role: LogicalId,
    pub parameter: LogicalId,
    pub instance: LogicalId,
    pub key_pair_name: String,
    pub secret_name: String,
    pub parameter_name: String,
    pub public_dns_output: String,
}

pub fn compose_tenant(
    env: &Environment,
    network: &NetworkHandle,
    tenant: &TenantConfig,
    user_data: &UserDataTemplate,
) -> Result<(Stack, TenantResources)> {
    let name = tenant.name.as_str();
    let stack_name = tenant.stack_name();
    let mut stack = Stack::new(&stack_name, env.clone())
        .with_description(&format!("Acumatica ERP deployment for tenant {}", name));
    stack.add_stack_dependency(&network.stack_name);

    // Parameter store entry read by the bootstrap script
    let parameter_name = tenant.parameter_name();
    let parameter = stack.add_resource(
        &format!("{}-Parameter", name),
        Resource::new("AWS::SSM::Parameter")
            .with("Type", json!("String"))
            .with("Name", json!(parameter_name))
            .with(
                "Value",
                json!(serde_json::to_string(&tenant.bootstrap_params())?),
            )
            .with("AllowedPattern", json!(".*"))
            .with("Description", json!("Parameter for running EC2"))
            .with("Tier", json!("Advanced")),
    )?;

    let key_pair_name = format!("{}-acumatica", name);
    let key_pair = stack.add_resource(
        &format!("{}-KeyPair", name),
        Resource::new("AWS::EC2::KeyPair")
            .with("KeyName", json!(key_pair_name))
            .with("KeyType", json!("rsa"))
            .with("KeyFormat", json!("pem"))
            .with_tag("Description", "Key pair for EC2"),
    )?;

    let instance_sg_id = format!("{}-Ec2SecurityGroup", name);
    let instance_security_group = stack.add_resource(
        &instance_sg_id,
        Resource::new("AWS::EC2::SecurityGroup")
            .with(
                "GroupDescription",
                json!(format!("{}/{}", stack_name, instance_sg_id)),
            )
            .with("VpcId", network.import_vpc_id())
            .with(
                "SecurityGroupIngress",
                security_group::inline_ingress(&instance_ingress_rules()),
            )
            .with("SecurityGroupEgress", security_group::allow_all_outbound()),
    )?;

    // Both rules are kept even though the CIDR rule already covers the instance group
    let db_sg_id = format!("{}-SecurityGroupRDS", name);
    let database_security_group = stack.add_resource(
        &db_sg_id,
        Resource::new("AWS::EC2::SecurityGroup")
            .with("GroupDescription", json!(format!("{}/{}", stack_name, db_sg_id)))
            .with("VpcId", network.import_vpc_id())
            .with(
                "SecurityGroupIngress",
                security_group::inline_ingress(&[IngressRule::tcp(
                    Peer::Ipv4(network.import_vpc_cidr()),
                    SQL_SERVER_PORT,
                )
                .described("Allow SQL Server access from the VPC")]),
            )
            .with("SecurityGroupEgress", security_group::allow_all_outbound()),
    )?;

    let mut from_instance = Resource::new("AWS::EC2::SecurityGroupIngress")
        .with("GroupId", database_security_group.get_att("GroupId"));
    let rule = IngressRule::tcp(
        Peer::SecurityGroup(instance_security_group.get_att("GroupId")),
        SQL_SERVER_PORT,
    )
    .described("Allow SQL Server access from EC2");
    for (key, value) in rule.to_properties() {
        from_instance = from_instance.with(&key, value);
    }
    stack.add_resource(
        &format!("{}-SecurityGroupRDSFromEc2{}", name, SQL_SERVER_PORT),
        from_instance,
    )?;

    let secret_name = format!("{}-acumatica-db-credentials", name);
    let database_secret = stack.add_resource(
        &format!("{}-DBInstanceSecret", name),
        Resource::new("AWS::SecretsManager::Secret")
            .with("Name", json!(secret_name))
            .with(
                "Description",
                json!(format!("Generated credentials for the {} database", name)),
            )
            .with(
                "GenerateSecretString",
                json!({
                    "SecretStringTemplate": json!({ "username": DB_MASTER_USERNAME }).to_string(),
                    "GenerateStringKey": "password",
                    "PasswordLength": 30,
                    "ExcludeCharacters": " %+~`#$&*()|[]{}:;<>?!'/@\"\\"
                }),
            )
            .with_removal_policy(RemovalPolicy::Delete),
    )?;

    let subnet_group = stack.add_resource(
        &format!("{}-DBInstanceSubnetGroup", name),
        Resource::new("AWS::RDS::DBSubnetGroup")
            .with(
                "DBSubnetGroupDescription",
                json!(format!("Subnet group for {}-DBInstance database", name)),
            )
            .with("SubnetIds", json!(network.import_public_subnets())),
    )?;

    // No backups yet deletion protected, kept as configured
    let database = stack.add_resource(
        &format!("{}-DBInstance", name),
        Resource::new("AWS::RDS::DBInstance")
            .with(
                "DBInstanceIdentifier",
                json!(format!("{}-db-acumatica-new", name)),
            )
            .with("Engine", json!(DB_ENGINE))
            .with("EngineVersion", json!(DB_ENGINE_VERSION))
            .with("LicenseModel", json!("license-included"))
            .with("DBInstanceClass", json!(DB_INSTANCE_CLASS))
            .with("AllocatedStorage", json!(DB_ALLOCATED_STORAGE_GIB.to_string()))
            .with("MaxAllocatedStorage", json!(DB_MAX_ALLOCATED_STORAGE_GIB))
            .with("StorageType", json!("gp2"))
            .with("MultiAZ", json!(false))
            .with("AllowMajorVersionUpgrade", json!(false))
            .with("AutoMinorVersionUpgrade", json!(true))
            .with("BackupRetentionPeriod", json!(0))
            .with("DeleteAutomatedBackups", json!(true))
            .with("DeletionProtection", json!(true))
            .with("PubliclyAccessible", json!(true))
            .with("CopyTagsToSnapshot", json!(true))
            .with("DBSubnetGroupName", subnet_group.reference())
            .with(
                "VPCSecurityGroups",
                json!([database_security_group.get_att("GroupId")]),
            )
            .with("MasterUsername", secret_field(&database_secret, "username"))
            .with("MasterUserPassword", secret_field(&database_secret, "password"))
            .with_removal_policy(RemovalPolicy::Delete),
    )?;

    stack.add_resource(
        &format!("{}-DBInstanceSecretAttachment", name),
        Resource::new("AWS::SecretsManager::SecretTargetAttachment")
            .with("SecretId", database_secret.reference())
            .with("TargetId", database.reference())
            .with("TargetType", json!("AWS::RDS::DBInstance")),
    )?;

    let role = stack.add_resource(
        &format!("{}-SsmRole", name),
        Resource::new("AWS::IAM::Role")
            .with(
                "AssumeRolePolicyDocument",
                policy_document(vec![json!({
                    "Action": "sts:AssumeRole",
                    "Effect": "Allow",
                    "Principal": { "Service": "ec2.amazonaws.com" }
                })]),
            )
            .with(
                "ManagedPolicyArns",
                json!([intrinsic::partition_arn(
                    "iam::aws:policy/AmazonSSMManagedInstanceCore"
                )]),
            ),
    )?;

    // Secrets are readable account-wide, parameters only the tenant's own
    stack.add_resource(
        &format!("{}-SsmRoleDefaultPolicy", name),
        Resource::new("AWS::IAM::Policy")
            .with(
                "PolicyName",
                json!(format!("{}SsmRoleDefaultPolicy", LogicalId::sanitize(name))),
            )
            .with("Roles", json!([role.reference()]))
            .with(
                "PolicyDocument",
                policy_document(vec![
                    allow(&["secretsmanager:GetSecretValue"], json!("*")),
                    allow(
                        &["ssm:GetParameter", "ssm:GetParameters"],
                        intrinsic::sub(&format!(
                            "arn:${{AWS::Partition}}:ssm:${{AWS::Region}}:${{AWS::AccountId}}:parameter/${{{}}}",
                            parameter
                        )),
                    ),
                    allow(
                        &["ssm:GetParameter"],
                        intrinsic::sub(&format!(
                            "arn:${{AWS::Partition}}:ssm:${{AWS::Region}}:${{AWS::AccountId}}:parameter/ec2/keypair/${{{}.KeyPairId}}",
                            key_pair
                        )),
                    ),
                    allow(&["ec2:DescribeKeyPairs"], json!("*")),
                ]),
            ),
    )?;

    let instance_profile = stack.add_resource(
        &format!("{}-InstanceProfile", name),
        Resource::new("AWS::IAM::InstanceProfile").with("Roles", json!([role.reference()])),
    )?;

    let image = stack.add_parameter(
        WINDOWS_IMAGE_PARAMETER,
        Parameter {
            parameter_type: "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>".to_string(),
            default: Some(WINDOWS_IMAGE_SSM_PATH.to_string()),
            description: Some("Windows Server 2022 English Full Base".to_string()),
        },
    )?;

    let script = user_data.render(&secret_name, &parameter_name);
    let public_subnet = network
        .import_public_subnets()
        .into_iter()
        .next()
        .unwrap_or(Value::Null);

    let instance = stack.add_resource(
        &format!("{}-AcumaticaInstance", name),
        Resource::new("AWS::EC2::Instance")
            .with("ImageId", image.reference())
            .with("InstanceType", json!(INSTANCE_TYPE))
            .with("SubnetId", public_subnet)
            .with(
                "SecurityGroupIds",
                json!([instance_security_group.get_att("GroupId")]),
            )
            .with("IamInstanceProfile", instance_profile.reference())
            .with("KeyName", key_pair.reference())
            .with(
                "UserData",
                intrinsic::base64(json!(bootstrap::for_windows(&script))),
            )
            .with_tag("Name", &format!("{}-acumatica-windows", name)),
    )?;

    // No data flows from the database to the instance, so the order is explicit
    stack.add_dependency(&instance, &database)?;

    let public_dns_output = stack.add_output(
        &format!("{}-InstancePublicDns", name),
        Output::new(instance.get_att("PublicDnsName")).described("Public DNS"),
    )?;

    logging::debug(&format!(
        "Composed {} with {} resources",
        stack_name,
        stack.resource_count()
    ));

    let resources = TenantResources {
        key_pair,
        instance_security_group,
        database_security_group,
        database_secret,
        database,
        role,
        parameter,
        instance,
        key_pair_name,
        secret_name,
        parameter_name,
        public_dns_output: public_dns_output.to_string(),
    };
    Ok((stack, resources))
}

/// Remote desktop, HTTP and HTTPS from anywhere.
pub fn instance_ingress_rules() -> Vec<IngressRule> {
    vec![
        IngressRule::tcp(Peer::AnyIpv4, RDP_PORT).described("Allow RDP access"),
        IngressRule::tcp(Peer::AnyIpv4, HTTP_PORT).described("Allow HTTP access"),
        IngressRule::tcp(Peer::AnyIpv4, HTTPS_PORT).described("Allow HTTPS access"),
    ]
}

fn secret_field(secret: &LogicalId, field: &str) -> Value {
    intrinsic::sub(&format!(
        "{{{{resolve:secretsmanager:${{{}}}:SecretString:{}::}}}}",
        secret, field
    ))
}

fn policy_document(statements: Vec<Value>) -> Value {
    json!({ "Version": "2012-10-17", "Statement": statements })
}

fn allow(actions: &[&str], resource: Value) -> Value {
    let action = match actions {
        [single] => json!(single),
        _ => json!(actions),
    };
    json!({ "Action": action, "Effect": "Allow", "Resource": resource })
}
