use crate::error::{AcustackError, Result};
use crate::shared::logging;
use crate::synth::model::Environment;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Base location of the Acumatica build artifacts, followed by the version.
pub const ACUMATICA_BUILDS_BASE_URL: &str = "https://acumatica-builds.s3.amazonaws.com/builds";

/// Installer for the AWS CLI used by the bootstrap script.
pub const AWS_CLI_INSTALLER_URL: &str = "https://awscli.amazonaws.com/AWSCLIV2.msi";

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Environment variable overriding the configuration path.
pub const CONFIG_ENV_VAR: &str = "ACUSTACK_CONFIG";

/// Top level deployment configuration, loaded once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    /// AWS account ID every stack is deployed to
    pub account: String,
    /// AWS region every stack is deployed to
    pub region: String,
    /// Name given to the shared VPC
    pub vpc_name: String,
    /// Tenants that can be selected for deployment
    pub tenants: Vec<TenantConfig>,
}

/// A single tenant record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    /// Unique tenant name, used as the prefix of every resource name
    pub name: String,
    /// Database name created by the bootstrap script
    pub db_name: String,
    /// Acumatica instance name created by the bootstrap script
    pub instance_name: String,
    /// Acumatica build version, e.g. "23.107.0046"
    pub acumatica_version: String,
}

/// Values the bootstrap script reads back from the parameter store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantBootstrapParams {
    pub db_name: String,
    pub instance_name: String,
    pub acumatica_msi_url: String,
    pub aws_cli_installer_url: String,
}

impl GlobalConfig {
    /// Read and parse the YAML configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AcustackError::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| AcustackError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let config = Self::from_yaml(&content).map_err(|e| match e {
            AcustackError::ConfigParse { message, .. } => AcustackError::ConfigParse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;

        logging::debug(&format!(
            "Loaded configuration from {} with {} tenant(s)",
            path.display(),
            config.tenants.len()
        ));
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| AcustackError::ConfigParse {
            path: PathBuf::new(),
            message: e.to_string(),
        })
    }

    /// Find a tenant by exact name.
    pub fn find_tenant(&self, name: &str) -> Result<&TenantConfig> {
        self.tenants
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| AcustackError::TenantNotFound {
                name: name.to_string(),
                known: self.tenant_names(),
            })
    }

    pub fn tenant_names(&self) -> Vec<String> {
        self.tenants.iter().map(|t| t.name.clone()).collect()
    }

    pub fn environment(&self) -> Environment {
        Environment::new(&self.account, &self.region)
    }
}

impl TenantConfig {
    pub fn acumatica_msi_url(&self) -> String {
        format!(
            "{}/{}/AcumaticaERP/AcumaticaERPInstall.msi",
            ACUMATICA_BUILDS_BASE_URL, self.acumatica_version
        )
    }

    /// Name of the parameter store entry holding [`TenantBootstrapParams`].
    pub fn parameter_name(&self) -> String {
        format!("{}-{}-param", self.name, self.instance_name)
    }

    pub fn bootstrap_params(&self) -> TenantBootstrapParams {
        TenantBootstrapParams {
            db_name: self.db_name.clone(),
            instance_name: self.instance_name.clone(),
            acumatica_msi_url: self.acumatica_msi_url(),
            aws_cli_installer_url: AWS_CLI_INSTALLER_URL.to_string(),
        }
    }

    pub fn stack_name(&self) -> String {
        format!("{}Stack", self.name)
    }
}

/// Resolve the configuration path.
///
/// Priority:
/// 1. Command line argument
/// 2. `ACUSTACK_CONFIG` environment variable
/// 3. `config.yaml` in the current directory
pub fn resolve_config_path(cli_path: Option<&str>) -> Result<PathBuf> {
    let env_path = std::env::var(CONFIG_ENV_VAR).ok();
    let raw = match (cli_path, env_path.as_deref()) {
        (Some(path), _) => {
            logging::debug(&format!("Using config path from CLI arg: {}", path));
            path.to_string()
        }
        (None, Some(path)) => {
            logging::debug(&format!(
                "Using config path from {} env var: {}",
                CONFIG_ENV_VAR, path
            ));
            path.to_string()
        }
        (None, None) => DEFAULT_CONFIG_FILE.to_string(),
    };

    let path = PathBuf::from(&raw);
    if path.is_absolute() {
        Ok(path)
    } else {
        let abs_path = std::env::current_dir()?.join(path);
        logging::debug(&format!(
            "Converting relative config path to absolute: {}",
            abs_path.display()
        ));
        Ok(abs_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
account: "123456789012"
region: us-east-1
vpcName: acumatica-vpc
tenants:
  - name: acme
    dbName: AcmeDB
    instanceName: AcmeERP
    acumaticaVersion: "23.107.0046"
  - name: globex
    dbName: GlobexDB
    instanceName: GlobexERP
    acumaticaVersion: "24.100.0100"
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = GlobalConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.account, "123456789012");
        assert_eq!(config.vpc_name, "acumatica-vpc");
        assert_eq!(config.tenants.len(), 2);
        assert_eq!(config.tenants[1].db_name, "GlobexDB");
    }

    #[test]
    fn test_find_tenant_exact_match() {
        let config = GlobalConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.find_tenant("acme").unwrap().instance_name, "AcmeERP");

        match config.find_tenant("Acme") {
            Err(AcustackError::TenantNotFound { name, known }) => {
                assert_eq!(name, "Acme");
                assert_eq!(known, vec!["acme".to_string(), "globex".to_string()]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_field_is_parse_error() {
        let err = GlobalConfig::from_yaml("account: '1'\nregion: x\ntenants: []\n").unwrap_err();
        assert!(matches!(err, AcustackError::ConfigParse { .. }));
        assert!(err.to_string().contains("vpcName"));
    }

    #[test]
    fn test_msi_url_uses_version() {
        let config = GlobalConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(
            config.tenants[0].acumatica_msi_url(),
            "https://acumatica-builds.s3.amazonaws.com/builds/23.107.0046/AcumaticaERP/AcumaticaERPInstall.msi"
        );
        for version in ["1", "24.200.0001-beta", "x y"] {
            let tenant = TenantConfig {
                acumatica_version: version.to_string(),
                ..config.tenants[0].clone()
            };
            assert_eq!(
                tenant.acumatica_msi_url(),
                format!(
                    "{}/{}/AcumaticaERP/AcumaticaERPInstall.msi",
                    ACUMATICA_BUILDS_BASE_URL, version
                )
            );
        }
    }

    #[test]
    fn test_parameter_name() {
        let tenant = TenantConfig {
            name: "acme-corp".to_string(),
            db_name: "db".to_string(),
            instance_name: "Prod_1".to_string(),
            acumatica_version: "1".to_string(),
        };
        assert_eq!(tenant.parameter_name(), "acme-corp-Prod_1-param");
        assert_eq!(tenant.stack_name(), "acme-corpStack");
    }

    #[test]
    fn test_bootstrap_params_serialize_camel_case() {
        let config = GlobalConfig::from_yaml(SAMPLE).unwrap();
        let json = serde_json::to_value(config.tenants[0].bootstrap_params()).unwrap();
        assert_eq!(json["dbName"], "AcmeDB");
        assert_eq!(json["instanceName"], "AcmeERP");
        assert_eq!(json["awsCliInstallerUrl"], AWS_CLI_INSTALLER_URL);
        assert!(json["acumaticaMsiUrl"]
            .as_str()
            .unwrap()
            .contains("/23.107.0046/"));
    }

    // Single test so nothing else races on the environment variable
    #[test]
    fn test_resolve_config_path_priority() {
        let saved = std::env::var(CONFIG_ENV_VAR).ok();
        let cwd = std::env::current_dir().unwrap();

        std::env::remove_var(CONFIG_ENV_VAR);
        assert_eq!(
            resolve_config_path(None).unwrap(),
            cwd.join(DEFAULT_CONFIG_FILE)
        );

        std::env::set_var(CONFIG_ENV_VAR, "/etc/acustack/env.yaml");
        assert_eq!(
            resolve_config_path(None).unwrap(),
            PathBuf::from("/etc/acustack/env.yaml")
        );
        assert_eq!(
            resolve_config_path(Some("/srv/cli.yaml")).unwrap(),
            PathBuf::from("/srv/cli.yaml")
        );

        let relative = resolve_config_path(Some("conf/tenants.yaml")).unwrap();
        assert!(relative.is_absolute());
        assert_eq!(relative, cwd.join("conf/tenants.yaml"));

        std::env::set_var(CONFIG_ENV_VAR, "relative/env.yaml");
        assert_eq!(
            resolve_config_path(None).unwrap(),
            cwd.join("relative/env.yaml")
        );

        match saved {
            Some(value) => std::env::set_var(CONFIG_ENV_VAR, value),
            None => std::env::remove_var(CONFIG_ENV_VAR),
        }
    }
}
