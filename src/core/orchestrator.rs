use crate::compose::bootstrap::UserDataTemplate;
use crate::compose::network::{self, NETWORK_STACK_NAME};
use crate::compose::tenant;
use crate::config::{GlobalConfig, TenantConfig};
use crate::error::Result;
use crate::shared::logging;
use crate::synth::assembly::CloudAssembly;

/// What a run deploys, decided once from the tenant selector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Deployment<'a> {
    NetworkOnly,
    NetworkPlusTenant(&'a TenantConfig),
}

impl<'a> Deployment<'a> {
    /// Resolve the selector against the configured tenants.
    ///
    /// An empty selector counts as absent. An unknown tenant fails here,
    /// before any stack is composed.
    pub fn plan(config: &'a GlobalConfig, selector: Option<&str>) -> Result<Self> {
        match selector.filter(|name| !name.is_empty()) {
            None => Ok(Deployment::NetworkOnly),
            Some(name) => {
                let tenant = config.find_tenant(name)?;
                logging::info(&format!("Deploying tenant {}", tenant.name));
                Ok(Deployment::NetworkPlusTenant(tenant))
            }
        }
    }

    pub fn tenant(&self) -> Option<&'a TenantConfig> {
        match *self {
            Deployment::NetworkOnly => None,
            Deployment::NetworkPlusTenant(tenant) => Some(tenant),
        }
    }

    /// Compose the network stack, plus the tenant stack when one was selected.
    pub fn synthesize(
        &self,
        config: &GlobalConfig,
        user_data: &UserDataTemplate,
    ) -> Result<CloudAssembly> {
        let env = config.environment();
        let mut assembly = CloudAssembly::new();

        let (network_stack, network) = network::compose_network(&env, &config.vpc_name)?;
        assembly.add_stack(network_stack);

        match self {
            Deployment::NetworkOnly => {
                logging::info(&format!(
                    "No tenant context provided. Only {} has been deployed.",
                    NETWORK_STACK_NAME
                ));
            }
            Deployment::NetworkPlusTenant(tenant) => {
                let (tenant_stack, _) =
                    tenant::compose_tenant(&env, &network, tenant, user_data)?;
                assembly.add_stack(tenant_stack);
            }
        }

        Ok(assembly)
    }
}

/// Plan and synthesize in one step.
pub fn synthesize(
    config: &GlobalConfig,
    selector: Option<&str>,
    user_data: &UserDataTemplate,
) -> Result<CloudAssembly> {
    Deployment::plan(config, selector)?.synthesize(config, user_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AcustackError;

    fn config() -> GlobalConfig {
        GlobalConfig {
            account: "123456789012".to_string(),
            region: "us-east-1".to_string(),
            vpc_name: "vpc".to_string(),
            tenants: vec![TenantConfig {
                name: "acme".to_string(),
                db_name: "AcmeDB".to_string(),
                instance_name: "AcmeERP".to_string(),
                acumatica_version: "23.107.0046".to_string(),
            }],
        }
    }

    #[test]
    fn test_plan_without_selector() {
        let config = config();
        let plan = Deployment::plan(&config, None).unwrap();
        assert_eq!(plan, Deployment::NetworkOnly);
        assert!(plan.tenant().is_none());
    }

    #[test]
    fn test_plan_with_empty_selector() {
        let config = config();
        assert_eq!(Deployment::plan(&config, Some("")).unwrap(), Deployment::NetworkOnly);
    }

    #[test]
    fn test_plan_with_known_tenant() {
        let config = config();
        let plan = Deployment::plan(&config, Some("acme")).unwrap();
        assert_eq!(plan.tenant().map(|t| t.name.as_str()), Some("acme"));
    }

    #[test]
    fn test_plan_with_unknown_tenant() {
        let config = config();
        let err = Deployment::plan(&config, Some("initech")).unwrap_err();
        assert!(matches!(err, AcustackError::TenantNotFound { .. }));
        assert_eq!(err.to_string(), "Tenant initech not found in the configuration");
    }

    #[test]
    fn test_synthesize_stack_counts() {
        let config = config();
        let user_data = UserDataTemplate::bundled();

        let network_only = synthesize(&config, None, &user_data).unwrap();
        assert_eq!(network_only.stack_names(), vec![NETWORK_STACK_NAME]);

        let with_tenant = synthesize(&config, Some("acme"), &user_data).unwrap();
        assert_eq!(with_tenant.stack_names(), vec![NETWORK_STACK_NAME, "acmeStack"]);
    }
}
