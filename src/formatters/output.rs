use crate::error::AcustackError;
use crate::synth::assembly::CloudAssembly;
use crate::synth::graph::GraphStatistics;
use serde_json::{json, Value};
use std::path::PathBuf;

/// Output formatter for structured, user-friendly results
pub struct OutputFormatter;

impl OutputFormatter {
    /// Format the stacks of an assembly with their outputs and dependencies
    pub fn format_stack_list(assembly: &CloudAssembly) -> Value {
        json!({
            "summary": {
                "total_stacks": assembly.stacks().len(),
                "description": "Stacks synthesized for this invocation"
            },
            "stacks": assembly.stacks().iter().map(|stack| {
                json!({
                    "name": stack.name(),
                    "environment": stack.env().to_string(),
                    "template_file": CloudAssembly::template_file_name(stack),
                    "resource_count": stack.resource_count(),
                    "depends_on": stack.stack_dependencies(),
                    "outputs": stack.outputs().map(|(id, output)| {
                        json!({
                            "id": id,
                            "description": output.description,
                            "export": output.export.as_ref().map(|e| e.name.clone())
                        })
                    }).collect::<Vec<_>>()
                })
            }).collect::<Vec<_>>(),
            "usage_note": "Deploy the templates in order; tenant stacks import values exported by VpcStack"
        })
    }

    /// Format the result of writing an assembly to disk
    pub fn format_synth_result(assembly: &CloudAssembly, written: &[PathBuf]) -> Value {
        json!({
            "stacks": assembly.stack_names(),
            "files": written.iter().map(|p| p.display().to_string()).collect::<Vec<_>>()
        })
    }

    pub fn format_graph_statistics(stack_name: &str, stats: &GraphStatistics) -> Value {
        json!({
            "stack": stack_name,
            "statistics": stats
        })
    }

    /// Format error messages with helpful suggestions
    pub fn format_error_with_suggestions(error: &AcustackError) -> Value {
        let mut result = json!({
            "error": {
                "message": error.to_string(),
                "type": Self::error_type(error)
            }
        });

        let suggestions: Vec<String> = match error {
            AcustackError::TenantNotFound { known, .. } if known.is_empty() => {
                vec!["The configuration has no tenants; add one under 'tenants'".to_string()]
            }
            AcustackError::TenantNotFound { known, .. } => known
                .iter()
                .map(|name| format!("Did you mean '{}'?", name))
                .collect(),
            AcustackError::ConfigNotFound(_) => vec![
                "Pass --config <PATH> or set ACUSTACK_CONFIG".to_string(),
                "Run `acustack schema` to see the expected document layout".to_string(),
            ],
            AcustackError::ConfigParse { .. } => {
                vec!["Run `acustack schema` to see the expected document layout".to_string()]
            }
            _ => Vec::new(),
        };

        if !suggestions.is_empty() {
            result["suggestions"] = json!(suggestions);
        }
        result
    }

    fn error_type(error: &AcustackError) -> &'static str {
        match error {
            AcustackError::ConfigNotFound(_) | AcustackError::ConfigParse { .. } => {
                "configuration_error"
            }
            AcustackError::TenantNotFound { .. } => "tenant_not_found",
            AcustackError::UserDataRead { .. } => "user_data_error",
            AcustackError::DuplicateLogicalId { .. }
            | AcustackError::DanglingDependency { .. }
            | AcustackError::SubnetAllocation(_) => "synthesis_error",
            AcustackError::Io(_) | AcustackError::Json(_) => "io_error",
        }
    }
}
