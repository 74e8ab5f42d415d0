//! Synthesized output: one template per stack plus a manifest.

use crate::error::Result;
use crate::shared::logging;
use crate::synth::stack::Stack;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: &str = "1.0.0";
pub const TEMPLATE_SUFFIX: &str = ".template.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub synthesized_at: DateTime<Utc>,
    pub artifacts: BTreeMap<String, ArtifactEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub environment: String,
    pub template_file: String,
    pub dependencies: Vec<String>,
    pub outputs: Vec<String>,
    pub resource_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CloudAssembly {
    stacks: Vec<Stack>,
}

impl CloudAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stack(&mut self, stack: Stack) {
        self.stacks.push(stack);
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name() == name)
    }

    pub fn stack_names(&self) -> Vec<&str> {
        self.stacks.iter().map(|s| s.name()).collect()
    }

    pub fn template_file_name(stack: &Stack) -> String {
        format!("{}{}", stack.name(), TEMPLATE_SUFFIX)
    }

    pub fn manifest(&self) -> Manifest {
        let artifacts = self
            .stacks
            .iter()
            .map(|stack| {
                let entry = ArtifactEntry {
                    artifact_type: "aws:cloudformation:stack".to_string(),
                    environment: stack.env().to_string(),
                    template_file: Self::template_file_name(stack),
                    dependencies: stack.stack_dependencies().to_vec(),
                    outputs: stack.outputs().map(|(id, _)| id.to_string()).collect(),
                    resource_count: stack.resource_count(),
                };
                (stack.name().to_string(), entry)
            })
            .collect();

        Manifest {
            version: MANIFEST_VERSION.to_string(),
            synthesized_at: Utc::now(),
            artifacts,
        }
    }

    /// Write every template and the manifest into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        // Render everything first so a bad stack leaves no partial output behind
        let mut rendered = Vec::with_capacity(self.stacks.len());
        for stack in &self.stacks {
            let template = stack.to_template()?;
            rendered.push((
                Self::template_file_name(stack),
                serde_json::to_string_pretty(&template)?,
            ));
        }

        if !dir.exists() {
            logging::debug(&format!("Creating output directory: {}", dir.display()));
            std::fs::create_dir_all(dir)?;
        }
        Self::remove_stale_templates(dir, &rendered)?;

        let mut written = Vec::new();
        for (file_name, content) in rendered {
            let path = dir.join(file_name);
            std::fs::write(&path, content)?;
            logging::info(&format!("Wrote {}", path.display()));
            written.push(path);
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        std::fs::write(
            &manifest_path,
            serde_json::to_string_pretty(&self.manifest())?,
        )?;
        written.push(manifest_path);

        Ok(written)
    }

    /// Delete templates left by an earlier run that this assembly no longer contains.
    fn remove_stale_templates(dir: &Path, rendered: &[(String, String)]) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !file_name.ends_with(TEMPLATE_SUFFIX) || !path.is_file() {
                continue;
            }
            if rendered.iter().all(|(current, _)| current != file_name) {
                logging::info(&format!("Removing stale template {}", path.display()));
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::model::{Environment, Output, Resource};
    use tempfile::TempDir;

    fn assembly() -> CloudAssembly {
        let env = Environment::new("123456789012", "us-east-1");
        let mut first = Stack::new("First", env.clone());
        let vpc = first
            .add_resource("Vpc", Resource::new("AWS::EC2::VPC"))
            .unwrap();
        first
            .add_output("VpcId", Output::new(vpc.reference()).exported_as("First-VpcId"))
            .unwrap();

        let mut second = Stack::new("Second", env);
        second
            .add_resource("Bucket", Resource::new("AWS::S3::Bucket"))
            .unwrap();
        second.add_stack_dependency("First");

        let mut assembly = CloudAssembly::new();
        assembly.add_stack(first);
        assembly.add_stack(second);
        assembly
    }

    #[test]
    fn test_manifest_entries() {
        let manifest = assembly().manifest();
        assert_eq!(manifest.artifacts.len(), 2);
        let second = &manifest.artifacts["Second"];
        assert_eq!(second.environment, "aws://123456789012/us-east-1");
        assert_eq!(second.template_file, "Second.template.json");
        assert_eq!(second.dependencies, vec!["First".to_string()]);
        assert_eq!(manifest.artifacts["First"].outputs, vec!["VpcId".to_string()]);
    }

    #[test]
    fn test_write_to_directory() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("cdk.out");

        let written = assembly().write_to(&out).unwrap();
        assert_eq!(written.len(), 3);
        assert!(out.join("First.template.json").exists());
        assert!(out.join("Second.template.json").exists());

        let manifest: Manifest =
            serde_json::from_str(&std::fs::read_to_string(out.join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(manifest.version, MANIFEST_VERSION);
    }

    #[test]
    fn test_write_to_removes_stale_templates() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("cdk.out");
        assembly().write_to(&out).unwrap();
        std::fs::write(out.join("notes.txt"), "keep").unwrap();

        let mut smaller = CloudAssembly::new();
        smaller.add_stack(assembly().stacks()[0].clone());
        smaller.write_to(&out).unwrap();

        assert!(out.join("First.template.json").exists());
        assert!(!out.join("Second.template.json").exists());
        assert!(out.join("notes.txt").exists());
    }

    #[test]
    fn test_lookup_by_name() {
        let assembly = assembly();
        assert_eq!(assembly.stack_names(), vec!["First", "Second"]);
        assert!(assembly.stack("Second").is_some());
        assert!(assembly.stack("Third").is_none());
    }
}
