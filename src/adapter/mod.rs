// ABOUTME: Translates resolved specs into ordered container-engine command sequences.
// ABOUTME: Ordering is the contract: database group before application group, list order within.

use crate::artifact::{BuildSpec, DbSpec};
use crate::types::{ProjectName, PropertyKind, RuntimeProperty};
use std::path::PathBuf;

pub const DEFAULT_ENGINE: &str = "docker";

/// Builds command strings for one deployment's containers. The engine
/// binary name is a parameter so the commands stay runtime-agnostic.
#[derive(Debug, Clone)]
pub struct EngineAdapter {
    engine: String,
    project: ProjectName,
    repo_dir: PathBuf,
}

impl EngineAdapter {
    pub fn new(project: ProjectName, repo_dir: impl Into<PathBuf>) -> Self {
        Self::with_engine(DEFAULT_ENGINE, project, repo_dir)
    }

    pub fn with_engine(engine: &str, project: ProjectName, repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine: engine.to_string(),
            project,
            repo_dir: repo_dir.into(),
        }
    }

    /// The dedicated network every container of this deployment joins.
    pub fn network_name(&self) -> &str {
        self.project.as_str()
    }

    /// Issued once per configuration submission, independent of build cycles.
    pub fn create_network_command(&self) -> String {
        format!("{} network create {}", self.engine, self.network_name())
    }

    /// One image build per spec, in list order.
    pub fn build_commands(&self, specs: &[BuildSpec]) -> Vec<String> {
        specs
            .iter()
            .map(|spec| {
                let context = self.repo_dir.join(&spec.source_dir);
                format!(
                    "{} build -t {} {}",
                    self.engine,
                    spec.container_name(&self.project),
                    context.display()
                )
            })
            .collect()
    }

    /// Run commands for application containers. The image was built locally,
    /// so no explicit tag is attached.
    pub fn run_app_commands(&self, specs: &[BuildSpec]) -> Vec<String> {
        specs
            .iter()
            .map(|spec| {
                let name = spec.container_name(&self.project);
                self.run_command(&name, &spec.properties, &name)
            })
            .collect()
    }

    /// Run commands for database containers, pulling `image:tag` from the
    /// registry.
    pub fn run_db_commands(&self, specs: &[DbSpec]) -> Vec<String> {
        specs
            .iter()
            .map(|spec| {
                let image = format!("{}:{}", spec.image, spec.tag);
                self.run_command(&spec.container_name(&self.project), &spec.properties, &image)
            })
            .collect()
    }

    /// Stop commands: database group first, then application group.
    pub fn stop_commands(&self, databases: &[DbSpec], builds: &[BuildSpec]) -> Vec<String> {
        self.grouped_commands("stop", databases, builds)
    }

    /// Remove commands: database group first, then application group.
    pub fn remove_commands(&self, databases: &[DbSpec], builds: &[BuildSpec]) -> Vec<String> {
        self.grouped_commands("rm -f", databases, builds)
    }

    pub fn remove_db_commands(&self, specs: &[DbSpec]) -> Vec<String> {
        specs
            .iter()
            .map(|s| self.container_command("rm -f", &s.container_name(&self.project)))
            .collect()
    }

    pub fn remove_app_commands(&self, specs: &[BuildSpec]) -> Vec<String> {
        specs
            .iter()
            .map(|s| self.container_command("rm -f", &s.container_name(&self.project)))
            .collect()
    }

    fn grouped_commands(
        &self,
        verb: &str,
        databases: &[DbSpec],
        builds: &[BuildSpec],
    ) -> Vec<String> {
        let mut commands: Vec<String> = databases
            .iter()
            .map(|s| self.container_command(verb, &s.container_name(&self.project)))
            .collect();
        commands.extend(
            builds
                .iter()
                .map(|s| self.container_command(verb, &s.container_name(&self.project))),
        );
        commands
    }

    fn container_command(&self, verb: &str, name: &str) -> String {
        format!("{} {verb} {name}", self.engine)
    }

    fn run_command(&self, name: &str, properties: &[RuntimeProperty], image: &str) -> String {
        let mut parts = vec![
            self.engine.clone(),
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            name.to_string(),
            "--network".to_string(),
            self.network_name().to_string(),
        ];
        parts.extend(property_flags(properties));
        parts.push(image.to_string());
        parts.join(" ")
    }
}

/// Encode runtime properties as engine flags: `volume` as a bind mount,
/// `publish` as a port mapping, `environment` as a key=value pair.
fn property_flags(properties: &[RuntimeProperty]) -> Vec<String> {
    let mut flags = Vec::with_capacity(properties.len() * 2);
    for property in properties {
        match property.kind {
            PropertyKind::Volume => {
                flags.push("-v".to_string());
                flags.push(format!("{}:{}", property.host, property.container));
            }
            PropertyKind::Publish => {
                flags.push("-p".to_string());
                flags.push(format!("{}:{}", property.host, property.container));
            }
            PropertyKind::Environment => {
                flags.push("-e".to_string());
                flags.push(format!("{}={}", property.host, property.container));
            }
        }
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> EngineAdapter {
        EngineAdapter::new(ProjectName::new("shop").unwrap(), "/data/shop/repo")
    }

    fn db_spec() -> DbSpec {
        DbSpec {
            name: "shopdb".into(),
            framework: "mysql".into(),
            image: "mysql".into(),
            tag: "8.0".into(),
            properties: vec![
                RuntimeProperty::environment("MYSQL_ROOT_PASSWORD", "secret"),
                RuntimeProperty::publish("3306", "3306"),
                RuntimeProperty::volume("/data/volumes/shop/shopdb", "/var/lib/mysql"),
            ],
            dump_location: String::new(),
            init_mount: None,
        }
    }

    #[test]
    fn run_db_command_encodes_all_flags() {
        let commands = adapter().run_db_commands(&[db_spec()]);
        assert_eq!(
            commands,
            vec![
                "docker run -d --name shop-shopdb --network shop \
                 -e MYSQL_ROOT_PASSWORD=secret -p 3306:3306 \
                 -v /data/volumes/shop/shopdb:/var/lib/mysql mysql:8.0"
            ]
        );
    }

    #[test]
    fn build_command_points_at_source_dir() {
        let spec = BuildSpec {
            name: "api".into(),
            framework: "spring-boot".into(),
            image: "openjdk".into(),
            tag: "17-jdk".into(),
            properties: vec![],
            source_dir: "backend".into(),
            build_dir: "build/libs".into(),
            strategy: "dockerfile".into(),
            proxy_exposed: false,
        };
        let commands = adapter().build_commands(&[spec]);
        assert_eq!(
            commands,
            vec!["docker build -t shop-api /data/shop/repo/backend"]
        );
    }

    #[test]
    fn grouped_removal_puts_databases_first() {
        let build = BuildSpec {
            name: "api".into(),
            framework: "spring-boot".into(),
            image: "openjdk".into(),
            tag: "17-jdk".into(),
            properties: vec![],
            source_dir: String::new(),
            build_dir: String::new(),
            strategy: "dockerfile".into(),
            proxy_exposed: false,
        };
        let commands = adapter().remove_commands(&[db_spec()], &[build]);
        assert_eq!(
            commands,
            vec!["docker rm -f shop-shopdb", "docker rm -f shop-api"]
        );
    }

    #[test]
    fn network_create_uses_project_name() {
        assert_eq!(
            adapter().create_network_command(),
            "docker network create shop"
        );
    }

    #[test]
    fn alternate_engine_binary_is_respected() {
        let adapter =
            EngineAdapter::with_engine("podman", ProjectName::new("shop").unwrap(), "/r");
        assert_eq!(adapter.create_network_command(), "podman network create shop");
        assert_eq!(
            adapter.stop_commands(&[db_spec()], &[]),
            vec!["podman stop shop-shopdb"]
        );
    }
}
