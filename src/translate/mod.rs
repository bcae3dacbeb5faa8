// ABOUTME: Configuration translator: user-facing config into resolved artifact specs.
// ABOUTME: Resolves catalog lookups, applies framework overrides, and renders user views.

use crate::artifact::{BuildSpec, DbSpec, ProxyLocation, ProxySpec, TlsMaterial};
use crate::catalog::Catalog;
use crate::config::{
    BuildInput, BuildProperty, DbInput, EnvPair, ProxyInput, ProxyLocationInput, TlsInput,
};
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::types::{ProjectName, PropertyKind, RuntimeProperty};
use nonempty::NonEmpty;
use serde::Serialize;

/// Translates between user-facing configuration and resolved specs, in both
/// directions. Holds only a catalog reference; all state is passed in.
pub struct Translator<'a> {
    catalog: &'a Catalog,
}

/// A Dockerfile to be written into the source tree at apply time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerfilePlan {
    /// Repository subdirectory the file belongs in.
    pub source_dir: String,
    pub content: String,
}

/// User-facing view of a resolved build spec.
#[derive(Debug, Clone, Serialize)]
pub struct BuildView {
    pub name: String,
    pub framework: String,
    pub version: String,
    pub properties: Vec<BuildProperty>,
    pub source_dir: String,
    pub build_dir: String,
    pub strategy: String,
    pub proxy_exposed: bool,
}

/// User-facing view of a resolved database spec.
#[derive(Debug, Clone, Serialize)]
pub struct DbView {
    pub name: String,
    pub framework: String,
    pub version: String,
    pub env: Vec<EnvPair>,
    pub port: Option<String>,
    pub dump_location: String,
}

impl<'a> Translator<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    // ------------------------------------------------------------------
    // Build targets
    // ------------------------------------------------------------------

    pub fn build_specs(&self, inputs: &[BuildInput]) -> Result<Vec<BuildSpec>> {
        inputs.iter().map(|input| self.build_spec(input)).collect()
    }

    pub fn build_spec(&self, input: &BuildInput) -> Result<BuildSpec> {
        let entry = self.catalog.entry(&input.framework)?;
        let tag = entry.tag_for_label(&input.version)?.to_string();

        // Frameworks with a fixed internal port pin the container side of
        // every property, whatever the user entered.
        let fixed_port = entry.fixed_internal_port.map(|p| p.to_string());
        let properties = input
            .properties
            .iter()
            .map(|p| {
                let container = fixed_port.clone().unwrap_or_else(|| p.value.clone());
                RuntimeProperty::new(p.kind, p.value.clone(), container)
            })
            .collect();

        Ok(BuildSpec {
            name: input.name.clone(),
            framework: entry.id.clone(),
            image: entry.image.clone(),
            tag,
            properties,
            source_dir: input.source_dir.clone(),
            build_dir: input.build_dir.clone(),
            strategy: input.strategy.clone(),
            proxy_exposed: input.proxy_exposed,
        })
    }

    /// Render a resolved build spec back into its user-facing form.
    /// `volume` properties are internal and never surface.
    pub fn build_view(&self, spec: &BuildSpec) -> Result<BuildView> {
        let entry = self.catalog.entry(&spec.framework)?;
        let version = entry.label_for_tag(&spec.tag)?.to_string();

        let properties = spec
            .properties
            .iter()
            .filter(|p| p.kind != PropertyKind::Volume)
            .map(|p| BuildProperty {
                kind: p.kind,
                value: p.host.clone(),
            })
            .collect();

        Ok(BuildView {
            name: spec.name.clone(),
            framework: spec.framework.clone(),
            version,
            properties,
            source_dir: spec.source_dir.clone(),
            build_dir: spec.build_dir.clone(),
            strategy: spec.strategy.clone(),
            proxy_exposed: spec.proxy_exposed,
        })
    }

    // ------------------------------------------------------------------
    // Database targets
    // ------------------------------------------------------------------

    pub fn db_specs(
        &self,
        project: &ProjectName,
        inputs: &[DbInput],
        layout: &Layout,
    ) -> Result<Vec<DbSpec>> {
        let mut specs = Vec::with_capacity(inputs.len());
        for input in inputs {
            if let Some(spec) = self.db_spec(project, input, layout)? {
                specs.push(spec);
            }
        }
        Ok(specs)
    }

    /// Assemble one database spec. Entries with a blank name, version, or
    /// port are incomplete form rows and are skipped.
    pub fn db_spec(
        &self,
        project: &ProjectName,
        input: &DbInput,
        layout: &Layout,
    ) -> Result<Option<DbSpec>> {
        if input.name.trim().is_empty()
            || input.version.trim().is_empty()
            || input.port.trim().is_empty()
        {
            tracing::debug!(name = %input.name, "skipping incomplete database entry");
            return Ok(None);
        }

        let entry = self.catalog.entry(&input.framework)?;
        let defaults = entry.database.as_ref().ok_or_else(|| {
            Error::Validation(format!("framework {} is not a database", entry.id))
        })?;
        let tag = entry.tag_for_label(&input.version)?.to_string();

        let mut properties: Vec<RuntimeProperty> = input
            .env
            .iter()
            .filter(|pair| !pair.is_empty())
            .map(|pair| RuntimeProperty::environment(pair.key.clone(), pair.value.clone()))
            .collect();

        properties.push(RuntimeProperty::publish(
            input.port.clone(),
            defaults.port.clone(),
        ));

        // Derived data volume; never shown back to the user.
        properties.push(RuntimeProperty::volume(
            layout.db_volume_dir(project, &input.name).display().to_string(),
            defaults.data_mount.clone(),
        ));

        for binding in &defaults.extra_volumes {
            properties.push(RuntimeProperty::volume(
                binding.host.clone(),
                binding.container.clone(),
            ));
        }

        let mut dump_location = String::new();
        if !input.dump_location.trim().is_empty() {
            let dump = layout.dump_path(project, &input.dump_location);
            dump_location = dump.display().to_string();
            properties.push(RuntimeProperty::volume(
                dump_location.clone(),
                defaults.init_mount.clone(),
            ));
        }

        Ok(Some(DbSpec {
            name: input.name.clone(),
            framework: entry.id.clone(),
            image: entry.image.clone(),
            tag,
            properties,
            dump_location,
            init_mount: Some(defaults.init_mount.clone()),
        }))
    }

    /// Render a resolved database spec back into its user-facing form.
    /// Drops `volume` and `publish` properties; the published host port is
    /// surfaced separately.
    pub fn db_view(
        &self,
        spec: &DbSpec,
        project: &ProjectName,
        layout: &Layout,
    ) -> Result<DbView> {
        let entry = self.catalog.entry(&spec.framework)?;
        let version = entry.label_for_tag(&spec.tag)?.to_string();

        let env = spec
            .properties
            .iter()
            .filter(|p| p.kind == PropertyKind::Environment)
            .map(|p| EnvPair {
                key: p.host.clone(),
                value: p.container.clone(),
            })
            .collect();

        let volume_prefix = layout.volume_dir(project).display().to_string();
        let dump_location = spec
            .dump_location
            .strip_prefix(&volume_prefix)
            .map(|s| s.trim_start_matches('/').to_string())
            .unwrap_or_else(|| spec.dump_location.clone());

        Ok(DbView {
            name: spec.name.clone(),
            framework: spec.framework.clone(),
            version,
            env,
            port: spec.host_port().map(str::to_string),
            dump_location,
        })
    }

    // ------------------------------------------------------------------
    // Proxy
    // ------------------------------------------------------------------

    /// Translate proxy input 1:1 into a resolved spec. Returns `None` when
    /// the input is empty (proxy category unconfigured).
    pub fn proxy_spec(&self, input: &ProxyInput) -> Result<Option<ProxySpec>> {
        if input.is_empty() {
            return Ok(None);
        }

        let domains = NonEmpty::from_vec(input.domains.clone())
            .ok_or_else(|| Error::Validation("proxy requires at least one domain".into()))?;

        let tls = input.tls.as_ref().map(|tls| TlsMaterial {
            certificate: tls.certificate.clone(),
            certificate_key: tls.certificate_key.clone(),
            asset_dir: tls.asset_dir.clone(),
        });

        if input.https {
            let valid = tls.as_ref().is_some_and(|t| {
                !t.certificate.trim().is_empty()
                    && !t.certificate_key.trim().is_empty()
                    && !t.asset_dir.trim().is_empty()
            });
            if !valid {
                return Err(Error::Validation(
                    "https proxy requires certificate, key, and asset directory".into(),
                ));
            }
        }

        Ok(Some(ProxySpec {
            domains,
            locations: input
                .locations
                .iter()
                .map(|l| ProxyLocation {
                    path: l.path.clone(),
                    upstream: l.upstream.clone(),
                })
                .collect(),
            https: input.https,
            tls,
            max_body_size_mb: input.max_body_size_mb,
        }))
    }

    /// Render a resolved proxy spec back into its user-facing form.
    pub fn proxy_view(&self, spec: &ProxySpec) -> ProxyInput {
        ProxyInput {
            domains: spec.domains.iter().cloned().collect(),
            locations: spec
                .locations
                .iter()
                .map(|l| ProxyLocationInput {
                    path: l.path.clone(),
                    upstream: l.upstream.clone(),
                })
                .collect(),
            https: spec.https,
            tls: spec.tls.as_ref().map(|t| TlsInput {
                certificate: t.certificate.clone(),
                certificate_key: t.certificate_key.clone(),
                asset_dir: t.asset_dir.clone(),
            }),
            max_body_size_mb: spec.max_body_size_mb,
        }
    }

    /// Rewrite the proxy-exposed build target so the proxy can reach it:
    /// its published container port becomes 80 (or 443 for https), and for
    /// https the TLS asset directory is bind-mounted in.
    ///
    /// Returns the exposed target's source directory, where the generated
    /// nginx config belongs.
    pub fn apply_proxy_exposure(
        &self,
        specs: &mut [BuildSpec],
        proxy: &ProxySpec,
    ) -> Result<String> {
        let flagged: Vec<usize> = specs
            .iter()
            .enumerate()
            .filter(|(_, s)| s.proxy_exposed)
            .map(|(i, _)| i)
            .collect();

        let index = match flagged.as_slice() {
            [] => {
                return Err(Error::Validation("no proxy-exposed build target".into()));
            }
            [index] => *index,
            _ => {
                return Err(Error::Validation(
                    "multiple proxy-exposed build targets".into(),
                ));
            }
        };

        let spec = &mut specs[index];
        let port = if proxy.https { "443" } else { "80" };

        if proxy.https && let Some(tls) = &proxy.tls {
            spec.properties.push(RuntimeProperty::volume(
                tls.asset_dir.clone(),
                tls.asset_dir.clone(),
            ));
        }

        for property in &mut spec.properties {
            if property.kind == PropertyKind::Publish {
                property.container = port.to_string();
            }
        }

        Ok(spec.source_dir.clone())
    }

    // ------------------------------------------------------------------
    // Dockerfiles
    // ------------------------------------------------------------------

    /// Resolve the Dockerfile templates for the given build specs.
    pub fn dockerfile_plans(&self, specs: &[BuildSpec]) -> Result<Vec<DockerfilePlan>> {
        let mut plans = Vec::new();
        for spec in specs {
            let entry = self.catalog.entry(&spec.framework)?;
            if let Some(template) = &entry.dockerfile {
                plans.push(DockerfilePlan {
                    source_dir: spec.source_dir.clone(),
                    content: template
                        .replace("{image}", &spec.image)
                        .replace("{tag}", &spec.tag)
                        .replace("{build_dir}", &spec.build_dir),
                });
            }
        }
        Ok(plans)
    }
}
