//! Maven plugin descriptors (`META-INF/maven/plugin.xml`).

use crate::error::{MavenError, Result};
use crate::xml_tree::{Document, Element};
use jvmdeps_core::{MojoDescriptor, MojoParameter, PluginDescriptor, RegistryClient, TtlCache};
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

pub const PLUGIN_DESCRIPTOR_ENTRY: &str = "META-INF/maven/plugin.xml";

/// Extracts `plugin.xml` from a plugin JAR.
pub fn read_descriptor_entry(artifact: &str, jar: &[u8]) -> Result<String> {
    let archive_error = |e: &dyn std::fmt::Display| MavenError::Archive {
        artifact: artifact.to_string(),
        message: e.to_string(),
    };

    let mut archive = zip::ZipArchive::new(Cursor::new(jar)).map_err(|e| archive_error(&e))?;
    let mut entry = archive
        .by_name(PLUGIN_DESCRIPTOR_ENTRY)
        .map_err(|e| archive_error(&e))?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(xml)
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    value.map_or(default, |v| v.eq_ignore_ascii_case("true"))
}

fn parse_mojo(mojo: &Element) -> Option<MojoDescriptor> {
    let goal = mojo.child_text("goal")?;
    let configuration = mojo.child("configuration");

    let parameters = mojo
        .child("parameters")
        .map(|params| {
            params
                .children_named("parameter")
                .filter_map(|param| {
                    let name = param.child_text("name")?;
                    let configured = configuration.and_then(|c| c.child(&name));
                    Some(MojoParameter {
                        type_name: param.child_text("type").unwrap_or_default(),
                        required: parse_bool(param.child_text("required"), false),
                        editable: parse_bool(param.child_text("editable"), true),
                        description: param.child_text("description"),
                        default_value: configured
                            .and_then(|c| c.get_attribute("default-value").map(str::to_string))
                            .or_else(|| param.child_text("defaultValue")),
                        expression: configured
                            .and_then(Element::text)
                            .or_else(|| param.child_text("expression")),
                        name,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(MojoDescriptor {
        goal,
        description: mojo.child_text("description"),
        default_phase: mojo.child_text("phase"),
        parameters,
    })
}

/// Parses a `plugin.xml` document.
pub fn parse_plugin_descriptor(xml: &str) -> Result<PluginDescriptor> {
    let doc = Document::parse(xml)?;
    let root = &doc.root;
    if root.name != "plugin" {
        return Err(MavenError::UnexpectedRoot {
            expected: "plugin".into(),
            found: root.name.clone(),
        });
    }

    let mojos = root
        .child("mojos")
        .map(|m| m.children_named("mojo").filter_map(parse_mojo).collect())
        .unwrap_or_default();

    Ok(PluginDescriptor {
        group_id: root.child_text("groupId").unwrap_or_default(),
        artifact_id: root.child_text("artifactId").unwrap_or_default(),
        version: root.child_text("version").unwrap_or_default(),
        goal_prefix: root.child_text("goalPrefix"),
        mojos,
    })
}

/// Downloads and caches plugin descriptors per `group:artifact:version`.
pub struct PluginDescriptorLoader {
    registry: Arc<dyn RegistryClient>,
    cache: TtlCache<String, Option<Arc<PluginDescriptor>>>,
}

impl PluginDescriptorLoader {
    pub fn new(registry: Arc<dyn RegistryClient>, ttl: Duration) -> Self {
        Self {
            registry,
            cache: TtlCache::new(ttl),
        }
    }

    /// Returns the descriptor, or `None` when the JAR is unavailable or
    /// carries no readable `plugin.xml`. Unreadable descriptors are cached
    /// as `None`; download failures are not.
    pub async fn load(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &str,
    ) -> Option<Arc<PluginDescriptor>> {
        let key = format!("{group_id}:{artifact_id}:{version}");
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let jar = match self
            .registry
            .download_artifact(group_id, artifact_id, version, None, "jar")
            .await
        {
            Ok(jar) => jar,
            Err(e) => {
                tracing::warn!("Failed to download plugin {}: {}", key, e);
                return None;
            }
        };

        let descriptor = read_descriptor_entry(&key, &jar)
            .and_then(|xml| parse_plugin_descriptor(&xml))
            .map(Arc::new)
            .map_err(|e| tracing::warn!("No usable descriptor in {}: {}", key, e))
            .ok();
        if let Some(d) = &descriptor {
            tracing::debug!("Loaded {} goals for {}", d.mojos.len(), key);
        }
        self.cache.insert(key, descriptor.clone());
        descriptor
    }

    pub fn cache(&self) -> &TtlCache<String, Option<Arc<PluginDescriptor>>> {
        &self.cache
    }
}
