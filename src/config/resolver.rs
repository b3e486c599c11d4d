//! Business-type configuration resolution with override files and an owned cache

use super::types::{ExtractConfig, LoadConfig, ResolvedConfig, Role, RoleConfig, TransformConfig};
use crate::error::{EtlError, Result};
use serde_yaml::Value as Yaml;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

/// Extensions tried for a business type's base file, in order
const EXTENSIONS: [&str; 3] = ["yml", "yaml", "json5"];

/// Identity of an override file as seen at resolve time
///
/// A changed modification time or length yields a new identity, so edited
/// override files are never served from a stale cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OverrideIdentity {
    path: PathBuf,
    modified: Option<SystemTime>,
    len: u64,
}

impl OverrideIdentity {
    /// Identify an override file; `None` when it cannot be read
    fn of(path: &Path) -> Option<Self> {
        let readable = std::fs::File::open(path)
            .and_then(|file| file.metadata())
            .ok()
            .filter(|meta| meta.is_file());

        match readable {
            Some(meta) => Some(Self {
                path: path.canonicalize().unwrap_or_else(|_| path.to_path_buf()),
                modified: meta.modified().ok(),
                len: meta.len(),
            }),
            None => {
                log::warn!(
                    "Override file {} is not readable, using base configuration",
                    path.display()
                );
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    business_type: String,
    role: Role,
    overrides: Option<OverrideIdentity>,
}

/// Resolves business-type configuration from a configuration directory
///
/// The base configuration of business type `orders` lives in
/// `<root>/orders.yml` (or `.yaml`, `.json5`) with optional `extract`,
/// `load` and `transform` sections. An override file with the same layout
/// takes precedence key by key.
///
/// # Example
/// ```no_run
/// use etl_relay::config::ConfigResolver;
/// use std::path::Path;
///
/// # fn example() -> etl_relay::Result<()> {
/// let resolver = ConfigResolver::new("config");
/// let load = resolver.load("orders", Some(Path::new("local.yml")))?;
/// println!("copying with {} threads", load.thread_count);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigResolver {
    root: PathBuf,
    cache: Mutex<HashMap<CacheKey, ResolvedConfig>>,
}

impl ConfigResolver {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The configuration directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the configuration of one role
    ///
    /// # Errors
    /// Returns a `ConfigurationError` when the business type has no base file,
    /// the file lacks the role's section, or the merged section is invalid
    pub fn resolve(
        &self,
        business_type: &str,
        role: Role,
        override_file: Option<&Path>,
    ) -> Result<ResolvedConfig> {
        match role {
            Role::Extract => self
                .get::<ExtractConfig>(business_type, override_file)
                .map(ExtractConfig::wrap),
            Role::Load => self
                .get::<LoadConfig>(business_type, override_file)
                .map(LoadConfig::wrap),
            Role::Transform => self
                .get::<TransformConfig>(business_type, override_file)
                .map(TransformConfig::wrap),
        }
    }

    pub fn extract(
        &self,
        business_type: &str,
        override_file: Option<&Path>,
    ) -> Result<Arc<ExtractConfig>> {
        self.get(business_type, override_file)
    }

    pub fn load(&self, business_type: &str, override_file: Option<&Path>) -> Result<Arc<LoadConfig>> {
        self.get(business_type, override_file)
    }

    pub fn transform(
        &self,
        business_type: &str,
        override_file: Option<&Path>,
    ) -> Result<Arc<TransformConfig>> {
        self.get(business_type, override_file)
    }

    /// Resolve a typed role configuration, consulting the cache first
    pub fn get<C: RoleConfig>(
        &self,
        business_type: &str,
        override_file: Option<&Path>,
    ) -> Result<Arc<C>> {
        let overrides = override_file.and_then(OverrideIdentity::of);
        let key = CacheKey {
            business_type: business_type.to_string(),
            role: C::ROLE,
            overrides,
        };

        if let Some(hit) = self.lock_cache().get(&key).and_then(C::unwrap) {
            log::debug!("Using cached {} configuration for '{}'", C::ROLE, business_type);
            return Ok(hit);
        }

        let (path, document) = self.base_document(business_type)?;
        let base = role_section(&document, C::ROLE);
        let over = match &key.overrides {
            Some(identity) => {
                let document = read_document(&identity.path)
                    .map_err(|e| EtlError::configuration(business_type, e))?;
                role_section(&document, C::ROLE).map(|section| (identity, section))
            }
            None => None,
        };

        let section = match (base, over) {
            (Some(mut section), Some((identity, over))) => {
                log::debug!(
                    "Applying {} overrides from {}",
                    C::ROLE,
                    identity.path.display()
                );
                merge(&mut section, over);
                section
            }
            (Some(section), None) => section,
            (None, Some((identity, over))) => {
                log::debug!("Using {} section of {}", C::ROLE, identity.path.display());
                over
            }
            (None, None) => {
                return Err(EtlError::configuration(
                    business_type,
                    format!("no '{}' section in {}", C::ROLE, path.display()),
                ));
            }
        };

        let config: C = serde_yaml::from_value(section).map_err(|e| {
            EtlError::configuration(business_type, format!("invalid {} section: {}", C::ROLE, e))
        })?;
        config
            .validate()
            .map_err(|e| EtlError::configuration(business_type, e))?;
        let config = Arc::new(config);

        let mut cache = self.lock_cache();
        if let Some(identity) = &key.overrides {
            // Entries for an earlier version of the same override file are stale
            cache.retain(|k, _| {
                !(k.business_type == key.business_type
                    && k.role == key.role
                    && k.overrides
                        .as_ref()
                        .is_some_and(|o| o.path == identity.path && o != identity))
            });
        }
        cache.insert(key, C::wrap(config.clone()));

        Ok(config)
    }

    /// Drop every cached configuration
    pub fn invalidate(&self) {
        self.lock_cache().clear();
    }

    /// Path of the base file for a business type, if one exists
    pub fn base_path(&self, business_type: &str) -> Option<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{}.{}", business_type, ext)))
            .find(|path| path.is_file())
    }

    /// Whether the base file or the override file declares a role's section
    ///
    /// An unreadable override counts as absent, as it does when merging.
    pub fn has_section(&self, business_type: &str, role: Role, override_file: Option<&Path>) -> bool {
        self.base_path(business_type)
            .into_iter()
            .chain(override_file.map(Path::to_path_buf))
            .filter_map(|path| read_document(&path).ok())
            .any(|document| role_section(&document, role).is_some())
    }

    fn base_document(&self, business_type: &str) -> Result<(PathBuf, Yaml)> {
        let path = self.base_path(business_type).ok_or_else(|| {
            EtlError::configuration(
                business_type,
                format!("no configuration file in {}", self.root.display()),
            )
        })?;
        let document =
            read_document(&path).map_err(|e| EtlError::configuration(business_type, e))?;
        Ok((path, document))
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<CacheKey, ResolvedConfig>> {
        // Cache entries are immutable values, so a poisoned lock is still consistent
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Read a YAML or JSON5 document into a YAML value
fn read_document(path: &Path) -> std::result::Result<Yaml, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;

    let is_json5 = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json5"));

    if is_json5 {
        let json: serde_json::Value = json5::from_str(&content)
            .map_err(|e| format!("failed to parse {}: {}", path.display(), e))?;
        serde_yaml::to_value(json).map_err(|e| format!("failed to convert {}: {}", path.display(), e))
    } else {
        serde_yaml::from_str(&content)
            .map_err(|e| format!("failed to parse {}: {}", path.display(), e))
    }
}

/// The role's section; an explicitly empty section counts as present
fn role_section(document: &Yaml, role: Role) -> Option<Yaml> {
    match document.get(role.section()) {
        Some(Yaml::Null) => Some(Yaml::Mapping(serde_yaml::Mapping::new())),
        other => other.cloned(),
    }
}

/// Merge `over` into `base` key by key; nested mappings merge, anything else replaces
fn merge(base: &mut Yaml, over: Yaml) {
    match (base, over) {
        (Yaml::Mapping(base), Yaml::Mapping(over)) => {
            for (key, value) in over {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, over) => *base = over,
    }
}
