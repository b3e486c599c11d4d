//! Business-type driven entry points
//!
//! [`EtlRunner`] ties configuration, connections and adapters together:
//! `run` moves one record stream for a business type, `replicate` copies
//! every matching table.

use crate::adapters::{AdapterRegistry, ExtractRequest, LoadRequest};
use crate::config::{ConfigResolver, Role};
use crate::database::ConnectionRegistry;
use crate::error::Result;
use crate::etl::{IdentityTransformer, Transformer, Value};
use crate::replication::{ReplicationEngine, ReplicationReport, ReplicationRequest};
use crate::storage::Input;
use crate::transform::ColumnMapper;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-invocation options for [`EtlRunner::run`]
///
/// Everything is optional; the business type's configuration fills the gaps.
#[derive(Default)]
pub struct RunOptions {
    /// Values for `:named` placeholders, overriding configured defaults
    pub parameters: BTreeMap<String, Value>,
    /// Replaces the configured transformer
    pub transformer: Option<Box<dyn Transformer>>,
    /// Override file merged over the base configuration
    pub override_file: Option<PathBuf>,
    /// Input for file-like sources
    pub input: Option<Input>,
    /// Output path for file sinks
    pub output: Option<PathBuf>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn transformer(mut self, transformer: impl Transformer + 'static) -> Self {
        self.transformer = Some(Box::new(transformer));
        self
    }

    pub fn override_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_file = Some(path.into());
        self
    }

    pub fn input(mut self, input: Input) -> Self {
        self.input = Some(input);
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }
}

/// Runs pipelines and replications for business types
pub struct EtlRunner {
    resolver: ConfigResolver,
    connections: Arc<ConnectionRegistry>,
    adapters: AdapterRegistry,
}

impl EtlRunner {
    pub fn new(
        resolver: ConfigResolver,
        connections: Arc<ConnectionRegistry>,
        adapters: AdapterRegistry,
    ) -> Self {
        Self {
            resolver,
            connections,
            adapters,
        }
    }

    /// Runner over a configuration directory
    ///
    /// Business types are read from `<dir>/<business_type>.yml` and databases
    /// from `<dir>/databases.yml`. The default adapters are registered.
    pub fn from_config_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self::new(
            ConfigResolver::new(dir),
            Arc::new(ConnectionRegistry::load(dir)?),
            AdapterRegistry::with_defaults(),
        ))
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    pub fn adapters_mut(&mut self) -> &mut AdapterRegistry {
        &mut self.adapters
    }

    /// Move one record stream for a business type
    ///
    /// Returns the number of records written
    ///
    /// # Errors
    /// `ConfigurationError` for missing or invalid configuration, otherwise
    /// the first error of the pipeline
    pub async fn run(&self, business_type: &str, options: RunOptions) -> Result<u64> {
        let override_file = options.override_file.as_deref();
        let extract = self.resolver.extract(business_type, override_file)?;
        let load = self.resolver.load(business_type, override_file)?;

        let transformer: Box<dyn Transformer> = match options.transformer {
            Some(transformer) => transformer,
            None if self.resolver.has_section(business_type, Role::Transform, override_file) => {
                let config = self.resolver.transform(business_type, override_file)?;
                Box::new(ColumnMapper::new(business_type, &config))
            }
            None => Box::new(IdentityTransformer),
        };

        log::info!(
            "Running '{}': {} -> {}",
            business_type,
            extract.kind,
            load.kind
        );

        let mut extractor = self
            .adapters
            .extractor(ExtractRequest {
                business_type: business_type.to_string(),
                config: extract,
                parameters: options.parameters,
                input: options.input,
                connections: self.connections.clone(),
            })
            .await?;
        let mut loader = self
            .adapters
            .loader(LoadRequest {
                business_type: business_type.to_string(),
                config: load,
                output: options.output,
                connections: self.connections.clone(),
            })
            .await?;

        loader.load(extractor.as_mut(), transformer.as_ref()).await
    }

    /// Replicate every table matching a business type's extract scope into
    /// its load database
    ///
    /// # Errors
    /// `ConfigurationError` for missing configuration, `ConnectionError` or
    /// an introspection error; per-table failures are in the report
    pub async fn replicate(
        &self,
        business_type: &str,
        override_file: Option<&Path>,
    ) -> Result<ReplicationReport> {
        let extract = self.resolver.extract(business_type, override_file)?;
        let load = self.resolver.load(business_type, override_file)?;
        let request = ReplicationRequest::from_configs(business_type, &extract, &load)?;

        log::info!(
            "Replicating '{}': {} -> {}",
            business_type,
            request.src_database,
            request.dest_database
        );
        ReplicationEngine::new(self.connections.clone())
            .tables_to_tables(&request)
            .await
    }
}
