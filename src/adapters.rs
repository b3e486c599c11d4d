//! Adapter selection by kind tag
//!
//! A business type's `extract.kind` and `load.kind` name the adapter that
//! reads or writes its records. [`AdapterRegistry::with_defaults`] knows
//! `database` and `ndjson`; callers can register their own kinds.

use crate::config::{ExtractConfig, LoadConfig};
use crate::database::{ConnectionRegistry, DatabaseExtractor, DatabaseLoader};
use crate::error::{EtlError, Result};
use crate::etl::{Extractor, Loader, Value};
use crate::storage::{NdjsonExtractor, NdjsonLoader};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

pub use crate::storage::Input;

/// Everything an extractor constructor may need
pub struct ExtractRequest {
    pub business_type: String,
    pub config: Arc<ExtractConfig>,
    /// Caller parameters, overriding `config.parameters`
    pub parameters: BTreeMap<String, Value>,
    pub input: Option<Input>,
    pub connections: Arc<ConnectionRegistry>,
}

/// Everything a loader constructor may need
pub struct LoadRequest {
    pub business_type: String,
    pub config: Arc<LoadConfig>,
    /// Caller output path, overriding `config.path`
    pub output: Option<PathBuf>,
    pub connections: Arc<ConnectionRegistry>,
}

type ExtractorFactory =
    Box<dyn Fn(ExtractRequest) -> BoxFuture<'static, Result<Box<dyn Extractor>>> + Send + Sync>;
type LoaderFactory =
    Box<dyn Fn(LoadRequest) -> BoxFuture<'static, Result<Box<dyn Loader>>> + Send + Sync>;

/// Kind tag to constructor mapping for extractors and loaders
#[derive(Default)]
pub struct AdapterRegistry {
    extractors: HashMap<String, ExtractorFactory>,
    loaders: HashMap<String, LoaderFactory>,
}

impl AdapterRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `database` and `ndjson` adapters
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_extractor("database", database_extractor);
        registry.register_extractor("ndjson", ndjson_extractor);
        registry.register_loader("database", database_loader);
        registry.register_loader("ndjson", ndjson_loader);
        registry
    }

    pub fn register_extractor<F, Fut>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(ExtractRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Box<dyn Extractor>>> + Send + 'static,
    {
        self.extractors
            .insert(kind.into(), Box::new(move |request| factory(request).boxed()));
    }

    pub fn register_loader<F, Fut>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(LoadRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Box<dyn Loader>>> + Send + 'static,
    {
        self.loaders
            .insert(kind.into(), Box::new(move |request| factory(request).boxed()));
    }

    /// Construct the extractor named by `request.config.kind`
    pub async fn extractor(&self, request: ExtractRequest) -> Result<Box<dyn Extractor>> {
        let factory = self.extractors.get(&request.config.kind).ok_or_else(|| {
            EtlError::configuration(
                &request.business_type,
                format!("unknown extract kind '{}'", request.config.kind),
            )
        })?;
        factory(request).await
    }

    /// Construct the loader named by `request.config.kind`
    pub async fn loader(&self, request: LoadRequest) -> Result<Box<dyn Loader>> {
        let factory = self.loaders.get(&request.config.kind).ok_or_else(|| {
            EtlError::configuration(
                &request.business_type,
                format!("unknown load kind '{}'", request.config.kind),
            )
        })?;
        factory(request).await
    }

    pub fn extractor_kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn loader_kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.loaders.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

fn required_database<'a>(business_type: &str, role: &str, name: Option<&'a str>) -> Result<&'a str> {
    name.ok_or_else(|| {
        EtlError::configuration(
            business_type,
            format!("{}.database is required for a database adapter", role),
        )
    })
}

async fn database_extractor(request: ExtractRequest) -> Result<Box<dyn Extractor>> {
    let name = required_database(&request.business_type, "extract", request.config.database.as_deref())?;
    let db = request.connections.database(name).await?;
    let extractor = DatabaseExtractor::from_config(
        db,
        &request.business_type,
        &request.config,
        &request.parameters,
    )?;
    Ok(Box::new(extractor))
}

async fn ndjson_extractor(request: ExtractRequest) -> Result<Box<dyn Extractor>> {
    let input = request.input.ok_or_else(|| {
        EtlError::configuration(&request.business_type, "an ndjson source needs an input")
    })?;
    Ok(Box::new(NdjsonExtractor::new(input)))
}

async fn database_loader(request: LoadRequest) -> Result<Box<dyn Loader>> {
    let name = required_database(&request.business_type, "load", request.config.database.as_deref())?;
    let db = request.connections.database(name).await?;
    let loader = DatabaseLoader::from_config(db, &request.business_type, &request.config)?;
    Ok(Box::new(loader))
}

async fn ndjson_loader(request: LoadRequest) -> Result<Box<dyn Loader>> {
    let path = request
        .output
        .or_else(|| request.config.path.clone())
        .ok_or_else(|| {
            EtlError::configuration(
                &request.business_type,
                "an ndjson sink needs load.path or an output path",
            )
        })?;
    Ok(Box::new(NdjsonLoader::new(path)))
}
