//! # Schema Compiler & Cache
//!
//! Compiles the schemas declared on a route table once and serves them to
//! every request validation without recompiling.
//!
//! ## Overview
//!
//! Each route declares up to five schemas (one per [`Surface`]) under
//! `settings.plugins.<plugin name>`. Registration extracts them, normalizes
//! them, checks them for JSON Schema well-formedness and compiles them into
//! [`jsonschema::Validator`] handles. The compiled handles are stored under a
//! [`SchemaKey`] of the form `surface:METHOD|path`.
//!
//! ## Normalization
//!
//! - **Headers**: every property name is lower-cased (recursively), since
//!   header names are case-insensitive on the wire.
//! - **Response**: only `response.schema` is compiled. A missing schema or a
//!   schema of type `void` registers nothing, so the response always passes.
//!   `sample` and `failAction` are stored as the route's [`ResponsePolicy`].
//! - **Payload**: file schemas are stored raw as [`CompiledSchema::File`];
//!   streams are checked by the file policy, not by the evaluator.
//!
//! ## Thread Safety
//!
//! The cache state is an immutable snapshot behind an [`ArcSwap`]:
//!
//! - Readers take a lock-free snapshot on every lookup
//! - Writers serialize on a registration mutex, compute the new state from
//!   the current snapshot and publish it with a single store
//! - A failed batch publishes nothing, so readers never see a half-registered
//!   route table
//!
//! ## Idempotence
//!
//! Routes already present are skipped, so registering the same table twice
//! compiles nothing the second time. [`SchemaCache::reset`] is the only way
//! to force recompilation.

mod normalize;

pub use normalize::*;

use crate::error::RegistrationError;
use crate::route::{RouteDescriptor, RouteKey, ResponsePolicy, ValidationOptions};
use crate::surface::Surface;
use arc_swap::ArcSwap;
use http::Method;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tracing::{debug, error, info};

/// Identity of one cached schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    pub surface: Surface,
    pub method: Method,
    pub path: String,
}

impl SchemaKey {
    pub fn new(surface: Surface, route: &RouteKey) -> Self {
        Self {
            surface,
            method: route.method.clone(),
            path: route.path.clone(),
        }
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}|{}", self.surface, self.method, self.path)
    }
}

/// A registered schema, ready for validation.
#[derive(Clone)]
pub enum CompiledSchema {
    /// Checked and compiled by the JSON Schema evaluator.
    Structural {
        raw: Value,
        validator: Arc<jsonschema::Validator>,
    },
    /// A payload schema declaring file content, held as written.
    File { raw: Value },
}

impl CompiledSchema {
    pub fn raw(&self) -> &Value {
        match self {
            CompiledSchema::Structural { raw, .. } | CompiledSchema::File { raw } => raw,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, CompiledSchema::File { .. })
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledSchema::Structural { raw, .. } => {
                f.debug_struct("Structural").field("raw", raw).finish_non_exhaustive()
            }
            CompiledSchema::File { raw } => f.debug_struct("File").field("raw", raw).finish(),
        }
    }
}

/// Counts produced by one [`SchemaCache::register_routes`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationSummary {
    /// Routes seen for the first time in this call.
    pub routes_registered: usize,
    /// Routes skipped because they were already registered.
    pub routes_skipped: usize,
    /// Schemas compiled by the evaluator.
    pub schemas_compiled: usize,
    /// File payload schemas stored raw.
    pub file_schemas: usize,
}

#[derive(Debug, Clone, Default)]
struct RouteEntry {
    schemas: BTreeMap<Surface, Arc<CompiledSchema>>,
    response_policy: Option<ResponsePolicy>,
}

#[derive(Debug, Clone, Default)]
struct CacheState {
    routes: HashMap<RouteKey, RouteEntry>,
}

struct CompileJob {
    key: SchemaKey,
    schema: Value,
}

/// Process-wide store of compiled route schemas.
///
/// Owned by one engine and shared by reference (usually through an `Arc`);
/// there is no global instance.
pub struct SchemaCache {
    state: ArcSwap<CacheState>,
    registration: Mutex<()>,
    generation: AtomicU64,
    parallel_compile: bool,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SchemaCache {
    /// Create an empty cache.
    ///
    /// # Arguments
    ///
    /// * `parallel_compile` - Compile a batch on scoped worker threads
    ///   instead of the calling thread
    pub fn new(parallel_compile: bool) -> Self {
        info!(parallel_compile, "Initializing route schema cache");
        Self {
            state: ArcSwap::from_pointee(CacheState::default()),
            registration: Mutex::new(()),
            generation: AtomicU64::new(0),
            parallel_compile,
        }
    }

    /// Register every route of `routes` not already present.
    ///
    /// Validation options are read from `settings.plugins.<plugin_name>`.
    /// Concurrent callers are serialized; the second caller sees the first
    /// caller's routes as already registered.
    ///
    /// # Errors
    ///
    /// The first malformed schema (in route order, then surface order) or
    /// malformed options entry aborts the batch. Nothing from a failed batch
    /// is published.
    pub fn register_routes(
        &self,
        routes: &[RouteDescriptor],
        plugin_name: &str,
    ) -> Result<RegistrationSummary, RegistrationError> {
        let _guard = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let current = self.state.load_full();

        let mut summary = RegistrationSummary::default();
        let mut seen: HashSet<RouteKey> = HashSet::new();
        let mut new_entries: HashMap<RouteKey, RouteEntry> = HashMap::new();
        let mut jobs: Vec<CompileJob> = Vec::new();
        let mut file_schemas: Vec<(SchemaKey, Value)> = Vec::new();

        for route in routes {
            let route_key = route.key();
            if current.routes.contains_key(&route_key) || !seen.insert(route_key.clone()) {
                debug!(route = %route_key, "Route already registered, skipping");
                summary.routes_skipped += 1;
                continue;
            }

            let options = route.validation_options(plugin_name).map_err(|e| {
                error!(route = %route_key, error = %e, "Malformed validation options");
                RegistrationError::MalformedOptions {
                    path: route.path.clone(),
                    method: route.method.clone(),
                    reason: e.to_string(),
                }
            })?;

            let mut entry = RouteEntry::default();
            let mut declared = 0;
            if let Some(options) = options {
                entry.response_policy = options.response.as_ref().map(|r| r.policy());
                for (surface, schema) in surface_schemas(&options) {
                    declared += 1;
                    let key = SchemaKey::new(surface, &route_key);
                    if surface == Surface::Payload && is_file_schema(&schema) {
                        file_schemas.push((key, schema));
                    } else {
                        jobs.push(CompileJob { key, schema });
                    }
                }
            }
            debug!(
                route = %route_key,
                schemas = declared,
                "Collected route schemas"
            );
            new_entries.insert(route_key, entry);
            summary.routes_registered += 1;
        }

        let compiled = self.compile_all(jobs)?;
        summary.schemas_compiled = compiled.len();
        summary.file_schemas = file_schemas.len();

        if new_entries.is_empty() {
            debug!(skipped = summary.routes_skipped, "No new routes to register");
            return Ok(summary);
        }

        let file_entries = file_schemas
            .into_iter()
            .map(|(key, raw)| (key, CompiledSchema::File { raw }));
        for (key, schema) in compiled.into_iter().chain(file_entries) {
            let route_key = RouteKey::new(key.method, key.path);
            if let Some(entry) = new_entries.get_mut(&route_key) {
                entry.schemas.insert(key.surface, Arc::new(schema));
            }
        }

        let mut next = CacheState::clone(&current);
        next.routes.extend(new_entries);
        self.state.store(Arc::new(next));

        info!(
            routes_registered = summary.routes_registered,
            routes_skipped = summary.routes_skipped,
            schemas_compiled = summary.schemas_compiled,
            file_schemas = summary.file_schemas,
            cache_size = self.size(),
            "Route schemas registered"
        );
        Ok(summary)
    }

    fn compile_all(&self, jobs: Vec<CompileJob>) -> Result<Vec<(SchemaKey, CompiledSchema)>, RegistrationError> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        let workers = if self.parallel_compile {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(jobs.len())
        } else {
            1
        };

        let results: Vec<Result<(SchemaKey, CompiledSchema), RegistrationError>> = if workers <= 1 {
            jobs.iter().map(compile_job).collect()
        } else {
            let chunk_size = jobs.len().div_ceil(workers);
            thread::scope(|scope| {
                let handles: Vec<_> = jobs
                    .chunks(chunk_size)
                    .map(|chunk| {
                        scope.spawn(move || {
                            chunk.iter().map(compile_job).collect::<Vec<_>>()
                        })
                    })
                    .collect();
                // Joining in spawn order keeps results in job order.
                let mut ordered = Vec::with_capacity(jobs.len());
                for handle in handles {
                    match handle.join() {
                        Ok(part) => ordered.extend(part),
                        Err(_) => ordered.push(Err(RegistrationError::WorkerPanicked)),
                    }
                }
                ordered
            })
        };

        results.into_iter().collect()
    }

    /// Look up the schema registered for `surface` on `route`.
    pub fn get(&self, surface: Surface, route: &RouteKey) -> Option<Arc<CompiledSchema>> {
        self.state
            .load()
            .routes
            .get(route)
            .and_then(|entry| entry.schemas.get(&surface))
            .cloned()
    }

    /// Sampling and fail-action policy of a route's response options.
    pub fn response_policy(&self, route: &RouteKey) -> Option<ResponsePolicy> {
        self.state
            .load()
            .routes
            .get(route)
            .and_then(|entry| entry.response_policy)
    }

    /// Whether `route` has been registered (with or without schemas).
    pub fn contains_route(&self, route: &RouteKey) -> bool {
        self.state.load().routes.contains_key(route)
    }

    /// Number of cached schemas across all routes and surfaces.
    pub fn size(&self) -> usize {
        self.state
            .load()
            .routes
            .values()
            .map(|entry| entry.schemas.len())
            .sum()
    }

    /// Number of registered routes.
    pub fn route_count(&self) -> usize {
        self.state.load().routes.len()
    }

    /// All cache keys, sorted by their display form.
    pub fn keys(&self) -> Vec<SchemaKey> {
        let state = self.state.load();
        let mut keys: Vec<SchemaKey> = state
            .routes
            .iter()
            .flat_map(|(route, entry)| entry.schemas.keys().map(move |s| SchemaKey::new(*s, route)))
            .collect();
        keys.sort_by_key(|k| k.to_string());
        keys
    }

    /// Bumped on every [`reset`](Self::reset).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Drop every registered route so the next registration compiles afresh.
    pub fn reset(&self) {
        let _guard = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let old_size = self.size();
        self.state.store(Arc::new(CacheState::default()));
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        info!(old_size, generation, "Route schema cache reset");
    }
}

impl fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCache")
            .field("routes", &self.route_count())
            .field("schemas", &self.size())
            .field("generation", &self.generation())
            .finish()
    }
}

/// The schemas a route declares, per surface, after normalization.
fn surface_schemas(options: &ValidationOptions) -> Vec<(Surface, Value)> {
    let mut out = Vec::new();
    for surface in Surface::ALL {
        let schema = match surface {
            Surface::Path => options.path.clone(),
            Surface::Query => options.query.clone(),
            Surface::Headers => options.headers.as_ref().map(lowercase_header_properties),
            Surface::Payload => options.payload.clone(),
            Surface::Response => {
                let schema = options.response.as_ref().and_then(|r| r.schema.as_ref());
                if is_void_response(schema) {
                    None
                } else {
                    schema.cloned()
                }
            }
        };
        if let Some(schema) = schema.filter(|s| !s.is_null()) {
            out.push((surface, schema));
        }
    }
    out
}

fn compile_job(job: &CompileJob) -> Result<(SchemaKey, CompiledSchema), RegistrationError> {
    match jsonschema::validator_for(&job.schema) {
        Ok(validator) => {
            debug!(key = %job.key, "Schema compiled");
            Ok((
                job.key.clone(),
                CompiledSchema::Structural {
                    raw: job.schema.clone(),
                    validator: Arc::new(validator),
                },
            ))
        }
        Err(e) => {
            error!(key = %job.key, error = %e, "Failed to compile JSON Schema");
            Err(RegistrationError::InvalidSchema {
                path: job.key.path.clone(),
                method: job.key.method.clone(),
                surface: job.key.surface,
                reason: e.to_string(),
            })
        }
    }
}
