//! kubeui API: virtual resources served without a backing store.
//!
//! A [`Registry`] maps each kind to its backend. The [`Dispatcher`] gives every
//! kind the same `get`/`list`/`create` handling: verb checks, list options,
//! label filtering, the access gate for computations, and table conversion.

#![forbid(unsafe_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use kubeui_authz::Authorizer;
use kubeui_core::{ApiError, ApiResult, CreateOptions, GetOptions, ListOptions, ObjectList, RequestContext, Table, TableOptions};
use serde_json::Value;
use tracing::{info, warn};

pub mod backend;
pub mod body;
pub mod kinds;
pub mod registry;

pub use backend::{Backend, CatalogBackend, CatalogSource, CreateHandler, EnvelopeHandler, LookupSource, Page};
pub use body::{decode_body, BodyLimits};
pub use kinds::{standard, Deps};
pub use registry::{RegisteredKind, Registry, Verb};

pub struct Dispatcher {
    registry: Registry,
    authorizer: Option<Arc<dyn Authorizer>>,
}

fn labels_of(v: &Value) -> std::collections::BTreeMap<String, String> {
    v.pointer("/metadata/labels")
        .and_then(|l| l.as_object())
        .map(|m| m.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
        .unwrap_or_default()
}

async fn observe<T, F>(verb: Verb, resource: &str, name: &str, fut: F) -> ApiResult<T>
where
    F: Future<Output = ApiResult<T>>,
{
    let t0 = Instant::now();
    let res = fut.await;
    let took_ms = t0.elapsed().as_millis();
    metrics::counter!("kubeui_requests_total", 1, "verb" => verb.as_str(), "resource" => resource.to_string());
    metrics::histogram!("kubeui_request_ms", took_ms as f64, "verb" => verb.as_str());
    match &res {
        Ok(_) => info!(%verb, resource, name, took_ms = %took_ms, "api: ok"),
        Err(e) => {
            metrics::counter!(
                "kubeui_request_errors_total", 1,
                "verb" => verb.as_str(), "resource" => resource.to_string(), "reason" => e.reason().to_string()
            );
            warn!(%verb, resource, name, code = e.code(), error = %e, took_ms = %took_ms, "api: failed");
        }
    }
    res
}

impl Dispatcher {
    pub fn new(registry: Registry) -> Self { Self { registry, authorizer: None } }

    /// Gate computations that act on the caller's behalf.
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    pub fn registry(&self) -> &Registry { &self.registry }

    pub fn kind(&self, resource: &str) -> ApiResult<&Arc<RegisteredKind>> { self.registry.lookup(resource) }

    pub fn new_zero(&self, resource: &str) -> ApiResult<Value> { Ok(self.kind(resource)?.new_zero()) }

    pub fn new_zero_list(&self, resource: &str) -> ApiResult<ObjectList> { Ok(self.kind(resource)?.new_zero_list()) }

    pub async fn get(&self, ctx: &RequestContext, resource: &str, name: &str, _opts: &GetOptions) -> ApiResult<Value> {
        observe(Verb::Get, resource, name, async {
            let kind = self.kind(resource)?;
            if !kind.supports(Verb::Get) {
                return Err(kind.not_supported(Verb::Get));
            }
            let mut obj = match &kind.backend {
                Backend::Catalog(src) => src.get(name)?.ok_or_else(|| ApiError::not_found(kind.group(), &kind.plural, name))?,
                Backend::Lookup(src) => src.get(ctx, name).await?,
                Backend::Compute(_) => return Err(kind.not_supported(Verb::Get)),
            };
            kind.stamp(&mut obj);
            Ok(obj)
        })
        .await
    }

    pub async fn list(&self, ctx: &RequestContext, resource: &str, opts: &ListOptions) -> ApiResult<ObjectList> {
        observe(Verb::List, resource, "", async {
            let kind = self.kind(resource)?;
            if opts.watch {
                return Err(kind.not_supported(Verb::Watch));
            }
            if !kind.supports(Verb::List) {
                return Err(kind.not_supported(Verb::List));
            }
            if opts.has_field_selector() {
                return Err(ApiError::bad_request("fieldSelector is not supported"));
            }
            let selector = opts.selector()?;
            let mut list = kind.new_zero_list();
            match &kind.backend {
                Backend::Catalog(src) => {
                    let page = src.list(opts, &selector)?;
                    list.items = page.items;
                    list.metadata.continue_token = page.continue_token;
                }
                Backend::Lookup(src) => {
                    list.items = src.list(ctx).await?.into_iter().filter(|o| selector.matches(&labels_of(o))).collect();
                }
                Backend::Compute(_) => return Err(kind.not_supported(Verb::List)),
            }
            for it in list.items.iter_mut() {
                kind.stamp(it);
            }
            Ok(list)
        })
        .await
    }

    pub async fn create(&self, ctx: &RequestContext, resource: &str, body: Value, opts: &CreateOptions) -> ApiResult<Value> {
        let name = body.pointer("/metadata/name").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        observe(Verb::Create, resource, &name, async {
            let kind = self.kind(resource)?;
            let Backend::Compute(handler) = &kind.backend else { return Err(kind.not_supported(Verb::Create)) };
            if !kind.supports(Verb::Create) {
                return Err(kind.not_supported(Verb::Create));
            }
            if let Some(bad) = opts.dry_run.iter().find(|d| d.as_str() != "All") {
                return Err(ApiError::bad_request(format!("invalid dry run option {:?}", bad)));
            }
            handler.create(ctx, kind, body, self.authorizer.as_deref()).await
        })
        .await
    }

    /// Virtual resources have no change feed.
    pub async fn watch(&self, _ctx: &RequestContext, resource: &str, _opts: &ListOptions) -> ApiResult<()> {
        observe(Verb::Watch, resource, "", async {
            let kind = self.kind(resource)?;
            Err(kind.not_supported(Verb::Watch))
        })
        .await
    }

    pub fn convert_to_table(&self, resource: &str, obj: &Value, opts: &TableOptions) -> ApiResult<Table> {
        self.kind(resource)?.table.convert_to_table(obj, opts)
    }
}
