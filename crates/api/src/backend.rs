//! What sits behind a registered kind: a catalog read, a computation, or a
//! lookup against the cluster.

use std::sync::Arc;

use async_trait::async_trait;
use kubeui_authz::{check_access, Authorizer};
use kubeui_catalog::{Catalog, CatalogEntry, CatalogError};
use kubeui_core::options::encode_continue;
use kubeui_core::{ApiError, ApiRequestObject, ApiResult, Compute, ListOptions, RequestContext, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::registry::{RegisteredKind, Verb};

pub enum Backend {
    /// Pageable, label-filtered reads over an embedded catalog.
    Catalog(Arc<dyn CatalogSource>),
    /// `create` runs a computation.
    Compute(Arc<dyn CreateHandler>),
    /// `get`/`list` computed from the cluster on each request.
    Lookup(Arc<dyn LookupSource>),
}

impl Backend {
    pub fn default_verbs(&self) -> &'static [Verb] {
        match self {
            Backend::Catalog(_) | Backend::Lookup(_) => &[Verb::Get, Verb::List],
            Backend::Compute(_) => &[Verb::Create],
        }
    }
}

/// One page of a catalog listing plus the token for the next one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub continue_token: Option<String>,
}

pub trait CatalogSource: Send + Sync {
    fn list(&self, opts: &ListOptions, selector: &Selector) -> ApiResult<Page>;

    /// `None` on a miss.
    fn get(&self, name: &str) -> ApiResult<Option<Value>>;
}

type Render<T> = Box<dyn Fn(&T) -> Result<Value, CatalogError> + Send + Sync>;

/// A [`Catalog`] served as-is, or through a per-entry transformation.
pub struct CatalogBackend<T: CatalogEntry> {
    catalog: &'static Catalog<T>,
    render: Render<T>,
}

fn serialize<T: CatalogEntry>(entry: &T) -> Result<Value, CatalogError> {
    serde_json::to_value(entry).map_err(|e| CatalogError::Decode { path: entry.name().to_string(), message: e.to_string() })
}

impl<T: CatalogEntry> CatalogBackend<T> {
    pub fn new(catalog: &'static Catalog<T>) -> Self { Self { catalog, render: Box::new(serialize::<T>) } }

    pub fn with_render(catalog: &'static Catalog<T>, render: impl Fn(&T) -> Result<Value, CatalogError> + Send + Sync + 'static) -> Self {
        Self { catalog, render: Box::new(render) }
    }

    fn render(&self, entry: &T) -> ApiResult<Value> { (self.render)(entry).map_err(ApiError::internal) }
}

/// Slice from the continue offset, truncate to the limit, then filter by label.
/// The token is an absolute offset into `entries`.
pub fn paginate<'a, T: CatalogEntry>(entries: &'a [T], opts: &ListOptions, selector: &Selector) -> ApiResult<(Vec<&'a T>, Option<String>)> {
    let start = opts.start()?;
    if start > entries.len() {
        return Ok((Vec::new(), None));
    }
    let mut window = &entries[start..];
    let mut next = None;
    let limit = opts.page_size();
    if limit > 0 && window.len() > limit {
        window = &window[..limit];
        next = Some(encode_continue(start + limit));
    }
    Ok((window.iter().filter(|e| selector.matches(e.labels())).collect(), next))
}

impl<T: CatalogEntry> CatalogSource for CatalogBackend<T> {
    fn list(&self, opts: &ListOptions, selector: &Selector) -> ApiResult<Page> {
        let (entries, continue_token) = paginate(self.catalog.list(), opts, selector)?;
        let items = entries.into_iter().map(|e| self.render(e)).collect::<ApiResult<Vec<_>>>()?;
        Ok(Page { items, continue_token })
    }

    fn get(&self, name: &str) -> ApiResult<Option<Value>> {
        match self.catalog.load_by_name(name) {
            Ok(entry) => self.render(entry).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(ApiError::internal(e)),
        }
    }
}

#[async_trait]
pub trait LookupSource: Send + Sync {
    async fn get(&self, ctx: &RequestContext, name: &str) -> ApiResult<Value>;

    /// Every object; only called for kinds that serve `list`.
    async fn list(&self, _ctx: &RequestContext) -> ApiResult<Vec<Value>> { Ok(Vec::new()) }
}

#[async_trait]
pub trait CreateHandler: Send + Sync {
    /// `authz` is `None` when no authorizer is configured; gated handlers then run unchecked.
    async fn create(&self, ctx: &RequestContext, kind: &RegisteredKind, body: Value, authz: Option<&dyn Authorizer>) -> ApiResult<Value>;
}

/// Runs a [`Compute`] over the `{request, response}` envelope.
pub struct EnvelopeHandler<C> {
    compute: C,
}

impl<C> EnvelopeHandler<C> {
    pub fn new(compute: C) -> Self { Self { compute } }
}

/// Reject bodies that name a different kind than the one addressed.
pub(crate) fn check_type_meta(kind: &RegisteredKind, body: &Value) -> ApiResult<()> {
    if !body.is_object() {
        return Err(ApiError::bad_request(format!("expected a {} object", kind.gvk.kind)));
    }
    let field = |name: &str| body.get(name).and_then(|v| v.as_str()).unwrap_or_default();
    let (api_version, k) = (field("apiVersion"), field("kind"));
    if (!api_version.is_empty() && api_version != kind.gvk.api_version()) || (!k.is_empty() && k != kind.gvk.kind) {
        return Err(ApiError::bad_request(format!(
            "expected {} {}, got {} {}",
            kind.gvk.api_version(),
            kind.gvk.kind,
            api_version,
            k
        )));
    }
    Ok(())
}

#[async_trait]
impl<C: Compute> CreateHandler for EnvelopeHandler<C> {
    async fn create(&self, ctx: &RequestContext, kind: &RegisteredKind, body: Value, authz: Option<&dyn Authorizer>) -> ApiResult<Value> {
        check_type_meta(kind, &body)?;
        let envelope = ApiRequestObject::<C::Request, C::Response>::deserialize(&body)
            .map_err(|e| ApiError::bad_request(format!("decode {}: {}", kind.gvk.kind, e)))?;
        let req = envelope.request.ok_or_else(|| ApiError::bad_request("missing apirequest"))?;

        if let Some(target) = self.compute.access_target(ctx, &req).await? {
            match authz {
                Some(a) => check_access(a, ctx, &target).await?,
                None => debug!(verb = %target.verb, resource = %target.resource, "api: no authorizer, access check skipped"),
            }
        }
        let resp = self.compute.compute(ctx, req).await?;

        let mut out = body;
        kind.stamp(&mut out);
        if let Some(map) = out.as_object_mut() {
            map.insert("response".into(), serde_json::to_value(resp)?);
        }
        Ok(out)
    }
}
