use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use kubeui_api::{Backend, CatalogBackend, Dispatcher, EnvelopeHandler, RegisteredKind, Registry};
use kubeui_authz::{Attributes, Authorizer, LocalAuthorizer, RbacPolicy, TieredAuthorizer, Verdict};
use kubeui_catalog::{Catalog, ResourceDescriptor};
use kubeui_compute::{RenderSection, ResourceCalculator};
use kubeui_core::{ApiError, CreateOptions, GetOptions, GroupVersionKind, ListOptions, RequestContext, UserInfo};
use kubeui_kubehub::MockCluster;
use serde_json::{json, Value};

const TIERS: [(&str, &str); 5] = [("a", "gold"), ("b", "silver"), ("c", "gold"), ("d", "bronze"), ("e", "gold")];

fn five_entry_catalog() -> &'static Catalog<ResourceDescriptor> {
    let docs: Vec<(String, String)> = TIERS
        .iter()
        .map(|(name, tier)| {
            (
                format!("{name}.yaml"),
                format!(
                    "apiVersion: meta.kubeui.dev/v1alpha1\nkind: ResourceDescriptor\nmetadata:\n  name: {name}\n  labels:\n    tier: {tier}\nspec:\n  resource: {{version: v1, name: {name}s, kind: K}}\n"
                ),
            )
        })
        .collect();
    Box::leak(Box::new(Catalog::from_documents(docs).unwrap()))
}

/// Counts how often it is consulted.
struct Counting {
    verdict: Verdict,
    calls: AtomicUsize,
}

impl Counting {
    fn new(verdict: Verdict) -> Arc<Self> { Arc::new(Self { verdict, calls: AtomicUsize::new(0) }) }
}

#[async_trait]
impl Authorizer for Counting {
    async fn authorize(&self, _ctx: &RequestContext, _attrs: &Attributes) -> Verdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict.clone()
    }
}

fn registry() -> Registry {
    let meta = |kind: &str| GroupVersionKind::gvk("meta.kubeui.dev", "v1alpha1", kind);
    let mut r = Registry::new();
    r.register(RegisteredKind::new(
        meta("ResourceDescriptor"),
        "resourcedescriptors",
        Backend::Catalog(Arc::new(CatalogBackend::new(five_entry_catalog()))),
    ))
    .unwrap();
    r.register(RegisteredKind::new(meta("RenderSection"), "rendersections", Backend::Compute(Arc::new(EnvelopeHandler::new(RenderSection)))))
        .unwrap();
    let calc = ResourceCalculator::new(Arc::new(MockCluster::new()), kubeui_resmetrics::Registry::builtin());
    r.register(RegisteredKind::new(meta("ResourceCalculator"), "resourcecalculators", Backend::Compute(Arc::new(EnvelopeHandler::new(calc)))))
        .unwrap();
    r
}

fn ctx() -> RequestContext { RequestContext::new(UserInfo::new("alice").with_groups(["devs"])) }

async fn names(d: &Dispatcher, opts: &ListOptions) -> (Vec<String>, Option<String>) {
    let list = d.list(&ctx(), "resourcedescriptors", opts).await.unwrap();
    (list.names(), list.continue_token().map(str::to_string))
}

#[tokio::test]
async fn pages_through_five_entries_two_at_a_time() {
    let d = Dispatcher::new(registry());
    let page = |c: &str| ListOptions::default().with_limit(2).with_continue(c);
    assert_eq!(names(&d, &page("")).await, (vec!["a".into(), "b".into()], Some("2".into())));
    assert_eq!(names(&d, &page("2")).await, (vec!["c".into(), "d".into()], Some("4".into())));
    assert_eq!(names(&d, &page("4")).await, (vec!["e".into()], None));
    assert_eq!(names(&d, &page("5")).await, (vec![], None));
}

#[tokio::test]
async fn malformed_continue_is_bad_request() {
    let d = Dispatcher::new(registry());
    let err = d.list(&ctx(), "resourcedescriptors", &ListOptions::default().with_continue("xyz")).await.unwrap_err();
    assert_eq!(err.code(), 400);
    assert!(err.to_string().starts_with("invalid continue option"), "{err}");
}

#[tokio::test]
async fn following_tokens_yields_the_filtered_catalog() {
    let d = Dispatcher::new(registry());
    for selector in ["", "tier=gold", "tier!=gold", "tier in (silver,bronze)", "!tier"] {
        let expected: Vec<String> = TIERS
            .iter()
            .filter(|(_, tier)| {
                let labels = std::collections::BTreeMap::from([("tier".to_string(), tier.to_string())]);
                selector.parse::<kubeui_core::Selector>().unwrap().matches(&labels)
            })
            .map(|(n, _)| n.to_string())
            .collect();
        for limit in 1..=6 {
            let mut seen = Vec::new();
            let mut token = String::new();
            loop {
                let opts = ListOptions::default().with_labels(selector).with_limit(limit).with_continue(token.clone());
                let (page, next) = names(&d, &opts).await;
                seen.extend(page);
                match next {
                    Some(t) => token = t,
                    None => break,
                }
            }
            assert_eq!(seen, expected, "selector {selector:?} limit {limit}");
        }
    }
}

#[tokio::test]
async fn field_selectors_and_watch_are_rejected() {
    let d = Dispatcher::new(registry());
    let mut opts = ListOptions::default();
    opts.field_selector = Some("metadata.name=a".into());
    let err = d.list(&ctx(), "resourcedescriptors", &opts).await.unwrap_err();
    assert_eq!(err, ApiError::bad_request("fieldSelector is not supported"));

    let err = d.watch(&ctx(), "resourcedescriptors", &ListOptions::default()).await.unwrap_err();
    assert_eq!(err.code(), 405);
    let err = d.list(&ctx(), "rendersections", &ListOptions::default()).await.unwrap_err();
    assert_eq!(err.code(), 405);
}

#[tokio::test]
async fn catalog_get_hits_and_misses() {
    let d = Dispatcher::new(registry());
    let obj = d.get(&ctx(), "resourcedescriptors", "c", &GetOptions::default()).await.unwrap();
    assert_eq!(obj["metadata"]["labels"]["tier"], "gold");
    let err = d.get(&ctx(), "resourcedescriptors", "zzz", &GetOptions::default()).await.unwrap_err();
    assert_eq!(err, ApiError::not_found("meta.kubeui.dev", "resourcedescriptors", "zzz"));
}

#[tokio::test]
async fn create_without_request_is_bad_request() {
    let d = Dispatcher::new(registry());
    for resource in ["rendersections", "resourcecalculators"] {
        let body = json!({"apiVersion": "meta.kubeui.dev/v1alpha1", "kind": d.kind(resource).unwrap().gvk.kind});
        let err = d.create(&ctx(), resource, body, &CreateOptions::default()).await.unwrap_err();
        assert_eq!(err, ApiError::bad_request("missing apirequest"), "{resource}");
    }
}

#[tokio::test]
async fn create_sets_the_response() {
    let d = Dispatcher::new(registry());
    let body = json!({"request": {"title": "Overview"}});
    let out = d.create(&ctx(), "rendersections", body, &CreateOptions::default()).await.unwrap();
    assert_eq!(out["response"], json!({"title": "Overview"}));
    assert_eq!(out["kind"], "RenderSection");

    let wrong = json!({"apiVersion": "v1", "kind": "ConfigMap", "request": {}});
    assert_eq!(d.create(&ctx(), "rendersections", wrong, &CreateOptions::default()).await.unwrap_err().code(), 400);
}

fn calculator_body(raw: Value) -> Value {
    json!({"apiVersion": "meta.kubeui.dev/v1alpha1", "kind": "ResourceCalculator", "request": {"resource": raw}})
}

#[tokio::test]
async fn calculator_falls_through_for_unregistered_kinds() {
    let d = Dispatcher::new(registry());
    let body = calculator_body(json!({"apiVersion": "v1", "kind": "ConfigMap", "spec": {"version": "1.2"}}));
    let out = d.create(&ctx(), "resourcecalculators", body, &CreateOptions::default()).await.unwrap();
    assert_eq!(out["response"]["apiType"]["kind"], "ConfigMap");
    assert_eq!(out["response"]["version"], "1.2");
    assert_eq!(out["response"].as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn calculator_rejects_out_of_range_quantities() {
    let d = Dispatcher::new(registry());
    let pod = json!({
        "apiVersion": "v1", "kind": "Pod", "metadata": {"name": "p", "namespace": "shop"},
        "spec": {"containers": [{"name": "c", "resources": {"requests": {"cpu": "1.5e2147483647"}}}]}
    });
    let err = d.create(&ctx(), "resourcecalculators", calculator_body(pod), &CreateOptions::default()).await.unwrap_err();
    assert_eq!(err.code(), 400);
    assert!(err.to_string().contains("out of range"), "{err}");
}

#[tokio::test]
async fn calculator_is_gated_on_create_access() {
    let deployment = json!({"apiVersion": "apps/v1", "kind": "Deployment", "metadata": {"name": "web", "namespace": "shop"}, "spec": {}});

    let local = Counting::new(Verdict::deny("frozen namespace"));
    let remote = Counting::new(Verdict::allow(""));
    let tiered = TieredAuthorizer::new(local.clone(), Some(remote.clone() as Arc<dyn Authorizer>));
    let d = Dispatcher::new(registry()).with_authorizer(Arc::new(tiered));
    let err = d.create(&ctx(), "resourcecalculators", calculator_body(deployment.clone()), &CreateOptions::default()).await.unwrap_err();
    assert_eq!(err.code(), 403);
    assert!(err.to_string().contains("frozen namespace"));
    assert_eq!((local.calls.load(Ordering::SeqCst), remote.calls.load(Ordering::SeqCst)), (1, 0));

    let local = Counting::new(Verdict::no_opinion());
    let remote = Counting::new(Verdict::allow(""));
    let tiered = TieredAuthorizer::new(local.clone(), Some(remote.clone() as Arc<dyn Authorizer>));
    let d = Dispatcher::new(registry()).with_authorizer(Arc::new(tiered));
    let out = d.create(&ctx(), "resourcecalculators", calculator_body(deployment.clone()), &CreateOptions::default()).await.unwrap();
    assert_eq!(out["response"]["replicas"], 1);
    assert_eq!(remote.calls.load(Ordering::SeqCst), 1);

    // system:masters short-circuits in the local policy
    let local = Arc::new(LocalAuthorizer::new(RbacPolicy::default()));
    let remote = Counting::new(Verdict::deny("never asked"));
    let tiered = TieredAuthorizer::new(local, Some(remote.clone() as Arc<dyn Authorizer>));
    let d = Dispatcher::new(registry()).with_authorizer(Arc::new(tiered));
    let admin = RequestContext::new(UserInfo::new("root").with_groups(["system:masters"]));
    assert!(d.create(&admin, "resourcecalculators", calculator_body(deployment), &CreateOptions::default()).await.is_ok());
    assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ungated_handlers_ignore_the_authorizer() {
    let deny = Counting::new(Verdict::deny("no"));
    let d = Dispatcher::new(registry()).with_authorizer(deny.clone());
    assert!(d.create(&ctx(), "rendersections", json!({"request": {}}), &CreateOptions::default()).await.is_ok());
    assert_eq!(deny.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn tables_default_to_name_and_age() {
    let d = Dispatcher::new(registry());
    let list = d.list(&ctx(), "resourcedescriptors", &ListOptions::default().with_limit(2)).await.unwrap();
    let table = d.convert_to_table("resourcedescriptors", &serde_json::to_value(&list).unwrap(), &Default::default()).unwrap();
    let headers: Vec<&str> = table.column_definitions.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(headers, ["Name", "Age"]);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[0].cells, vec![json!("a"), json!("<unknown>")]);
    assert_eq!(table.metadata.continue_token.as_deref(), Some("2"));
}
