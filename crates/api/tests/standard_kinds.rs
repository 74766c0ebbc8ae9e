use std::path::PathBuf;
use std::sync::Arc;

use kubeui_api::{standard, Deps, Dispatcher};
use kubeui_compute::projects::PROJECT_ID_LABEL;
use kubeui_core::{ApiError, CreateOptions, GetOptions, ListOptions, RequestContext};
use kubeui_kubehub::MockCluster;
use serde_json::json;

fn chart_root() -> PathBuf { std::env::temp_dir().join(format!("kubeui-api-charts-{}", uuid::Uuid::new_v4())) }

async fn dispatcher(cluster: MockCluster) -> Dispatcher {
    let deps = Deps::new(&RequestContext::default(), Arc::new(cluster), "prod", chart_root()).await.unwrap();
    Dispatcher::new(standard(&deps).unwrap())
}

fn cluster() -> MockCluster {
    MockCluster::new()
        .with_node("a", &[("cpu", "1"), ("memory", "1Gi")])
        .with_node("b", &[("cpu", "2"), ("memory", "512Mi")])
        .with_node("c", &[("cpu", "4")])
        .with_object(json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "n", "namespace": "p", "labels": {"app": "web"}}}))
        .with_object(json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "m", "namespace": "p", "labels": {"app": "db"}}}))
}

#[tokio::test]
async fn every_standard_kind_resolves() {
    let d = dispatcher(cluster()).await;
    for resource in [
        "resourcedescriptors",
        "resourceoutlines",
        "resourcelayouts",
        "resourcecalculators",
        "renderapis",
        "resourcemanifests",
        "chartpresetqueries",
        "rendersections",
        "gatewayinfos",
        "projects",
        "siteinfos",
        "siteinfo",
        "SiteInfo",
        "projects.meta.kubeui.dev",
    ] {
        assert!(d.kind(resource).is_ok(), "{resource}");
    }
    assert_eq!(d.kind("widgets").unwrap_err().code(), 400);
    assert_eq!(d.new_zero_list("projects").unwrap().kind, "ProjectList");
}

#[tokio::test]
async fn descriptor_catalog_lists_and_gets() {
    let d = dispatcher(cluster()).await;
    let ctx = RequestContext::default();
    let all = d.list(&ctx, "resourcedescriptors", &ListOptions::default()).await.unwrap();
    assert_eq!(all.items.len(), 6);
    assert_eq!(all.kind, "ResourceDescriptorList");
    assert!(all.continue_token().is_none());

    let pod = d.get(&ctx, "resourcedescriptors", "core-v1-pods", &GetOptions::default()).await.unwrap();
    assert_eq!(pod["spec"]["resource"]["kind"], "Pod");
    let err = d.get(&ctx, "resourcedescriptors", "core-v1-widgets", &GetOptions::default()).await.unwrap_err();
    assert_eq!(err, ApiError::not_found("meta.kubeui.dev", "resourcedescriptors", "core-v1-widgets"));
}

#[tokio::test]
async fn layouts_are_materialized_from_outlines() {
    let d = dispatcher(cluster()).await;
    let ctx = RequestContext::default();
    let layouts = d.list(&ctx, "resourcelayouts", &ListOptions::default()).await.unwrap();
    let outlines = d.list(&ctx, "resourceoutlines", &ListOptions::default()).await.unwrap();
    assert_eq!(layouts.names(), outlines.names());
    for layout in layouts.items.iter() {
        assert_eq!(layout["kind"], "ResourceLayout");
        assert!(layout["spec"]["pages"].is_array());
    }
}

#[tokio::test]
async fn catalog_tables_carry_resource_columns() {
    let d = dispatcher(cluster()).await;
    let list = d.list(&RequestContext::default(), "resourcedescriptors", &ListOptions::default().with_limit(1)).await.unwrap();
    let table = d.convert_to_table("resourcedescriptors", &serde_json::to_value(&list).unwrap(), &Default::default()).unwrap();
    let headers: Vec<&str> = table.column_definitions.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(headers, ["Name", "Group", "Version", "Kind", "Age"]);
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0].cells[0], json!("apps-v1-deployments"));
}

#[tokio::test]
async fn siteinfo_counts_nodes_and_keeps_its_uid() {
    let d = dispatcher(cluster()).await;
    let ctx = RequestContext::default();
    let body = json!({"apiVersion": "identity.kubeui.dev/v1alpha1", "kind": "SiteInfo"});
    let first = d.create(&ctx, "siteinfos", body.clone(), &CreateOptions::default()).await.unwrap();
    let second = d.create(&ctx, "siteinfos", body, &CreateOptions::default()).await.unwrap();
    assert_eq!(first["kubernetes"]["nodeStats"]["count"], 3);
    assert_eq!(first["kubernetes"]["nodeStats"]["capacity"]["cpu"], "7");
    assert_eq!(first["kubernetes"]["clusterName"], "prod");
    assert!(first["metadata"]["uid"].is_string());
    assert_eq!(first["metadata"]["uid"], second["metadata"]["uid"]);

    let wrong = json!({"apiVersion": "meta.kubeui.dev/v1alpha1", "kind": "SiteInfo"});
    assert_eq!(d.create(&ctx, "siteinfos", wrong, &CreateOptions::default()).await.unwrap_err().code(), 400);
}

#[tokio::test]
async fn gatewayinfo_without_services_is_empty() {
    let class = json!({
        "apiVersion": "gateway.networking.k8s.io/v1", "kind": "GatewayClass",
        "metadata": {"name": "cls-x"},
        "spec": {"controllerName": "gateway.envoyproxy.io/gatewayclass-controller"}
    });
    let d = dispatcher(cluster().with_gateway_api().with_object(class)).await;
    let ctx = RequestContext::default();
    let info = d.get(&ctx, "gatewayinfos", "cls-x", &GetOptions::default()).await.unwrap();
    assert_eq!(info["kind"], "GatewayInfo");
    assert_eq!(info["spec"], json!({"gatewayClassName": "cls-x", "serviceType": "", "hostName": "", "ip": ""}));

    let err = d.get(&ctx, "gatewayinfos", "cls-y", &GetOptions::default()).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(d.list(&ctx, "gatewayinfos", &ListOptions::default()).await.unwrap_err().code(), 405);
}

#[tokio::test]
async fn renderapi_reads_by_ref_and_by_selector() {
    let d = dispatcher(cluster()).await;
    let ctx = RequestContext::default();
    let by_ref = json!({
        "apiVersion": "meta.kubeui.dev/v1alpha1", "kind": "RenderAPI",
        "request": {"resource": {"version": "v1", "kind": "Pod"}, "ref": {"namespace": "p", "name": "n"}}
    });
    let out = d.create(&ctx, "renderapis", by_ref, &CreateOptions::default()).await.unwrap();
    assert_eq!(out["response"]["metadata"]["name"], "n");
    assert_eq!(out["response"]["metadata"]["namespace"], "p");

    let by_selector = json!({
        "request": {
            "resource": {"version": "v1", "kind": "Pod"},
            "ref": {"namespace": "p"},
            "selector": {"matchLabels": {"app": "db"}}
        }
    });
    let out = d.create(&ctx, "renderapis", by_selector, &CreateOptions::default()).await.unwrap();
    assert_eq!(out["response"]["kind"], "List");
    let names: Vec<&str> = out["response"]["items"].as_array().unwrap().iter().filter_map(|i| i["metadata"]["name"].as_str()).collect();
    assert_eq!(names, ["m"]);
}

#[tokio::test]
async fn projects_group_namespaces_on_rancher() {
    let plain = dispatcher(cluster().with_namespace("shop", &[(PROJECT_ID_LABEL, "p-shop")])).await;
    let ctx = RequestContext::default();
    assert!(plain.list(&ctx, "projects", &ListOptions::default()).await.unwrap().items.is_empty());

    let managed = cluster()
        .with_rancher()
        .with_namespace("default", &[(PROJECT_ID_LABEL, "p-default")])
        .with_namespace("shop", &[(PROJECT_ID_LABEL, "p-shop")])
        .with_namespace("shop-staging", &[(PROJECT_ID_LABEL, "p-shop")]);
    let d = dispatcher(managed).await;
    let list = d.list(&ctx, "projects", &ListOptions::default()).await.unwrap();
    assert_eq!(list.names(), ["p-default", "p-shop"]);
    assert_eq!(list.items[1]["spec"]["namespaces"], json!(["shop", "shop-staging"]));

    let only_shop = ListOptions::default().with_labels(format!("{PROJECT_ID_LABEL}=p-shop"));
    assert_eq!(d.list(&ctx, "projects", &only_shop).await.unwrap().names(), ["p-shop"]);

    let p = d.get(&ctx, "projects", "p-default", &GetOptions::default()).await.unwrap();
    assert_eq!(p["spec"]["type"], "Default");
    assert!(d.get(&ctx, "projects", "p-none", &GetOptions::default()).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn computations_only_create() {
    let d = dispatcher(cluster()).await;
    let ctx = RequestContext::default();
    assert_eq!(d.get(&ctx, "rendersections", "x", &GetOptions::default()).await.unwrap_err().code(), 405);
    let body = json!({"request": {}});
    assert_eq!(d.create(&ctx, "resourcedescriptors", body.clone(), &CreateOptions::default()).await.unwrap_err().code(), 405);
    let dry_run = CreateOptions { dry_run: vec!["All".into()], ..Default::default() };
    assert!(d.create(&ctx, "rendersections", body.clone(), &dry_run).await.is_ok());
    let bogus = CreateOptions { dry_run: vec!["Some".into()], ..Default::default() };
    assert_eq!(d.create(&ctx, "rendersections", body, &bogus).await.unwrap_err().code(), 400);
}
