//! GatewayInfo: how an envoy-gateway backed gateway class is exposed.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kubeui_core::labels::{Operator, Requirement};
use kubeui_core::{ApiError, ApiResult, RequestContext, Selector};
use kubeui_kubehub::Cluster;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{non_empty, str_at, META_API_VERSION};

pub const GATEWAY_GROUP: &str = "gateway.networking.k8s.io";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const OWNING_CLASS_LABEL: &str = "gateway.envoyproxy.io/owning-gatewayclass";
pub const HOSTNAME_ANNOTATION: &str = "external-dns.alpha.kubernetes.io/hostname";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayInfoSpec {
    pub gateway_class_name: String,
    #[serde(default)]
    pub service_type: String,
    #[serde(default)]
    pub host_name: String,
    #[serde(default)]
    pub ip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayInfo {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: GatewayInfoSpec,
}

impl Default for GatewayInfo {
    fn default() -> Self {
        Self { api_version: META_API_VERSION.into(), kind: "GatewayInfo".into(), metadata: ObjectMeta::default(), spec: GatewayInfoSpec::default() }
    }
}

pub struct GatewayInfoHandler {
    cluster: Arc<dyn Cluster>,
}

fn requirement(key: &str, value: &str) -> ApiResult<Requirement> {
    Requirement::new(key, Operator::Equals, [value]).map_err(|e| ApiError::bad_request(e.to_string()))
}

/// Fill service type, host name and ip from the first exposing service.
fn describe(spec: &mut GatewayInfoSpec, svc: &Service) {
    spec.service_type = svc.spec.as_ref().and_then(|s| s.type_.clone()).unwrap_or_default();
    if let Some(host) = svc.metadata.annotations.as_ref().and_then(|a| a.get(HOSTNAME_ANNOTATION)) {
        spec.host_name = host.clone();
        return;
    }
    let ingress = svc.status.as_ref().and_then(|s| s.load_balancer.as_ref()).and_then(|lb| lb.ingress.as_ref()).and_then(|i| i.first());
    if let Some(ing) = ingress {
        spec.ip = ing.ip.clone().unwrap_or_default();
        spec.host_name = ing.hostname.clone().unwrap_or_default();
    }
}

impl GatewayInfoHandler {
    pub fn new(cluster: Arc<dyn Cluster>) -> Self { Self { cluster } }

    pub async fn get(&self, ctx: &RequestContext, name: &str) -> ApiResult<GatewayInfo> {
        let Some(res) = self.cluster.resolve_kind(ctx, GATEWAY_GROUP, "GatewayClass").await? else {
            return Err(ApiError::internal(format!(
                "cluster does not serve gatewayclasses.{}, the Gateway API CRDs are not installed",
                GATEWAY_GROUP
            )));
        };
        let class = self.cluster.get_object(ctx, &res, None, name).await.map_err(|e| {
            if e.is_not_found() { ApiError::not_found(GATEWAY_GROUP, "gatewayclasses", name) } else { e }
        })?;

        let namespace = non_empty(str_at(&class, "/spec/parametersRef/namespace"));
        let mut selector = Selector::everything();
        selector.push(requirement(MANAGED_BY_LABEL, "envoy-gateway")?);
        selector.push(requirement(OWNING_CLASS_LABEL, name)?);
        let mut services = self.cluster.list_services(ctx, namespace, &selector).await?;
        services.sort_by(|a, b| (&a.metadata.namespace, &a.metadata.name).cmp(&(&b.metadata.namespace, &b.metadata.name)));

        let mut spec = GatewayInfoSpec { gateway_class_name: name.to_string(), ..Default::default() };
        match services.first() {
            Some(svc) => describe(&mut spec, svc),
            None => debug!(class = name, namespace = namespace.unwrap_or("*"), "gateway: no envoy service for class"),
        }
        Ok(GatewayInfo { metadata: ObjectMeta { name: Some(name.to_string()), ..Default::default() }, spec, ..Default::default() })
    }
}
