use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};

use futures::StreamExt;
use k8s_openapi::{
    api::{
        apps::v1::Deployment,
        core::v1::{ConfigMap, Service},
    },
    apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition,
    apimachinery::pkg::apis::meta::v1::{Condition, Time},
    chrono::Utc,
};
use kube::{
    Client, CustomResource, CustomResourceExt, ResourceExt,
    api::ListParams,
    runtime::{
        Controller, controller::Action, reflector::ObjectRef, watcher::Config as WatcherConfig,
    },
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    kubernetes::{
        self, Api, ConditionsExt, Object, Resource as KubernetesResource,
        constants::SSH_AGABANI_CO_UK_AUTHORIZED_KEYS_KEY, error_policy,
    },
    metrics::Metrics,
    synthesis::{AuthorizedKeySource, SshAccessInstance, build_deployment, build_service},
};

/*
 * ============================================================================
 * Custom Resource Definition
 * ============================================================================
 */
/// # `SshAccess`
///
/// An `SshAccess` is an `sshd` bastion reachable through a `LoadBalancer`
/// `Service` from the listed source ranges only. Every `ConfigMap` in the
/// same namespace labelled `ssh.agabani.co.uk/authorized-keys` is mounted
/// into the bastion.
#[allow(clippy::module_name_repetitions)]
#[derive(CustomResource, JsonSchema, Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "ssh.agabani.co.uk",
    kind = "SshAccess",
    namespaced,
    printcolumn = r#"{"name":"Image", "type":"string", "description":"The sshd container image", "jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"State", "type":"string", "description":"Human readable description of state", "jsonPath":".status.summary.Service"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    status = "SshAccessStatus",
    version = "v1"
)]
#[serde(rename_all = "camelCase")]
pub struct SshAccessSpec {
    /// CIDR blocks allowed to reach the load balancer. An empty list admits
    /// no external traffic, and no `Service` is created.
    #[serde(rename = "allowedCIDRBlocks")]
    pub allowed_cidr_blocks: Vec<String>,

    /// Container image running `sshd`.
    pub image: String,
}

#[allow(clippy::module_name_repetitions)]
#[derive(JsonSchema, Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SshAccessStatus {
    /// Represents the latest available observations of the SSH access' current state.
    ///
    /// ### Initialized
    ///
    /// `Initialized`
    ///
    /// ### Service
    ///
    /// `Disabled`, `Pending`, `Ready`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Hostnames and IPs of the load balancer.
    ///
    /// Always serialized: status is written as a merge patch, and an omitted
    /// key would leave stale ingress in place.
    #[serde(default)]
    pub load_balancer_ingress: Vec<String>,

    /// Represents the latest available observations of the SSH access' current state.
    #[serde(default)]
    pub summary: BTreeMap<String, String>,
}

impl SshAccess {
    #[must_use]
    pub fn status_conditions(&self) -> Option<&Vec<Condition>> {
        self.status.as_ref().map(|f| &f.conditions)
    }
}

impl KubernetesResource for SshAccess {
    type Spec = SshAccessSpec;

    fn spec(&self) -> Option<&Self::Spec> {
        Some(&self.spec)
    }
}

impl Object for SshAccess {
    const APP_KUBERNETES_IO_COMPONENT_VALUE: &'static str = "ssh-access";

    type Status = SshAccessStatus;

    fn status(&self) -> Option<&Self::Status> {
        self.status.as_ref()
    }
}

impl TryFrom<&SshAccess> for SshAccessInstance {
    type Error = Error;

    fn try_from(value: &SshAccess) -> Result<Self> {
        Ok(Self {
            name: value.try_name()?.into(),
            namespace: value.try_namespace()?.into(),
            allowed_cidr_blocks: value.spec.allowed_cidr_blocks.clone(),
            image: value.spec.image.clone(),
        })
    }
}

#[must_use]
pub fn generate_custom_resource_definition() -> CustomResourceDefinition {
    SshAccess::crd()
}

/*
 * ============================================================================
 * Config
 * ============================================================================
 */
pub struct Config {
    pub requeue_interval: Duration,
}

/*
 * ============================================================================
 * Controller
 * ============================================================================
 */
pub async fn run_controller(client: Client, config: Config, metrics: Metrics) {
    metrics.kubernetes_api_usage_count::<SshAccess>("watch");
    metrics.kubernetes_api_usage_count::<ConfigMap>("watch");
    metrics.kubernetes_api_usage_count::<Deployment>("watch");
    metrics.kubernetes_api_usage_count::<Service>("watch");

    let controller = Controller::new(
        kube::Api::<SshAccess>::all(client.clone()),
        WatcherConfig::default(),
    );
    let store = controller.store();

    controller
        .owns(
            kube::Api::<Deployment>::all(client.clone()),
            WatcherConfig::default(),
        )
        .owns(
            kube::Api::<Service>::all(client.clone()),
            WatcherConfig::default(),
        )
        .watches(
            kube::Api::<ConfigMap>::all(client.clone()),
            WatcherConfig::default().labels(SSH_AGABANI_CO_UK_AUTHORIZED_KEYS_KEY),
            move |config_map| affected_by_config_map(&store.state(), &config_map),
        )
        .shutdown_on_signal()
        .run(
            reconciler,
            error_policy,
            Arc::new(Context {
                client,
                config,
                metrics,
            }),
        )
        .for_each(|_| async {})
        .await;
}

/// Every `SshAccess` sharing a namespace with an authorized keys `ConfigMap`
/// mounts it, so all of them need another pass when it changes.
fn affected_by_config_map(
    objects: &[Arc<SshAccess>],
    config_map: &ConfigMap,
) -> Vec<ObjectRef<SshAccess>> {
    let namespace = config_map.namespace();
    objects
        .iter()
        .filter(|object| object.namespace() == namespace)
        .map(|object| ObjectRef::from_obj(object.as_ref()))
        .collect()
}

/*
 * ============================================================================
 * Context
 * ============================================================================
 */
struct Context {
    client: Client,
    config: Config,
    metrics: Metrics,
}

impl kubernetes::Context for Context {
    fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/*
 * ============================================================================
 * State
 * ============================================================================
 */
#[derive(Debug, PartialEq)]
enum State {
    Disabled,
    Pending,
    Ready(Vec<String>),
}

impl State {
    fn new(instance: &SshAccessInstance, service: Option<&Service>) -> Self {
        if instance.allowed_cidr_blocks.is_empty() {
            State::Disabled
        } else {
            State::from(service)
        }
    }
}

impl From<Option<&Service>> for State {
    fn from(value: Option<&Service>) -> Self {
        let ingress: Vec<String> = value
            .and_then(|service| service.status.as_ref())
            .and_then(|status| status.load_balancer.as_ref())
            .and_then(|load_balancer| load_balancer.ingress.as_ref())
            .into_iter()
            .flatten()
            .filter_map(|ingress| ingress.hostname.clone().or_else(|| ingress.ip.clone()))
            .collect();

        if ingress.is_empty() {
            State::Pending
        } else {
            State::Ready(ingress)
        }
    }
}

impl From<&State> for Vec<Condition> {
    fn from(value: &State) -> Self {
        let initialized = Condition {
            last_transition_time: Time(Utc::now()),
            message: "The SshAccess is initialized.".into(),
            observed_generation: None,
            reason: "Initialized".into(),
            status: "True".into(),
            type_: "Initialized".into(),
        };

        let service = match value {
            State::Disabled => Condition {
                last_transition_time: Time(Utc::now()),
                message: "The SshAccess allows no CIDR blocks, so it has no load balancer."
                    .into(),
                observed_generation: None,
                reason: "Disabled".into(),
                status: "False".into(),
                type_: "Service".into(),
            },
            State::Pending => Condition {
                last_transition_time: Time(Utc::now()),
                message: "The SshAccess load balancer is being provisioned.".into(),
                observed_generation: None,
                reason: "Pending".into(),
                status: "False".into(),
                type_: "Service".into(),
            },
            State::Ready(_) => Condition {
                last_transition_time: Time(Utc::now()),
                message: "The SshAccess load balancer is ready.".into(),
                observed_generation: None,
                reason: "Ready".into(),
                status: "True".into(),
                type_: "Service".into(),
            },
        };

        vec![initialized, service]
    }
}

/*
 * ============================================================================
 * Reconciler
 * ============================================================================
 */
#[tracing::instrument(skip(object, ctx))]
async fn reconciler(object: Arc<SshAccess>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx
        .metrics
        .count_and_measure(SshAccess::APP_KUBERNETES_IO_COMPONENT_VALUE);
    tracing::info!("reconciling");

    let instance = SshAccessInstance::try_from(object.as_ref())?;

    // ConfigMap
    let sources = list_authorized_key_sources(
        &Api::new(
            kube::Api::namespaced(ctx.client.clone(), &instance.namespace),
            &ctx.metrics,
        ),
        &instance,
    )
    .await?;

    // Deployment
    reconcile_deployment(
        &Api::new(
            kube::Api::namespaced(ctx.client.clone(), &instance.namespace),
            &ctx.metrics,
        ),
        &object,
        &instance,
        &sources,
    )
    .await?;

    // Service
    let service = reconcile_service(
        &Api::new(
            kube::Api::namespaced(ctx.client.clone(), &instance.namespace),
            &ctx.metrics,
        ),
        &object,
        &instance,
    )
    .await?;

    let state = State::new(&instance, service.as_ref());

    // SshAccess
    reconcile_ssh_access(
        &Api::new(
            kube::Api::namespaced(ctx.client.clone(), &instance.namespace),
            &ctx.metrics,
        ),
        &object,
        &state,
    )
    .await?;

    tracing::info!(
        authorized_key_sources = sources.len(),
        state = ?state,
        "reconciled"
    );

    Ok(Action::requeue(ctx.config.requeue_interval))
}

async fn list_authorized_key_sources(
    api: &Api<ConfigMap>,
    instance: &SshAccessInstance,
) -> Result<Vec<AuthorizedKeySource>> {
    let config_maps = api
        .list(&ListParams::default().labels(SSH_AGABANI_CO_UK_AUTHORIZED_KEYS_KEY))
        .await?;

    authorized_key_sources(instance, &config_maps)
}

/// Sources in the namespace of `instance`, ordered by name so consecutive
/// passes produce the same `Deployment`.
fn authorized_key_sources(
    instance: &SshAccessInstance,
    config_maps: &[ConfigMap],
) -> Result<Vec<AuthorizedKeySource>> {
    let mut sources = config_maps
        .iter()
        .map(AuthorizedKeySource::try_from)
        .collect::<Result<Vec<_>>>()?;

    sources.retain(|source| source.namespace == instance.namespace);
    sources.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(sources)
}

async fn reconcile_deployment(
    api: &Api<Deployment>,
    object: &SshAccess,
    instance: &SshAccessInstance,
    sources: &[AuthorizedKeySource],
) -> Result<()> {
    api.sync(object, [((), build_deployment(instance, sources))].into())
        .await
        .map(|_| ())
}

async fn reconcile_service(
    api: &Api<Service>,
    object: &SshAccess,
    instance: &SshAccessInstance,
) -> Result<Option<Service>> {
    api.sync(object, desired_services(instance))
        .await
        .map(|mut services| services.remove(&()))
}

/// A `LoadBalancer` with an empty `loadBalancerSourceRanges` admits every
/// address, so no CIDR blocks means no `Service` at all.
fn desired_services(instance: &SshAccessInstance) -> HashMap<(), Service> {
    if instance.allowed_cidr_blocks.is_empty() {
        HashMap::new()
    } else {
        HashMap::from([((), build_service(instance))])
    }
}

async fn reconcile_ssh_access(api: &Api<SshAccess>, object: &SshAccess, state: &State) -> Result<()> {
    api.update_status(object, status(object, state)).await
}

fn status(object: &SshAccess, state: &State) -> SshAccessStatus {
    let conditions = object
        .status_conditions()
        .unwrap_or(&Vec::new())
        .merge_from(&state.into());

    let summary = conditions
        .iter()
        .fold(BTreeMap::new(), |mut summary, condition| {
            summary.insert(condition.type_.clone(), condition.reason.clone());
            summary
        });

    SshAccessStatus {
        conditions,
        load_balancer_ingress: match state {
            State::Disabled | State::Pending => Vec::new(),
            State::Ready(ingress) => ingress.clone(),
        },
        summary,
    }
}
