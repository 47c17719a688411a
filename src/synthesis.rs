//! Desired state of an `SshAccess`.
//!
//! Everything in here is a pure function of its arguments: the reconciler
//! gathers the inputs, calls [`build_deployment`] and [`build_service`], and
//! applies the results.

use std::{collections::BTreeMap, ops::Deref};

use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{
            ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, PodSpec, PodTemplateSpec,
            Service, ServicePort, ServiceSpec, Volume, VolumeMount,
        },
    },
    apimachinery::pkg::{apis::meta::v1::LabelSelector, util::intstr::IntOrString},
};
use kube::core::ObjectMeta;

use crate::{
    Error, Result,
    kubernetes::{
        Resource,
        constants::{
            APP_KUBERNETES_IO_COMPONENT_KEY, APP_KUBERNETES_IO_INSTANCE_KEY,
            APP_KUBERNETES_IO_MANAGED_BY_KEY, APP_KUBERNETES_IO_MANAGED_BY_VALUE,
            APP_KUBERNETES_IO_NAME_KEY, APP_KUBERNETES_IO_NAME_VALUE,
        },
    },
};

/*
 * ============================================================================
 * Constants
 * ============================================================================
 */
const APP_KUBERNETES_IO_COMPONENT_VALUE: &str = "sshd";

const AUTHORIZED_KEYS_MOUNT_PATH: &str = "/var/run/authorized_keys.d";
const AUTHORIZED_KEYS_MODE: i32 = 0o600;

const SSHD_CONTAINER_NAME: &str = "sshd";
const SSHD_CONTAINER_PORT: i32 = 2222;
const SSHD_PORT_NAME: &str = "ssh";
const SSHD_SERVICE_PORT: i32 = 22;

/*
 * ============================================================================
 * Inputs
 * ============================================================================
 */
/// Identity and desired state of one `SshAccess`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SshAccessInstance {
    pub name: String,

    pub namespace: String,

    /// Source ranges allowed to reach the load balancer. Empty admits nothing.
    pub allowed_cidr_blocks: Vec<String>,

    pub image: String,
}

/// A `ConfigMap` carrying an `authorized_keys` entry.
///
/// `name` doubles as the volume name, the mount name and the referenced
/// `ConfigMap` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedKeySource {
    pub name: String,

    pub namespace: String,
}

impl AuthorizedKeySource {
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl TryFrom<&ConfigMap> for AuthorizedKeySource {
    type Error = Error;

    fn try_from(value: &ConfigMap) -> Result<Self> {
        Ok(Self {
            name: value.try_name()?.into(),
            namespace: value.try_namespace()?.into(),
        })
    }
}

/*
 * ============================================================================
 * Labels
 * ============================================================================
 */
/// Labels shared by the `Deployment` selector, the pod template and the
/// `Service` selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchLabels(BTreeMap<String, String>);

impl MatchLabels {
    /// Match labels plus the labels that must not take part in selection.
    #[must_use]
    pub fn to_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.0.clone();
        labels.insert(
            APP_KUBERNETES_IO_MANAGED_BY_KEY.into(),
            APP_KUBERNETES_IO_MANAGED_BY_VALUE.into(),
        );
        labels
    }
}

impl Deref for MatchLabels {
    type Target = BTreeMap<String, String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<MatchLabels> for BTreeMap<String, String> {
    fn from(value: MatchLabels) -> Self {
        value.0
    }
}

impl From<&MatchLabels> for BTreeMap<String, String> {
    fn from(value: &MatchLabels) -> Self {
        value.0.clone()
    }
}

#[must_use]
pub fn match_labels(instance: &SshAccessInstance) -> MatchLabels {
    MatchLabels(BTreeMap::from([
        (
            APP_KUBERNETES_IO_COMPONENT_KEY.into(),
            APP_KUBERNETES_IO_COMPONENT_VALUE.into(),
        ),
        (APP_KUBERNETES_IO_INSTANCE_KEY.into(), instance.name.clone()),
        (
            APP_KUBERNETES_IO_NAME_KEY.into(),
            APP_KUBERNETES_IO_NAME_VALUE.into(),
        ),
    ]))
}

/*
 * ============================================================================
 * Deployment
 * ============================================================================
 */
/// One `sshd` replica with every authorized key source mounted read-only.
///
/// Without sources both `volumes` and `volumeMounts` are `None`, never an
/// empty list.
#[must_use]
pub fn build_deployment(
    instance: &SshAccessInstance,
    sources: &[AuthorizedKeySource],
) -> Deployment {
    let match_labels = match_labels(instance);

    let (volumes, volume_mounts) = if sources.is_empty() {
        (None, None)
    } else {
        (
            Some(sources.iter().map(authorized_keys_volume).collect()),
            Some(sources.iter().map(authorized_keys_volume_mount).collect()),
        )
    };

    Deployment {
        metadata: ObjectMeta {
            name: Some(instance.name.clone()),
            namespace: Some(instance.namespace.clone()),
            labels: Some(match_labels.to_labels()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some((&match_labels).into()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    name: Some(instance.name.clone()),
                    namespace: Some(instance.namespace.clone()),
                    labels: Some(match_labels.into()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        image: Some(instance.image.clone()),
                        name: SSHD_CONTAINER_NAME.into(),
                        ports: Some(vec![ContainerPort {
                            container_port: SSHD_CONTAINER_PORT,
                            name: Some(SSHD_PORT_NAME.into()),
                            protocol: Some("TCP".into()),
                            ..Default::default()
                        }]),
                        volume_mounts,
                        ..Default::default()
                    }],
                    volumes,
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn authorized_keys_volume(source: &AuthorizedKeySource) -> Volume {
    Volume {
        name: source.name.clone(),
        config_map: Some(ConfigMapVolumeSource {
            default_mode: Some(AUTHORIZED_KEYS_MODE),
            name: source.name.clone(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn authorized_keys_volume_mount(source: &AuthorizedKeySource) -> VolumeMount {
    VolumeMount {
        mount_path: format!("{AUTHORIZED_KEYS_MOUNT_PATH}/{}", source.name),
        name: source.name.clone(),
        read_only: Some(true),
        ..Default::default()
    }
}

/*
 * ============================================================================
 * Service
 * ============================================================================
 */
/// A `LoadBalancer` in front of the `sshd` pods.
///
/// `loadBalancerSourceRanges` is always set, so an empty list stays an
/// explicit "admit nothing" rather than an unset field.
#[must_use]
pub fn build_service(instance: &SshAccessInstance) -> Service {
    let match_labels = match_labels(instance);

    Service {
        metadata: ObjectMeta {
            name: Some(instance.name.clone()),
            namespace: Some(instance.namespace.clone()),
            labels: Some(match_labels.to_labels()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            load_balancer_source_ranges: Some(instance.allowed_cidr_blocks.clone()),
            ports: Some(vec![ServicePort {
                name: Some(SSHD_PORT_NAME.into()),
                port: SSHD_SERVICE_PORT,
                protocol: Some("TCP".into()),
                target_port: Some(IntOrString::String(SSHD_PORT_NAME.into())),
                ..Default::default()
            }]),
            selector: Some(match_labels.into()),
            type_: Some("LoadBalancer".into()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::{
        api::{
            apps::v1::Deployment,
            core::v1::{ConfigMap, Container, PodSpec, PodTemplateSpec, Service},
        },
        apimachinery::pkg::util::intstr::IntOrString,
    };
    use kube::core::ObjectMeta;

    use super::{
        AuthorizedKeySource, SshAccessInstance, build_deployment, build_service, match_labels,
    };

    const PLACEHOLDER_NAME: &str = "placeholderName";
    const PLACEHOLDER_NAMESPACE: &str = "placeholderNamespace";
    const PLACEHOLDER_IMAGE: &str = "placeholderImage";

    fn instance() -> SshAccessInstance {
        SshAccessInstance {
            name: PLACEHOLDER_NAME.into(),
            namespace: PLACEHOLDER_NAMESPACE.into(),
            allowed_cidr_blocks: vec!["1.1.1.1".into(), "2.2.2.2".into()],
            image: PLACEHOLDER_IMAGE.into(),
        }
    }

    fn sources(names: &[&str]) -> Vec<AuthorizedKeySource> {
        names
            .iter()
            .map(|name| AuthorizedKeySource::new(*name, PLACEHOLDER_NAMESPACE))
            .collect()
    }

    fn pod_template(deployment: &Deployment) -> &PodTemplateSpec {
        &deployment.spec.as_ref().unwrap().template
    }

    fn pod_spec(deployment: &Deployment) -> &PodSpec {
        pod_template(deployment).spec.as_ref().unwrap()
    }

    fn container(deployment: &Deployment) -> &Container {
        let containers = &pod_spec(deployment).containers;
        assert_eq!(1, containers.len(), "exactly one container");
        &containers[0]
    }

    #[test]
    fn deployment_honors_instance() {
        // arrange
        let instance = instance();

        // act
        let deployment = build_deployment(&instance, &sources(&[]));

        // assert
        assert_eq!(Some(PLACEHOLDER_NAME), deployment.metadata.name.as_deref());
        assert_eq!(
            Some(PLACEHOLDER_NAMESPACE),
            deployment.metadata.namespace.as_deref()
        );

        let template_metadata = pod_template(&deployment).metadata.as_ref().unwrap();
        assert_eq!(Some(PLACEHOLDER_NAME), template_metadata.name.as_deref());
        assert_eq!(
            Some(PLACEHOLDER_NAMESPACE),
            template_metadata.namespace.as_deref()
        );

        assert_eq!(Some(PLACEHOLDER_IMAGE), container(&deployment).image.as_deref());
    }

    #[test]
    fn deployment_without_sources_has_no_volumes() {
        // arrange
        let instance = instance();

        // act
        let deployment = build_deployment(&instance, &[]);

        // assert
        assert_eq!(None, pod_spec(&deployment).volumes);
        assert_eq!(None, container(&deployment).volume_mounts);
    }

    #[test]
    fn deployment_mounts_sources_in_order() {
        // arrange
        let instance = instance();
        let sources = sources(&["A", "B"]);

        // act
        let deployment = build_deployment(&instance, &sources);

        // assert
        let volumes = pod_spec(&deployment).volumes.as_ref().unwrap();
        let volume_mounts = container(&deployment).volume_mounts.as_ref().unwrap();
        assert_eq!(sources.len(), volumes.len());
        assert_eq!(sources.len(), volume_mounts.len());

        for (index, source) in sources.iter().enumerate() {
            let volume = &volumes[index];
            assert_eq!(source.name, volume.name, "volume {index} name");
            assert_eq!(
                source.name,
                volume.config_map.as_ref().unwrap().name,
                "volume {index} config map"
            );

            let volume_mount = &volume_mounts[index];
            assert_eq!(source.name, volume_mount.name, "volume mount {index} name");
            assert_eq!(
                format!("/var/run/authorized_keys.d/{}", source.name),
                volume_mount.mount_path
            );
            assert_eq!(Some(true), volume_mount.read_only);
        }
    }

    #[test]
    fn deployment_keeps_duplicate_and_unsorted_sources() {
        // arrange
        let instance = instance();
        let sources = sources(&["zed", "alice", "zed"]);

        // act
        let deployment = build_deployment(&instance, &sources);

        // assert
        let volume_names: Vec<_> = pod_spec(&deployment)
            .volumes
            .as_ref()
            .unwrap()
            .iter()
            .map(|volume| volume.name.as_str())
            .collect();
        let volume_mount_names: Vec<_> = container(&deployment)
            .volume_mounts
            .as_ref()
            .unwrap()
            .iter()
            .map(|volume_mount| volume_mount.name.as_str())
            .collect();
        assert_eq!(vec!["zed", "alice", "zed"], volume_names);
        assert_eq!(volume_names, volume_mount_names);
    }

    #[test]
    fn deployment_accepts_empty_image() {
        // arrange
        let instance = SshAccessInstance {
            image: String::new(),
            ..instance()
        };

        // act
        let deployment = build_deployment(&instance, &[]);

        // assert
        assert_eq!(Some(""), container(&deployment).image.as_deref());
    }

    #[test]
    fn deployment_does_not_touch_inputs() {
        // arrange
        let instance = instance();
        let sources = sources(&["A", "B"]);
        let (expected_instance, expected_sources) = (instance.clone(), sources.clone());

        // act
        let first = build_deployment(&instance, &sources);
        let second = build_deployment(&instance, &sources);

        // assert
        assert_eq!(expected_instance, instance);
        assert_eq!(expected_sources, sources);
        assert_eq!(first, second);
    }

    #[test]
    fn labels_agree_across_objects() {
        // arrange
        let instance = instance();

        // act
        let deployment = build_deployment(&instance, &sources(&["A"]));
        let service = build_service(&instance);
        let match_labels = match_labels(&instance);

        // assert
        let expected: Option<BTreeMap<String, String>> = Some((&match_labels).into());
        assert_eq!(
            expected,
            deployment.spec.as_ref().unwrap().selector.match_labels
        );
        assert_eq!(
            expected,
            pod_template(&deployment).metadata.as_ref().unwrap().labels
        );
        assert_eq!(expected, service.spec.as_ref().unwrap().selector);
    }

    #[test]
    fn labels_are_deterministic() {
        // arrange
        let instance = instance();

        // act
        let first = match_labels(&instance);
        let service = build_service(&instance);
        let second = match_labels(&instance.clone());

        // assert
        assert_eq!(first, second);
        let expected: Option<BTreeMap<String, String>> = Some((&first).into());
        assert_eq!(expected, service.spec.unwrap().selector);
        assert_eq!(
            Some(&PLACEHOLDER_NAME.to_string()),
            first.get("app.kubernetes.io/instance")
        );
    }

    #[test]
    fn labels_accept_empty_name() {
        // arrange
        let instance = SshAccessInstance::default();

        // act
        let labels = match_labels(&instance);

        // assert
        assert_eq!(Some(&String::new()), labels.get("app.kubernetes.io/instance"));
        assert_eq!(3, labels.len());
    }

    #[test]
    fn metadata_labels_extend_match_labels() {
        // arrange
        let instance = instance();

        // act
        let deployment = build_deployment(&instance, &[]);

        // assert
        let labels = deployment.metadata.labels.unwrap();
        assert!(
            match_labels(&instance)
                .iter()
                .all(|(key, value)| labels.get(key) == Some(value))
        );
        assert_eq!(
            Some(&"ssh-access-operator".to_string()),
            labels.get("app.kubernetes.io/managed-by")
        );
    }

    #[test]
    fn service_honors_instance() {
        // arrange
        let instance = instance();

        // act
        let service = build_service(&instance);

        // assert
        assert_eq!(Some(PLACEHOLDER_NAME), service.metadata.name.as_deref());
        assert_eq!(
            Some(PLACEHOLDER_NAMESPACE),
            service.metadata.namespace.as_deref()
        );

        let spec = service.spec.unwrap();
        assert_eq!(
            Some(vec!["1.1.1.1".to_string(), "2.2.2.2".to_string()]),
            spec.load_balancer_source_ranges
        );
        assert_eq!(Some("LoadBalancer"), spec.type_.as_deref());
    }

    #[test]
    fn service_passes_source_ranges_through() {
        // arrange
        let allowed_cidr_blocks = vec![
            "10.0.0.0/8".to_string(),
            "not-a-cidr".to_string(),
            "10.0.0.0/8".to_string(),
        ];
        let instance = SshAccessInstance {
            allowed_cidr_blocks: allowed_cidr_blocks.clone(),
            ..instance()
        };

        // act
        let service = build_service(&instance);

        // assert
        assert_eq!(
            Some(allowed_cidr_blocks),
            service.spec.unwrap().load_balancer_source_ranges
        );
    }

    #[test]
    fn service_keeps_empty_source_ranges() {
        // arrange
        let instance = SshAccessInstance {
            allowed_cidr_blocks: Vec::new(),
            ..instance()
        };

        // act
        let service: Service = build_service(&instance);

        // assert
        assert_eq!(
            Some(Vec::new()),
            service.spec.unwrap().load_balancer_source_ranges
        );
    }

    #[test]
    fn service_targets_sshd_port() {
        // arrange
        let instance = instance();

        // act
        let service = build_service(&instance);
        let deployment = build_deployment(&instance, &[]);

        // assert
        let service_ports = service.spec.unwrap().ports.unwrap();
        let container_port = &container(&deployment).ports.as_ref().unwrap()[0];
        assert_eq!(22, service_ports[0].port);
        assert_eq!(
            Some(IntOrString::String(container_port.name.clone().unwrap())),
            service_ports[0].target_port
        );
    }

    #[test]
    fn source_from_config_map() {
        // arrange
        let config_map = ConfigMap {
            metadata: ObjectMeta {
                name: Some("A".into()),
                namespace: Some(PLACEHOLDER_NAMESPACE.into()),
                ..Default::default()
            },
            ..Default::default()
        };

        // act
        let source = AuthorizedKeySource::try_from(&config_map).unwrap();

        // assert
        assert_eq!(AuthorizedKeySource::new("A", PLACEHOLDER_NAMESPACE), source);
    }

    #[test]
    fn source_from_config_map_without_namespace() {
        // arrange
        let config_map = ConfigMap {
            metadata: ObjectMeta {
                name: Some("A".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        // act
        let source = AuthorizedKeySource::try_from(&config_map);

        // assert
        assert!(source.is_err());
    }
}
