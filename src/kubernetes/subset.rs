use std::collections::BTreeMap;

use k8s_openapi::api::{
    apps::v1::DeploymentSpec,
    core::v1::{Container, ContainerPort, PodSpec, ServicePort, ServiceSpec, Volume, VolumeMount},
};

/// Compares a generated object against its live counterpart, ignoring
/// fields the API server populates on its own.
pub trait Subset {
    fn is_subset(&self, superset: &Self) -> bool;
}

/// An absent value places no constraint on the live value.
pub fn option_is_subset<T: Subset>(subset: Option<&T>, superset: Option<&T>) -> bool {
    match (subset, superset) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(subset), Some(superset)) => subset.is_subset(superset),
    }
}

/// An absent list and an empty list are the same list.
pub fn vec_is_subset<T: Subset>(subset: Option<&Vec<T>>, superset: Option<&Vec<T>>) -> bool {
    let subset = subset.map_or(&[][..], Vec::as_slice);
    let superset = superset.map_or(&[][..], Vec::as_slice);

    subset.len() == superset.len()
        && subset
            .iter()
            .zip(superset)
            .all(|(subset, superset)| subset.is_subset(superset))
}

impl Subset for String {
    fn is_subset(&self, superset: &Self) -> bool {
        self == superset
    }
}

impl Subset for BTreeMap<String, String> {
    fn is_subset(&self, superset: &Self) -> bool {
        self.iter()
            .all(|(key, value)| Some(value) == superset.get(key))
    }
}

impl Subset for Option<BTreeMap<String, String>> {
    fn is_subset(&self, superset: &Self) -> bool {
        match (self, superset) {
            (None, None) => true,
            (None, Some(data)) | (Some(data), None) => data.is_empty(),
            (Some(subset), Some(superset)) => subset.is_subset(superset),
        }
    }
}

impl Subset for kube::core::ObjectMeta {
    fn is_subset(&self, superset: &Self) -> bool {
        self.annotations.is_subset(&superset.annotations)
            && self.labels.is_subset(&superset.labels)
            && self.name == superset.name
            && self.owner_references == superset.owner_references
    }
}

impl Subset for DeploymentSpec {
    fn is_subset(&self, superset: &Self) -> bool {
        self.replicas == superset.replicas
            && self.selector == superset.selector
            // pod template labels must match the selector exactly
            && self.template.metadata.as_ref().map(|f| &f.labels)
                == superset.template.metadata.as_ref().map(|f| &f.labels)
            && option_is_subset(
                self.template.metadata.as_ref(),
                superset.template.metadata.as_ref(),
            )
            && option_is_subset(self.template.spec.as_ref(), superset.template.spec.as_ref())
    }
}

impl Subset for PodSpec {
    fn is_subset(&self, superset: &Self) -> bool {
        self.containers.len() == superset.containers.len()
            && self
                .containers
                .iter()
                .zip(&superset.containers)
                .all(|(subset, superset)| subset.is_subset(superset))
            && vec_is_subset(self.volumes.as_ref(), superset.volumes.as_ref())
    }
}

impl Subset for Container {
    fn is_subset(&self, superset: &Self) -> bool {
        self.name == superset.name
            && self.image == superset.image
            && vec_is_subset(self.ports.as_ref(), superset.ports.as_ref())
            && vec_is_subset(self.volume_mounts.as_ref(), superset.volume_mounts.as_ref())
    }
}

impl Subset for ContainerPort {
    fn is_subset(&self, superset: &Self) -> bool {
        self.container_port == superset.container_port
            && self.name == superset.name
            && self.protocol == superset.protocol
    }
}

impl Subset for Volume {
    fn is_subset(&self, superset: &Self) -> bool {
        self.name == superset.name
            && self.config_map.as_ref().map(|f| &f.name)
                == superset.config_map.as_ref().map(|f| &f.name)
    }
}

impl Subset for VolumeMount {
    fn is_subset(&self, superset: &Self) -> bool {
        self.name == superset.name
            && self.mount_path == superset.mount_path
            && self.read_only.unwrap_or_default() == superset.read_only.unwrap_or_default()
    }
}

impl Subset for ServiceSpec {
    fn is_subset(&self, superset: &Self) -> bool {
        self.selector == superset.selector
            && self.type_ == superset.type_
            && vec_is_subset(
                self.load_balancer_source_ranges.as_ref(),
                superset.load_balancer_source_ranges.as_ref(),
            )
            && vec_is_subset(self.ports.as_ref(), superset.ports.as_ref())
    }
}

impl Subset for ServicePort {
    fn is_subset(&self, superset: &Self) -> bool {
        self.name == superset.name
            && self.port == superset.port
            && self.protocol == superset.protocol
            && self.target_port == superset.target_port
    }
}
