use std::{collections::BTreeMap, fmt::Debug};

use k8s_openapi::api::{
    apps::v1::{Deployment, DeploymentSpec},
    core::v1::{ConfigMap, Service, ServiceSpec},
};

use crate::{Error, Result};

use super::{Object, ResourceName, ResourceNamespace, ResourceUid};

pub trait Resource: kube::ResourceExt<DynamicType = ()> {
    type Spec: PartialEq + Debug;

    /// The part of the object the operator owns, if the object carries one.
    fn spec(&self) -> Option<&Self::Spec>;

    fn try_name(&self) -> Result<ResourceName> {
        self.meta()
            .name
            .as_ref()
            .ok_or(Error::MissingObjectKey(".metadata.name"))
            .map(Into::into)
    }

    fn try_namespace(&self) -> Result<ResourceNamespace> {
        self.meta()
            .namespace
            .as_ref()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))
            .map(Into::into)
    }

    fn try_uid(&self) -> Result<ResourceUid> {
        self.meta()
            .uid
            .as_ref()
            .ok_or(Error::MissingObjectKey(".metadata.uid"))
            .map(Into::into)
    }

    fn try_with_owner(mut self, object: &(impl Object + Resource)) -> Result<Self>
    where
        Self: Sized,
    {
        let (key, value, reference) = object.try_owner_reference()?;
        *self.owner_references_mut() = vec![reference];
        self.labels_mut().insert(key, value);
        Ok(self)
    }
}

impl Resource for ConfigMap {
    type Spec = BTreeMap<String, String>;

    fn spec(&self) -> Option<&Self::Spec> {
        self.data.as_ref()
    }
}

impl Resource for Deployment {
    type Spec = DeploymentSpec;

    fn spec(&self) -> Option<&Self::Spec> {
        self.spec.as_ref()
    }
}

impl Resource for Service {
    type Spec = ServiceSpec;

    fn spec(&self) -> Option<&Self::Spec> {
        self.spec.as_ref()
    }
}
