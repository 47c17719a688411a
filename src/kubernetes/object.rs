use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};

use crate::{Error, Result};

use super::{
    constants::{APP_KUBERNETES_IO_MANAGED_BY_VALUE, SSH_AGABANI_CO_UK_OWNED_BY_KEY},
    resource::Resource,
};

/// A custom resource reconciled by this operator.
pub trait Object: kube::ResourceExt<DynamicType = ()> {
    const APP_KUBERNETES_IO_COMPONENT_VALUE: &'static str;

    type Status: PartialEq + serde::Serialize;

    fn delete_params(&self) -> DeleteParams {
        DeleteParams::default()
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams::apply(APP_KUBERNETES_IO_MANAGED_BY_VALUE).force()
    }

    fn patch_status(&self, status: Self::Status) -> Patch<serde_json::Value> {
        Patch::Merge(serde_json::json!({ "status": status }))
    }

    fn patch_status_params(&self) -> PatchParams {
        PatchParams::apply(APP_KUBERNETES_IO_MANAGED_BY_VALUE)
    }

    fn status(&self) -> Option<&Self::Status>;

    /// The `owned-by` label and controller reference stamped onto every
    /// object generated for `self`.
    fn try_owner_reference(&self) -> Result<(String, String, OwnerReference)>
    where
        Self: Resource,
    {
        let uid = self.try_uid()?;
        let reference = self
            .controller_owner_ref(&())
            .ok_or(Error::MissingObjectKey(".metadata.uid"))?;
        Ok((SSH_AGABANI_CO_UK_OWNED_BY_KEY.into(), uid.into(), reference))
    }

    fn try_owned_list_params(&self) -> Result<ListParams>
    where
        Self: Resource,
    {
        Ok(ListParams::default().labels(&format!(
            "{SSH_AGABANI_CO_UK_OWNED_BY_KEY}={}",
            self.try_uid()?
        )))
    }
}
