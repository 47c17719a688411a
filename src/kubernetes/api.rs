use std::collections::HashMap;

use kube::api::ListParams;

use crate::{Error, Result, metrics::Metrics};

use super::{Object, Resource, ResourceName, subset::Subset, subset::option_is_subset};

/// A namespaced `kube::Api` that counts its requests and only writes objects
/// that drifted from their desired state.
pub struct Api<K> {
    api: kube::Api<K>,
    metrics: Metrics,
}

impl<R> Api<R> {
    pub fn new(api: kube::Api<R>, metrics: &Metrics) -> Self {
        Self {
            api,
            metrics: metrics.clone(),
        }
    }
}

impl<R> Api<R>
where
    R: Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned + serde::Serialize,
{
    pub async fn delete<O>(&self, object: &O, resources: Vec<R>) -> Result<()>
    where
        O: Object,
    {
        for resource in resources {
            let resource_name = resource.try_name()?;

            tracing::info!(name =% resource_name, kind = %R::kind(&()), "deleting");
            self.metrics.kubernetes_api_usage_count::<R>("delete");
            self.api
                .delete(&resource_name, &object.delete_params())
                .await
                .map_err(Error::Kube)?;
        }

        Ok(())
    }

    pub async fn list(&self, params: &ListParams) -> Result<Vec<R>> {
        self.metrics.kubernetes_api_usage_count::<R>("list");
        self.api
            .list(params)
            .await
            .map(|list| list.items)
            .map_err(Error::Kube)
    }
}

impl<R> Api<R>
where
    R: Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned + serde::Serialize,
    R::Spec: Subset,
{
    /// Applies `resources` and deletes every other object owned by `object`.
    ///
    /// Returns the live objects keyed by the identifier they were passed in
    /// with.
    pub async fn sync<O, I>(&self, object: &O, resources: HashMap<I, R>) -> Result<HashMap<I, R>>
    where
        I: PartialEq + Eq + std::hash::Hash,
        O: Object + Resource,
    {
        let (results, delete) = self.update(object, resources).await?;
        self.delete(object, delete).await?;
        Ok(results)
    }

    pub async fn update<O, I>(
        &self,
        object: &O,
        resources: HashMap<I, R>,
    ) -> Result<(HashMap<I, R>, Vec<R>)>
    where
        I: PartialEq + Eq + std::hash::Hash,
        O: Object + Resource,
    {
        let mut resources = resources
            .into_iter()
            .map(|(identifier, resource)| {
                resource.try_name().and_then(|resource_name| {
                    resource
                        .try_with_owner(object)
                        .map(|resource| (resource_name, (identifier, resource)))
                })
            })
            .collect::<Result<HashMap<ResourceName, (I, R)>>>()?;

        for (resource_name, (_, resource)) in &resources {
            self.metrics.kubernetes_api_usage_count::<R>("get");
            match self.api.get_opt(resource_name).await.map_err(Error::Kube)? {
                Some(api_resource)
                    if option_is_subset(resource.spec(), api_resource.spec())
                        && resource.meta().is_subset(api_resource.meta()) => {}
                _ => {
                    tracing::info!(name =% resource_name, kind = %R::kind(&()), "patching");
                    self.metrics.kubernetes_api_usage_count::<R>("patch");
                    self.api
                        .patch(
                            resource_name,
                            &object.patch_params(),
                            &kube::api::Patch::Apply(&resource),
                        )
                        .await
                        .map_err(Error::Kube)?;
                }
            }
        }

        let mut patched = HashMap::new();
        let mut deprecated = Vec::new();

        for api_resource in self.list(&object.try_owned_list_params()?).await? {
            if let Some((identifier, _)) = resources.remove(&api_resource.try_name()?) {
                patched.insert(identifier, api_resource);
            } else {
                deprecated.push(api_resource);
            }
        }

        if !resources.is_empty() {
            tracing::warn!(
                count = resources.len(),
                "patched resources were not listed as owned"
            );
        }

        Ok((patched, deprecated))
    }
}

impl<R> Api<R>
where
    R: Object + Resource + Clone + std::fmt::Debug + serde::de::DeserializeOwned + serde::Serialize,
{
    /// Writes the status subresource of `object` when it changed.
    pub async fn update_status(&self, object: &R, status: R::Status) -> Result<()> {
        match object.status() {
            Some(api_status) if &status == api_status => {}
            _ => {
                self.metrics.kubernetes_api_usage_count::<R>("patch");
                self.api
                    .patch_status(
                        &object.try_name()?,
                        &object.patch_status_params(),
                        &object.patch_status(status),
                    )
                    .await
                    .map_err(Error::Kube)?;
            }
        }

        Ok(())
    }
}
