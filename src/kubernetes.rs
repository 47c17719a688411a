mod api;
mod conditions_ext;
pub mod constants;
mod context;
mod error_policy;
mod identity;
mod object;
mod resource;
mod subset;

pub use api::Api;
pub use conditions_ext::ConditionsExt;
pub use context::Context;
pub use error_policy::error_policy;
pub use identity::{ResourceName, ResourceNamespace, ResourceUid};
pub use object::Object;
pub use resource::Resource;
pub use subset::{Subset, option_is_subset};
