use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;

pub trait ConditionsExt {
    /// Overlays `other` onto `self` by condition type, keeping an existing
    /// condition (and its transition time) when nothing observable changed.
    #[must_use]
    fn merge_from(&self, other: &Self) -> Self;
}

impl ConditionsExt for Vec<Condition> {
    fn merge_from(&self, other: &Self) -> Self {
        let mut results: Vec<_> = self
            .iter()
            .map(|current| match other.iter().find(|o| current.type_ == o.type_) {
                Some(next) if !is_transition(current, next) => current.clone(),
                Some(next) => next.clone(),
                None => current.clone(),
            })
            .collect();

        results.extend(
            other
                .iter()
                .filter(|next| !self.iter().any(|current| current.type_ == next.type_))
                .cloned(),
        );

        results
    }
}

fn is_transition(current: &Condition, next: &Condition) -> bool {
    current.status != next.status || current.reason != next.reason || current.message != next.message
}
