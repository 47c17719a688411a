use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, MeterProvider as _},
};

use crate::Error;

#[derive(Clone)]
pub struct Metrics {
    kubernetes_api_usage_total: Counter<u64>,
    reconciliation_errors_total: Counter<u64>,
    reconciliations_total: Counter<u64>,
    reconcile_duration_seconds: Histogram<f64>,
}

impl Metrics {
    #[must_use]
    pub fn new(provider: &opentelemetry_sdk::metrics::SdkMeterProvider) -> Self {
        let meter = provider.meter("ssh-access-operator");

        Self {
            kubernetes_api_usage_total: meter
                .u64_counter("ssh_access_operator_kubernetes_api_usage_total")
                .with_description("The total number of Kubernetes API requests made.")
                .build(),
            reconciliation_errors_total: meter
                .u64_counter("ssh_access_operator_reconciliation_errors_total")
                .with_description("The total number of reconciliation errors.")
                .build(),
            reconciliations_total: meter
                .u64_counter("ssh_access_operator_reconciliations_total")
                .with_description("The total number of reconciliations.")
                .build(),
            reconcile_duration_seconds: meter
                .f64_histogram("ssh_access_operator_reconcile_duration_seconds")
                .with_description("The reconcile duration in seconds.")
                .with_unit("s")
                .build(),
        }
    }

    /// Counts a reconciliation and records its duration once the returned
    /// timer is dropped.
    #[must_use]
    pub fn count_and_measure(&self, controller: &'static str) -> ControllerTimer {
        self.reconciliations_total
            .add(1, &[KeyValue::new("controller", controller)]);
        ControllerTimer {
            start: std::time::Instant::now(),
            metric: self.reconcile_duration_seconds.clone(),
            controller,
        }
    }

    pub fn reconcile_failure(&self, controller: &'static str, error: &Error) {
        let error = match error {
            Error::Kube(_) => "kube",
            Error::MissingObjectKey(_) => "missing object key",
        };
        self.reconciliation_errors_total.add(
            1,
            &[
                KeyValue::new("controller", controller),
                KeyValue::new("error", error),
            ],
        );
    }

    pub fn kubernetes_api_usage_count<R>(&self, verb: &'static str)
    where
        R: kube::Resource<DynamicType = ()>,
    {
        self.kubernetes_api_usage_total.add(
            1,
            &[
                KeyValue::new("kind", R::kind(&()).to_string()),
                KeyValue::new("group", R::group(&()).to_string()),
                KeyValue::new("verb", verb),
                KeyValue::new("version", R::version(&()).to_string()),
            ],
        );
    }
}

pub struct ControllerTimer {
    start: std::time::Instant,
    metric: Histogram<f64>,
    controller: &'static str,
}

impl Drop for ControllerTimer {
    fn drop(&mut self) {
        self.metric.record(
            self.start.elapsed().as_secs_f64(),
            &[KeyValue::new("controller", self.controller)],
        );
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::apps::v1::Deployment;
    use opentelemetry_sdk::metrics::{
        InMemoryMetricExporter, SdkMeterProvider,
        data::{AggregatedMetrics, MetricData, ResourceMetrics},
    };

    use crate::Error;

    use super::Metrics;

    fn counter(metrics: &[ResourceMetrics], name: &str) -> u64 {
        metrics
            .iter()
            .flat_map(ResourceMetrics::scope_metrics)
            .flat_map(|scope| scope.metrics())
            .filter(|metric| metric.name() == name)
            .map(|metric| match metric.data() {
                AggregatedMetrics::U64(MetricData::Sum(sum)) => {
                    sum.data_points().map(|point| point.value()).sum()
                }
                _ => 0,
            })
            .sum()
    }

    fn histogram_count(metrics: &[ResourceMetrics], name: &str) -> u64 {
        metrics
            .iter()
            .flat_map(ResourceMetrics::scope_metrics)
            .flat_map(|scope| scope.metrics())
            .filter(|metric| metric.name() == name)
            .map(|metric| match metric.data() {
                AggregatedMetrics::F64(MetricData::Histogram(histogram)) => {
                    histogram.data_points().map(|point| point.count()).sum()
                }
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn records_reconciliations_and_api_usage() {
        // arrange
        let exporter = InMemoryMetricExporter::default();
        let provider = SdkMeterProvider::builder()
            .with_periodic_exporter(exporter.clone())
            .build();
        let metrics = Metrics::new(&provider);

        // act
        let timer = metrics.count_and_measure("ssh-access");
        metrics.kubernetes_api_usage_count::<Deployment>("get");
        metrics.kubernetes_api_usage_count::<Deployment>("patch");
        metrics.reconcile_failure("ssh-access", &Error::MissingObjectKey(".metadata.name"));
        drop(timer);
        provider.force_flush().unwrap();

        // assert
        let exported = exporter.get_finished_metrics().unwrap();
        assert_eq!(
            1,
            counter(&exported, "ssh_access_operator_reconciliations_total")
        );
        assert_eq!(
            2,
            counter(&exported, "ssh_access_operator_kubernetes_api_usage_total")
        );
        assert_eq!(
            1,
            counter(&exported, "ssh_access_operator_reconciliation_errors_total")
        );
        assert_eq!(
            1,
            histogram_count(&exported, "ssh_access_operator_reconcile_duration_seconds")
        );
    }
}
