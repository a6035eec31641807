use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub matches_total: IntCounterVec,
    pub matching_latency_seconds: HistogramVec,
    pub offers_total: IntCounter,
    pub drivers_tracked: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let matches_total = IntCounterVec::new(
            Opts::new("matches_total", "Completed matching runs by outcome"),
            &["outcome"],
        )
        .expect("valid matches_total metric");

        let matching_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "matching_latency_seconds",
                "Duration of matching runs in seconds",
            ),
            &["outcome"],
        )
        .expect("valid matching_latency_seconds metric");

        let offers_total = IntCounter::new("offers_total", "Ride offers sent to drivers")
            .expect("valid offers_total metric");

        let drivers_tracked =
            IntGauge::new("drivers_tracked", "Drivers currently in the spatial index")
                .expect("valid drivers_tracked metric");

        registry
            .register(Box::new(matches_total.clone()))
            .expect("register matches_total");
        registry
            .register(Box::new(matching_latency_seconds.clone()))
            .expect("register matching_latency_seconds");
        registry
            .register(Box::new(offers_total.clone()))
            .expect("register offers_total");
        registry
            .register(Box::new(drivers_tracked.clone()))
            .expect("register drivers_tracked");

        Self {
            registry,
            matches_total,
            matching_latency_seconds,
            offers_total,
            drivers_tracked,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
