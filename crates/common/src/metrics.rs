use prometheus::{
    Encoder, IntCounter, IntCounterVec, Opts, TextEncoder, register_int_counter,
    register_int_counter_vec,
};
use std::sync::OnceLock;

const METRIC_PREFIX: &str = "gatekeeper";

/// Metrics 注册结果，可能包含注册错误
type MetricRegistration<T> = Result<T, prometheus::Error>;

fn cert_cache_lookups_total() -> &'static MetricRegistration<IntCounterVec> {
    static METRIC: OnceLock<MetricRegistration<IntCounterVec>> = OnceLock::new();
    METRIC.get_or_init(|| {
        register_int_counter_vec!(
            Opts::new(
                format!("{METRIC_PREFIX}_cert_cache_lookups_total"),
                "证书缓存查询次数（按命中结果）"
            ),
            &["result"]
        )
    })
}

fn cert_store_queries_total() -> &'static MetricRegistration<IntCounter> {
    static METRIC: OnceLock<MetricRegistration<IntCounter>> = OnceLock::new();
    METRIC.get_or_init(|| {
        register_int_counter!(
            format!("{METRIC_PREFIX}_cert_store_queries_total"),
            "证书库查询次数"
        )
    })
}

fn cert_resolved_total() -> &'static MetricRegistration<IntCounterVec> {
    static METRIC: OnceLock<MetricRegistration<IntCounterVec>> = OnceLock::new();
    METRIC.get_or_init(|| {
        register_int_counter_vec!(
            Opts::new(
                format!("{METRIC_PREFIX}_cert_resolved_total"),
                "从证书库解析出的证书数（按匹配方式）"
            ),
            &["match"]
        )
    })
}

fn policy_evaluations_total() -> &'static MetricRegistration<IntCounterVec> {
    static METRIC: OnceLock<MetricRegistration<IntCounterVec>> = OnceLock::new();
    METRIC.get_or_init(|| {
        register_int_counter_vec!(
            Opts::new(
                format!("{METRIC_PREFIX}_policy_evaluations_total"),
                "访问策略评估次数（按结果）"
            ),
            &["outcome"]
        )
    })
}

pub fn inc_cert_cache_hit() {
    if let Ok(counter) = cert_cache_lookups_total() {
        counter.with_label_values(&["hit"]).inc();
    }
}

pub fn inc_cert_cache_miss() {
    if let Ok(counter) = cert_cache_lookups_total() {
        counter.with_label_values(&["miss"]).inc();
    }
}

pub fn inc_cert_store_query() {
    if let Ok(counter) = cert_store_queries_total() {
        counter.inc();
    }
}

/// `kind` 为 `exact` 或 `wildcard`
pub fn inc_cert_resolved(kind: &str) {
    if let Ok(counter) = cert_resolved_total() {
        counter.with_label_values(&[kind]).inc();
    }
}

/// `outcome` 为 `allowed`、`denied` 或 `bypassed`
pub fn inc_policy_evaluation(outcome: &str) {
    if let Ok(counter) = policy_evaluations_total() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
