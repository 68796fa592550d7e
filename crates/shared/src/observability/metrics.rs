//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    server_handle: tokio::task::JoinHandle<()>,
}

impl MetricsHandle {
    /// 停止指标 HTTP 服务器
    pub fn shutdown(self) {
        self.server_handle.abort();
    }
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_metrics();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle { server_handle })
}

/// 注册指标描述
fn describe_metrics() {
    metrics::describe_counter!(
        "ledger_rewards_created_total",
        "Total number of reward entries created"
    );
    metrics::describe_counter!(
        "ledger_rewards_duplicate_total",
        "Total number of reward requests answered with an existing entry"
    );
    metrics::describe_counter!(
        "ledger_transitions_total",
        "Total number of ledger status transitions"
    );
    metrics::describe_counter!("ledger_reversals_total", "Total number of reversals");
    metrics::describe_counter!("rule_evaluations_total", "Total number of rule engine evaluations");
    metrics::describe_counter!("rule_matches_total", "Total number of fired rules");
    metrics::describe_histogram!(
        "rule_evaluation_duration_seconds",
        "Rule engine evaluation duration in seconds"
    );
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录奖励创建（duplicate 表示命中幂等键）
#[inline]
pub fn record_reward_created(duplicate: bool) {
    if duplicate {
        metrics::counter!("ledger_rewards_duplicate_total").increment(1);
    } else {
        metrics::counter!("ledger_rewards_created_total").increment(1);
    }
}

/// 记录状态流转
#[inline]
pub fn record_transition(to: &str) {
    metrics::counter!("ledger_transitions_total", "to" => to.to_string()).increment(1);
    if to == "reversed" {
        metrics::counter!("ledger_reversals_total").increment(1);
    }
}

/// 记录规则评估
#[inline]
pub fn record_rule_evaluation(matched_rules: usize, duration_secs: f64) {
    metrics::counter!("rule_evaluations_total").increment(1);
    metrics::counter!("rule_matches_total").increment(matched_rules as u64);
    metrics::histogram!("rule_evaluation_duration_seconds").record(duration_secs);
}
