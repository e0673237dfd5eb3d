//! Bridge 指标收集模块
//!
//! Feed 订阅与 sink 分发的 Prometheus 指标。

use metrics::{counter, gauge, histogram};

/// 记录一次 feed 连接尝试
pub fn record_feed_connect_attempt() {
    counter!("bridge_feed_connect_attempts_total").increment(1);
}

/// 记录一次 feed 连接失败
pub fn record_feed_connect_failure() {
    counter!("bridge_feed_connect_failures_total").increment(1);
}

/// 记录已建立连接的断开
pub fn record_feed_connection_lost() {
    counter!("bridge_feed_connection_lost_total").increment(1);
}

/// 记录 feed 连接状态 (1 = connected)
pub fn record_feed_state(connected: bool) {
    gauge!("bridge_feed_connected").set(if connected { 1.0 } else { 0.0 });
}

/// 记录收到的消息
pub fn record_feed_message(payload_bytes: usize) {
    counter!("bridge_feed_messages_total").increment(1);
    histogram!("bridge_feed_payload_bytes").record(payload_bytes as f64);
}

/// 记录单个 sink 的写入结果
///
/// `outcome` 为 `ok` 或 `SinkError::kind()` 的取值。
pub fn record_sink_write(sink_name: &str, outcome: &str, latency_ms: f64) {
    counter!(
        "bridge_sink_writes_total",
        "sink" => sink_name.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!(
        "bridge_sink_write_latency_ms",
        "sink" => sink_name.to_string()
    )
    .record(latency_ms);
}

/// 记录 sink 队列深度
pub fn record_sink_queue_depth(sink_name: &str, depth: usize) {
    gauge!(
        "bridge_sink_queue_depth",
        "sink" => sink_name.to_string()
    )
    .set(depth as f64);
}

/// 记录一次完整分发 (所有 sink 完成)
pub fn record_dispatch(failed_sinks: usize, latency_ms: f64) {
    counter!("bridge_dispatch_total").increment(1);
    if failed_sinks > 0 {
        counter!("bridge_dispatch_partial_failures_total").increment(1);
    }
    histogram!("bridge_dispatch_latency_ms").record(latency_ms);
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
