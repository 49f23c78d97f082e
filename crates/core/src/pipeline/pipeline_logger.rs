use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for ingest runs: progress, per-stage timings and counters.
///
/// Use cases report through this trait so the CLI can print progress while
/// tests stay silent.
pub trait PipelineLogger: Send {
    /// Frames read so far out of the reported total (0 when unknown).
    fn progress(&mut self, current: usize, total: usize);

    /// Time spent in a named stage for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// A per-frame measurement, such as faces found.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

#[derive(Default, Clone, Copy, Debug, PartialEq)]
struct Running {
    count: usize,
    total: f64,
}

impl Running {
    fn push(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Logs progress through the `log` crate every `throttle_frames` frames and
/// keeps running stage totals for the summary.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: BTreeMap<String, Running>,
    metrics: BTreeMap<String, Running>,
    start_time: Instant,
    frames_seen: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            start_time: Instant::now(),
            frames_seen: 0,
        }
    }

    /// Formatted summary, or `None` when nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Ingest summary ({} frames read, {elapsed_s:.1}s):",
            self.frames_seen
        )];

        for (stage, t) in &self.timings {
            lines.push(format!(
                "  {stage:10}: {} calls, avg {:6.1}ms, total {:7.0}ms",
                t.count,
                t.mean(),
                t.total
            ));
        }
        for (name, m) in &self.metrics {
            lines.push(format!("  {name}: avg {:.1}, total {:.0}", m.mean(), m.total));
        }
        if self.frames_seen > 0 && elapsed_s > 0.0 {
            lines.push(format!(
                "  Throughput: {:.1} fps",
                self.frames_seen as f64 / elapsed_s
            ));
        }

        Some(lines.join("\n"))
    }

    pub fn mean_timing(&self, stage: &str) -> Option<f64> {
        self.timings.get(stage).map(Running::mean)
    }

    pub fn metric_total(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(|m| m.total)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(50)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = self.frames_seen.max(current);
        if current % self.throttle_frames != 0 && current != total {
            return;
        }
        if total > 0 {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processing: {current}/{total} frames ({pct:.1}%)");
        } else {
            log::info!("Processing: {current} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings.entry(stage.to_string()).or_default().push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}
