//! Structured run log.
//!
//! Every audit run owns a `RunContext`; the orchestrator and each check log
//! through it. There is no process-global logger — the context is passed
//! explicitly, so two runs in the same process never interleave state.

use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use serde_json::{Map, Value};

use crate::config::{now_ts, AuditConfig};

pub struct RunContext {
    pub run_id: String,
    pub started_at: i64,
    seq: AtomicU64,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl RunContext {
    /// Context logging to stderr.
    pub fn new() -> Self {
        Self::with_sink(Box::new(std::io::stderr()))
    }

    /// Context from config: logs to `AUDIT_LOG` when set, stderr otherwise.
    pub fn from_config(cfg: &AuditConfig) -> Result<Self> {
        match &cfg.log_path {
            Some(path) => {
                if let Some(dir) = Path::new(path).parent() {
                    if !dir.as_os_str().is_empty() {
                        create_dir_all(dir)?;
                    }
                }
                let file = File::create(path)?;
                Ok(Self::with_sink(Box::new(BufWriter::new(file))))
            }
            None => Ok(Self::new()),
        }
    }

    pub fn with_sink(sink: Box<dyn Write + Send>) -> Self {
        let started_at = now_ts();
        Self {
            run_id: format!("audit-{}-{}", started_at, std::process::id()),
            started_at,
            seq: AtomicU64::new(0),
            sink: Mutex::new(sink),
        }
    }

    /// Emit one JSON event line: `{ts, seq, run_id, module, ...fields}`.
    pub fn log(&self, module: &str, fields: &[(&str, Value)]) {
        let mut map = Map::new();
        map.insert("ts".into(), Value::from(now_ts()));
        map.insert("seq".into(), Value::from(self.seq.fetch_add(1, Ordering::SeqCst)));
        map.insert("run_id".into(), Value::from(self.run_id.as_str()));
        map.insert("module".into(), Value::from(module));
        for (k, v) in fields {
            map.insert((*k).to_string(), v.clone());
        }
        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(sink, "{}", Value::Object(map));
            let _ = sink.flush();
        }
    }
}

pub fn v_str(s: &str) -> Value {
    Value::from(s)
}

pub fn v_num(n: f64) -> Value {
    Value::from(n)
}

pub fn v_flag(b: bool) -> Value {
    Value::from(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Clone)]
    struct Shared(Arc<StdMutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn log_lines_are_json_with_sequence() {
        let buf = Shared(Arc::new(StdMutex::new(Vec::new())));
        let ctx = RunContext::with_sink(Box::new(buf.clone()));
        ctx.log("check", &[("stage", v_str("training")), ("rows", v_num(3.0))]);
        ctx.log("check", &[("stage", v_str("ingestion"))]);

        let raw = buf.0.lock().unwrap().clone();
        let text = String::from_utf8(raw).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(first["seq"], Value::from(0));
        assert_eq!(second["seq"], Value::from(1));
        assert_eq!(first["stage"], Value::from("training"));
        assert_eq!(first["run_id"], second["run_id"]);
    }
}
