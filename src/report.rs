// RunResult rendering: human-readable summary and stable JSON.
use std::fmt::Write as _;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

use scanspeed::core::engine::RunResult;

const MIB: f64 = 1024.0 * 1024.0;

pub fn human_report(result: &RunResult) -> String {
    let effective_threads = result.thread_pool_size.max(1);
    let real_s = result.wall_time.as_secs_f64().max(1e-9);
    let decoded_mib_s = result.decoded_bytes as f64 / real_s / MIB;
    let raw_mib_s = result.raw_bytes as f64 / real_s / MIB;

    let mut out = String::new();
    let _ = writeln!(out, "Thread pool size:     {}", result.thread_pool_size);
    if result.setup_wall_time > Duration::ZERO {
        let _ = writeln!(
            out,
            "Setup real time:      {:.6} s",
            result.setup_wall_time.as_secs_f64()
        );
        let _ = writeln!(
            out,
            "Setup CPU time:       {:.6} s",
            result.setup_cpu_time.as_secs_f64()
        );
    }
    let _ = writeln!(out, "Real time:            {:.6} s", result.wall_time.as_secs_f64());
    let _ = writeln!(out, "CPU time:             {:.6} s", result.cpu_time.as_secs_f64());
    let _ = writeln!(out, "Decoded data read:    {} bytes", result.decoded_bytes);
    let _ = writeln!(out, "Raw data read:        {} bytes", result.raw_bytes);
    let _ = writeln!(out, "Decoded throughput:   {decoded_mib_s:.2} MiB/s");
    let _ = writeln!(
        out,
        "                      {:.2} MiB/s/thread for {effective_threads} threads",
        decoded_mib_s / effective_threads as f64
    );
    let _ = writeln!(out, "Raw throughput:       {raw_mib_s:.2} MiB/s");
    let _ = writeln!(
        out,
        "                      {:.2} MiB/s/thread for {effective_threads} threads",
        raw_mib_s / effective_threads as f64
    );
    out
}

pub fn json_report(result: &RunResult, version: &str) -> Value {
    let effective_threads = result.thread_pool_size.max(1);
    let real_s = result.wall_time.as_secs_f64().max(1e-9);
    let decoded_mib_s = result.decoded_bytes as f64 / real_s / MIB;
    let raw_mib_s = result.raw_bytes as f64 / real_s / MIB;

    json!({
        "name": "scanspeed",
        "version": version,
        "ts": rfc3339_now(SystemTime::now()),
        "threads": result.thread_pool_size,
        "setup": {
            "real_s": result.setup_wall_time.as_secs_f64(),
            "cpu_s": result.setup_cpu_time.as_secs_f64(),
        },
        "real_s": result.wall_time.as_secs_f64(),
        "cpu_s": result.cpu_time.as_secs_f64(),
        "decoded_bytes": result.decoded_bytes,
        "raw_bytes": result.raw_bytes,
        "decoded_mib_per_s": decoded_mib_s,
        "raw_mib_per_s": raw_mib_s,
        "per_thread": {
            "threads": effective_threads,
            "decoded_mib_per_s": decoded_mib_s / effective_threads as f64,
            "raw_mib_per_s": raw_mib_s / effective_threads as f64,
        },
    })
}

fn rfc3339_now(ts: SystemTime) -> String {
    let dur = ts.duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = dur.as_secs() as i64;
    let nsec = dur.subsec_nanos();
    let tm = time::OffsetDateTime::from_unix_timestamp(secs)
        .unwrap_or_else(|_| time::OffsetDateTime::UNIX_EPOCH);
    let tm = tm.replace_nanosecond(nsec).unwrap_or(tm);
    tm.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
