// Phase timing: wall clock plus process CPU time (all threads).
use std::time::{Duration, Instant};

pub struct Stopwatch {
    wall_start: Instant,
    cpu_start: Duration,
    wall: Duration,
    cpu: Duration,
    running: bool,
}

impl Stopwatch {
    pub fn started() -> Self {
        Self {
            wall_start: Instant::now(),
            cpu_start: process_cpu_time(),
            wall: Duration::ZERO,
            cpu: Duration::ZERO,
            running: true,
        }
    }

    pub fn stop(&mut self) {
        if self.running {
            self.wall += self.wall_start.elapsed();
            self.cpu += process_cpu_time().saturating_sub(self.cpu_start);
            self.running = false;
        }
    }

    pub fn wall_time(&self) -> Duration {
        self.wall
    }

    pub fn cpu_time(&self) -> Duration {
        self.cpu
    }
}

/// User plus system CPU time consumed by the whole process so far. Worker
/// threads count toward this, so a parallel phase can report more CPU time
/// than wall time.
fn process_cpu_time() -> Duration {
    let mut usage = unsafe { std::mem::zeroed::<libc::rusage>() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return Duration::ZERO;
    }
    timeval_to_duration(usage.ru_utime) + timeval_to_duration(usage.ru_stime)
}

fn timeval_to_duration(tv: libc::timeval) -> Duration {
    Duration::new(tv.tv_sec.max(0) as u64, (tv.tv_usec.max(0) as u32) * 1000)
}
