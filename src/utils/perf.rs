//! Memory and timing measurements for the command-line runners.

use std::time::{Duration, Instant};

/// Peak resident set size of this process in kilobytes, read from the `VmHWM` line of
/// `/proc/self/status`. Returns 0 when the file or the line cannot be read.
#[cfg(target_os = "linux")]
pub fn get_peak_rss_kb() -> u64 {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| {
            status
                .lines()
                .find_map(|line| line.strip_prefix("VmHWM:"))
                .and_then(|rest| rest.split_whitespace().next())
                .and_then(|kb| kb.parse().ok())
        })
        .unwrap_or(0)
}

/// Always 0 outside Linux; a warning is logged once.
#[cfg(not(target_os = "linux"))]
pub fn get_peak_rss_kb() -> u64 {
    use std::sync::Once;
    static WARN_ONCE: Once = Once::new();
    WARN_ONCE.call_once(|| {
        log::warn!("Peak RSS measurement is only supported on Linux; reporting 0.");
    });
    0
}

/// Runs `f` and returns its output together with the wall-clock time it took.
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let output = f();
    (output, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_returns_output() {
        let (value, elapsed) = timed(|| 21 * 2);
        assert_eq!(value, 42);
        assert!(elapsed <= Duration::from_secs(1));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_peak_rss_is_positive_on_linux() {
        assert!(get_peak_rss_kb() > 0);
    }
}
