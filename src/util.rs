use log::info;
use std::time::{Duration, Instant};

pub fn format_hms(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

pub fn print_hms(start: &Instant) {
    info!("Elapsed time: {}", format_hms(start.elapsed()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(Duration::from_secs(0)), "0h00m00s");
        assert_eq!(format_hms(Duration::from_secs(65)), "0h01m05s");
        assert_eq!(format_hms(Duration::from_millis(3_723_900)), "1h02m03s");
    }
}
