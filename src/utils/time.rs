use chrono::{DateTime, Duration, Utc};

pub fn deadline(started_at: DateTime<Utc>, duration_seconds: i64) -> DateTime<Utc> {
    started_at + Duration::seconds(duration_seconds)
}

pub fn remaining_seconds(
    started_at: DateTime<Utc>,
    duration_seconds: i64,
    at: DateTime<Utc>,
) -> i64 {
    (deadline(started_at, duration_seconds) - at)
        .num_seconds()
        .max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_never_goes_negative() {
        let started = Utc::now();
        assert_eq!(remaining_seconds(started, 0, started + Duration::seconds(5)), 0);
        assert_eq!(remaining_seconds(started, 10, started), 10);
    }
}
