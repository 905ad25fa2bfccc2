use std::time::Duration;

pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

pub(crate) fn retry_delay(
    base_delay_ms: u64,
    attempt: usize,
    retry_after_seconds: Option<u64>,
) -> Duration {
    if let Some(retry_after_seconds) = retry_after_seconds {
        return Duration::from_secs(retry_after_seconds);
    }
    let exponent = attempt.saturating_sub(1).min(6) as u32;
    let scale = 2_u64.pow(exponent);
    Duration::from_millis(base_delay_ms.max(1).saturating_mul(scale))
}

pub(crate) fn is_retryable_slack_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub(crate) fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

pub(crate) fn truncate_for_error(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated = value.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    use super::{
        is_retryable_slack_status, parse_retry_after, retry_delay, truncate_for_error,
    };

    fn headers_with_retry_after(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn unit_parse_retry_after_reads_whole_seconds_only() {
        assert_eq!(parse_retry_after(&headers_with_retry_after("30")), Some(30));
        assert_eq!(parse_retry_after(&headers_with_retry_after(" 2 ")), Some(2));
        // Slack sends whole seconds; anything else means no usable hint.
        assert_eq!(parse_retry_after(&headers_with_retry_after("1.5")), None);
        assert_eq!(parse_retry_after(&headers_with_retry_after("soon")), None);
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn unit_retry_delay_doubles_per_attempt_until_the_cap() {
        assert_eq!(retry_delay(250, 1, None), Duration::from_millis(250));
        assert_eq!(retry_delay(250, 2, None), Duration::from_millis(500));
        assert_eq!(retry_delay(250, 4, None), Duration::from_millis(2_000));
        // Exponent is capped, so late attempts stop growing.
        assert_eq!(retry_delay(250, 20, None), Duration::from_millis(16_000));
    }

    #[test]
    fn unit_retry_delay_lets_the_server_hint_win() {
        assert_eq!(retry_delay(250, 5, Some(2)), Duration::from_secs(2));
        assert_eq!(retry_delay(250, 1, Some(0)), Duration::from_secs(0));
    }

    #[test]
    fn unit_is_retryable_slack_status_matches_rate_limits_and_5xx() {
        assert!(is_retryable_slack_status(429));
        assert!(is_retryable_slack_status(500));
        assert!(is_retryable_slack_status(502));
        assert!(is_retryable_slack_status(599));
        assert!(!is_retryable_slack_status(200));
        assert!(!is_retryable_slack_status(401));
        assert!(!is_retryable_slack_status(404));
    }

    #[test]
    fn regression_truncate_for_error_counts_chars_not_bytes() {
        let body = "reação inválida";
        assert_eq!(truncate_for_error(body, 40), body);
        assert_eq!(truncate_for_error(body, 6), "reação...");
        assert_eq!(truncate_for_error(body, 0), "...");
    }
}
