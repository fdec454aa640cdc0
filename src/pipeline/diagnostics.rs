//! Scrubbing of upstream samples before they reach logs or responses.

const REDACTED: &str = "[REDACTED]";
const TRUNCATED: &str = "...[truncated]";

/// Remove every occurrence of `secrets` from `raw` and cap it at `max_chars`.
pub fn scrub_sample(raw: &str, secrets: &[&str], max_chars: usize) -> String {
    let mut sample = raw.to_string();
    for secret in secrets.iter().filter(|s| !s.is_empty()) {
        sample = sample.replace(secret, REDACTED);
    }

    match sample.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            sample.truncate(cut);
            sample.push_str(TRUNCATED);
            sample
        }
        None => sample,
    }
}
