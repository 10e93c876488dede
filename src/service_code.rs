use std::sync::OnceLock;

use regex::Regex;

fn digit_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]+").expect("static regex"))
}

/// Extract the 4-digit service code from a descriptive service name.
///
/// The code is the first run of exactly four digits with no digit on either
/// side, so `"ABC-4567-XYZ"` yields `4567` while `"12345"` and `"123"` yield nothing.
pub fn extract_service_code(service_name: &str) -> Option<&str> {
    digit_runs()
        .find_iter(service_name)
        .map(|m| m.as_str())
        .find(|run| run.len() == 4)
}
