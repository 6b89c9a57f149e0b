use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic-enough nanosecond clock used to mint ids. Not a cryptographic
/// source; collisions would require two ids minted in the same nanosecond.
pub fn now_nanos() -> i128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i128)
        .unwrap_or(0)
}

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn generate_run_id(workflow_name: &str) -> String {
    format!("run-{workflow_name}-{}", now_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_embed_the_workflow_name() {
        let id = generate_run_id("triage");
        assert!(id.starts_with("run-triage-"));
    }
}
