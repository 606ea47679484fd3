/// Initialize tracing for a tool or the broker.
///
/// Unknown level names fall back to `info`. Uses `try_init` so tests and
/// libraries can call this more than once without panicking.
pub fn init(level: &str) {
    let level = level.parse().unwrap_or(tracing::Level::INFO);

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::init;

    #[test]
    fn init_accepts_levels() {
        // Should not panic, even when called repeatedly
        init("info");
        init("debug");
        init("not-a-level");
    }
}
