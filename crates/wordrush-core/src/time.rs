/// Milliseconds since the Unix epoch. The engine itself never reads the
/// clock; callers stamp commands with this and pass it in.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
