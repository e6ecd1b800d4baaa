use std::time::SystemTime;

/// Wall clock in unix seconds.
///
/// Nothing in the engine calls this; it is for callers that want to project
/// interest up to "now" and have no better clock at hand.
pub fn system_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("system time after epoch start")
        .as_secs()
}
