//! Stat emission for durability monitors.
//!
//! Sinks typically write into a network response buffer, so emission can
//! fail; the monitor absorbs sink failures and logs them rather than letting
//! observability take a bucket down.

use std::io;

/// Receives one stat at a time, keyed by vbucket-prefixed name.
pub trait StatSink {
    fn add_stat(&mut self, key: &str, value: &str) -> io::Result<()>;
}

/// In-memory sink, handy for tests and admin snapshots.
impl StatSink for Vec<(String, String)> {
    fn add_stat(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.push((key.to_string(), value.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_collects_pairs() {
        let mut sink: Vec<(String, String)> = Vec::new();
        sink.add_stat("vb_0:state", "replica").unwrap();
        assert_eq!(sink, vec![("vb_0:state".to_string(), "replica".to_string())]);
    }
}
