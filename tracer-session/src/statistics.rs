//! Link statistics collection

/// Counters kept by a [`LinkSession`](crate::LinkSession)
///
/// Updated as frames are sent, received and rejected. Query them at any
/// time to judge the health of the serial line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStatistics {
    /// Request frames written to the link
    pub frames_sent: u64,
    /// Valid frames decoded from the link
    pub frames_received: u64,
    /// Candidates rejected after a sync marker was found
    pub frames_rejected: u64,
    /// Rejections caused by a checksum mismatch
    pub checksum_errors: u64,
    /// Bytes skipped while hunting for a sync marker
    pub garbage_bytes: u64,
    /// Valid frames that did not answer the outstanding request
    pub uncorrelated_frames: u64,
    /// Receive deadlines that expired
    pub timeouts: u64,
    /// Bytes thrown away by explicit drains
    pub drained_bytes: u64,
}

impl LinkStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all counters to zero
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn increment_frames_sent(&mut self) {
        self.frames_sent += 1;
    }

    pub fn increment_frames_received(&mut self) {
        self.frames_received += 1;
    }

    /// Count a rejected candidate, and a checksum error if that was the cause
    pub fn record_rejection(&mut self, checksum_error: bool) {
        self.frames_rejected += 1;
        if checksum_error {
            self.checksum_errors += 1;
        }
    }

    pub fn add_garbage_bytes(&mut self, count: usize) {
        self.garbage_bytes += count as u64;
    }

    pub fn increment_uncorrelated_frames(&mut self) {
        self.uncorrelated_frames += 1;
    }

    pub fn increment_timeouts(&mut self) {
        self.timeouts += 1;
    }

    pub fn add_drained_bytes(&mut self, count: usize) {
        self.drained_bytes += count as u64;
    }

    /// Share of frame candidates that were rejected, as a percentage
    ///
    /// Returns 0.0 before any candidate has been seen.
    pub fn error_rate(&self) -> f64 {
        let candidates = self.frames_received + self.frames_rejected;
        if candidates == 0 {
            0.0
        } else {
            (self.frames_rejected as f64 / candidates as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_rate() {
        let mut stats = LinkStatistics::new();
        assert_eq!(stats.error_rate(), 0.0);

        stats.increment_frames_received();
        stats.increment_frames_received();
        stats.increment_frames_received();
        stats.record_rejection(true);
        assert_eq!(stats.checksum_errors, 1);
        assert!((stats.error_rate() - 25.0).abs() < f64::EPSILON);

        stats.clear();
        assert_eq!(stats, LinkStatistics::default());
    }
}
