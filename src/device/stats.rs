use std::{fmt, time::Duration};

use crate::utils::time_util::{self, TimeDurationStruct};

/// weight kept from the previous average on every sample
const AVERAGE_DECAY: f64 = 0.9;

/// running counters of a [BlockStore](super::BlockStore)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskStats {
    pub total_reads: u64,
    pub total_writes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub read_errors: u64,
    pub write_errors: u64,
    pub last_operation_at: Option<TimeDurationStruct>,
    /// exponentially weighted, in seconds
    pub avg_read_time: f64,
    /// exponentially weighted, in seconds
    pub avg_write_time: f64,
}

fn blend(average: f64, sample: Duration) -> f64 {
    let sample = sample.as_secs_f64();
    if average == 0.0 {
        sample
    } else {
        average * AVERAGE_DECAY + sample * (1.0 - AVERAGE_DECAY)
    }
}

impl DiskStats {
    pub(crate) fn record_read(&mut self, bytes: u64, elapsed: Duration) {
        self.total_reads += 1;
        self.bytes_read += bytes;
        self.avg_read_time = blend(self.avg_read_time, elapsed);
        self.touch();
    }

    pub(crate) fn record_write(&mut self, bytes: u64, elapsed: Duration) {
        self.total_writes += 1;
        self.bytes_written += bytes;
        self.avg_write_time = blend(self.avg_write_time, elapsed);
        self.touch();
    }

    pub(crate) fn record_read_error(&mut self) {
        self.read_errors += 1;
        self.touch();
    }

    pub(crate) fn record_write_error(&mut self) {
        self.write_errors += 1;
        self.touch();
    }

    pub(crate) fn touch(&mut self) {
        self.last_operation_at = Some(time_util::now());
    }
}

impl fmt::Display for DiskStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "reads: {} ({} bytes, {} errors, avg {:.3} us)",
            self.total_reads,
            self.bytes_read,
            self.read_errors,
            self.avg_read_time * 1e6
        )?;
        write!(
            f,
            "writes: {} ({} bytes, {} errors, avg {:.3} us)",
            self.total_writes,
            self.bytes_written,
            self.write_errors,
            self.avg_write_time * 1e6
        )
    }
}
