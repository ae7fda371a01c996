use crate::helpe::*;

/// Human-readable trace of what happened, one `[Tnnn] ...` line per
/// state transition.
///
/// Unlike a plain `Vec`, the log is a ring buffer: once `capacity` lines
/// are stored, each new line evicts the oldest one. Long runs thus keep
/// memory bounded; the number of evicted lines is kept for reference.
#[derive(Debug, Clone)]
pub struct EventLog {
    lines:      VecDeque<String>,
    capacity:   usize,
    evicted:    u64,
}

impl EventLog {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines:      VecDeque::with_capacity(capacity),
            capacity,
            evicted:    0,
        }
    }

    pub fn record(&mut self, tick: Ticks, message: impl AsRef<str>) {
        let line = format!("[T{:03}] {}", tick, message.as_ref());
        debug!(target: "partsim::events", "{line}");
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
            self.evicted += 1;
        }
        self.lines.push_back(line);
    }

    /// Retained lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_ticks() {
        let mut log = EventLog::new(4);
        log.record(7, "hello");
        log.record(123, String::from("world"));
        assert_eq!(log.lines(), vec!["[T007] hello", "[T123] world"]);
    }

    #[test]
    fn evicts_oldest() {
        let mut log = EventLog::new(2);
        for t in 0..5 {
            log.record(t, format!("line {t}"));
        }
        assert_eq!(log.evicted(), 3);
        assert_eq!(log.lines(), vec!["[T003] line 3", "[T004] line 4"]);
    }

    #[test]
    fn zero_capacity_keeps_one() {
        let mut log = EventLog::new(0);
        log.record(0, "a");
        log.record(1, "b");
        assert_eq!(log.lines(), vec!["[T001] b"]);
        assert_eq!(log.evicted(), 1);
    }
}
