use crate::helpe::*;

/// Logical time. Starts at zero and only ever moves forward, one tick per
/// simulation step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clock {
    now: Ticks,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn now(&self) -> Ticks {
        self.now
    }

    /// Moves to the next tick and returns it.
    pub fn advance(&mut self) -> Ticks {
        self.now += 1;
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_one_at_a_time() {
        let mut c = Clock::new();
        assert_eq!(c.now(), 0);
        assert_eq!(c.advance(), 1);
        assert_eq!(c.advance(), 2);
        assert_eq!(c.now(), 2);
    }
}
