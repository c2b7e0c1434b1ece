use serde::Serialize;

/// Current and maximum health. `0 <= current <= max` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Health {
    current: u32,
    max: u32,
}

/// What one update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthChange {
    pub previous: u32,
    pub current: u32,
    /// Health reached zero in this update (not before it).
    pub depleted: bool,
}

impl Health {
    pub fn new(max: u32) -> Self {
        Health { current: max, max }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn is_depleted(&self) -> bool {
        self.current == 0
    }

    pub fn ratio(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        f64::from(self.current) / f64::from(self.max)
    }

    pub fn damage(&mut self, amount: u32) -> HealthChange {
        self.update(-i64::from(amount))
    }

    pub fn heal(&mut self, amount: u32) -> HealthChange {
        self.update(i64::from(amount))
    }

    /// The one place health changes: add `delta` and clamp into `0..=max`.
    pub fn update(&mut self, delta: i64) -> HealthChange {
        let previous = self.current;
        let next = (i64::from(previous) + delta).clamp(0, i64::from(self.max));
        self.current = next as u32;
        HealthChange {
            previous,
            current: self.current,
            depleted: previous > 0 && self.current == 0,
        }
    }
}
