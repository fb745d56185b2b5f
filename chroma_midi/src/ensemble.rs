//! The named collection of instrument channels and the sweep period they
//! all follow.

use std::collections::BTreeMap;

use crate::channel::InstrumentChannel;
use crate::error::{MusicError, Result};

/// Default full-sweep period across the frame, in seconds.
pub const DEFAULT_PERIOD: f64 = 4.0;

// ════════════════════════════════════════════════════════════════════════════
// Ensemble
// ════════════════════════════════════════════════════════════════════════════

/// All configured voices, addressed by name, plus the one global sweep
/// period.  The map is ordered so iteration (and therefore per-frame
/// dispatch) is deterministic in channel name.
pub struct Ensemble {
    channels: BTreeMap<String, InstrumentChannel>,
    period:   f64,
}

impl Default for Ensemble {
    fn default() -> Self {
        Self::new()
    }
}

impl Ensemble {
    pub fn new() -> Ensemble {
        Ensemble {
            channels: BTreeMap::new(),
            period:   DEFAULT_PERIOD,
        }
    }

    /// Register a voice under `name`, replacing any previous holder of
    /// that name.
    pub fn add_channel(&mut self, name: impl Into<String>, channel: InstrumentChannel) {
        self.channels.insert(name.into(), channel);
    }

    pub fn channel(&self, name: &str) -> Result<&InstrumentChannel> {
        self.channels
            .get(name)
            .ok_or_else(|| MusicError::UnknownChannel(name.to_string()))
    }

    pub fn channel_mut(&mut self, name: &str) -> Result<&mut InstrumentChannel> {
        self.channels
            .get_mut(name)
            .ok_or_else(|| MusicError::UnknownChannel(name.to_string()))
    }

    /// Channel names in iteration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut InstrumentChannel)> {
        self.channels.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Sweep period in seconds.  Rejects zero and negatives: the sweep
    /// position divides by this.
    pub fn set_period(&mut self, period: f64) -> Result<()> {
        if period <= 0.0 || !period.is_finite() {
            return Err(MusicError::InvalidPeriod(period));
        }
        self.period = period;
        Ok(())
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    /// Force every channel's notes off.
    pub fn silence(&mut self) {
        for channel in self.channels.values_mut() {
            channel.silence();
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
