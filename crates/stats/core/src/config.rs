/// Graph tuning parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GraphConfig {
    /// How many times one attribute may be recomputed during a single
    /// propagation before it is treated as part of a modifier loop and left
    /// at its last value.
    pub max_recompute_passes: u32,

    /// How many times one condition may flip during a single propagation
    /// before further flips are ignored (a stat block feeding its own
    /// condition).
    pub max_condition_toggles: u32,
}

impl GraphConfig {
    pub const DEFAULT_MAX_RECOMPUTE_PASSES: u32 = 64;
    pub const DEFAULT_MAX_CONDITION_TOGGLES: u32 = 16;

    pub fn new() -> Self {
        Self {
            max_recompute_passes: Self::DEFAULT_MAX_RECOMPUTE_PASSES,
            max_condition_toggles: Self::DEFAULT_MAX_CONDITION_TOGGLES,
        }
    }

    #[must_use]
    pub fn with_max_recompute_passes(mut self, passes: u32) -> Self {
        self.max_recompute_passes = passes.max(1);
        self
    }

    #[must_use]
    pub fn with_max_condition_toggles(mut self, toggles: u32) -> Self {
        self.max_condition_toggles = toggles.max(1);
        self
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::new()
    }
}
