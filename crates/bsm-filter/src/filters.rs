//! The velocity band filter and the vehicle-id redactor.

use std::collections::HashSet;

use crate::ConfigMap;

/// Default retained velocity band, meters per second (5..80 mph).
pub const DEFAULT_MIN_VELOCITY: f64 = 2.235;
pub const DEFAULT_MAX_VELOCITY: f64 = 35.763;

/// Default replacement written over redacted ids.
pub const DEFAULT_REDACTION_VALUE: &str = "FFFFFFFF";

/// Suppresses messages whose speed falls outside `[min, max]`; both bounds
/// retain.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityFilter {
    min: f64,
    max: f64,
}

impl VelocityFilter {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Read `privacy.filter.velocity.min` / `.max`, falling back to the
    /// defaults for missing or unreadable values.
    pub fn from_config(config: &ConfigMap) -> Self {
        let get = |key: &str, fallback: f64| {
            config
                .get(key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(fallback)
        };
        Self {
            min: get("privacy.filter.velocity.min", DEFAULT_MIN_VELOCITY),
            max: get("privacy.filter.velocity.max", DEFAULT_MAX_VELOCITY),
        }
    }

    pub fn set_min(&mut self, min: f64) {
        self.min = min;
    }

    pub fn set_max(&mut self, max: f64) {
        self.max = max;
    }

    pub fn suppress(&self, velocity: f64) -> bool {
        velocity < self.min || velocity > self.max
    }

    pub fn retain(&self, velocity: f64) -> bool {
        !self.suppress(velocity)
    }
}

impl Default for VelocityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_VELOCITY, DEFAULT_MAX_VELOCITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RedactionPolicy {
    /// Every id is overwritten.
    All,
    /// No id is touched.
    Nothing,
    /// Only ids on the inclusion list are overwritten.
    Inclusions,
}

/// Rewrites vehicle ids with a fixed replacement value.
///
/// The redactor is either in "redact everything" mode, "redact nothing"
/// mode, or restricted to an inclusion list. [`IdRedactor::num_inclusions`]
/// reports -1 in redact-everything mode; downstream tooling keys off that
/// sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct IdRedactor {
    value: String,
    inclusions: HashSet<String>,
    policy: RedactionPolicy,
}

impl IdRedactor {
    /// The default redactor overwrites every id.
    pub fn new() -> Self {
        Self {
            value: DEFAULT_REDACTION_VALUE.to_string(),
            inclusions: HashSet::new(),
            policy: RedactionPolicy::All,
        }
    }

    /// Read `privacy.redaction.id.value`, `.inclusions`, and `.included`.
    /// With inclusions switched on the listed ids (possibly none) are the
    /// only ones redacted; otherwise everything is.
    pub fn from_config(config: &ConfigMap) -> Self {
        let mut redactor = Self::new();
        if let Some(value) = config.get("privacy.redaction.id.value") {
            redactor.value = value.clone();
        }
        let inclusions_on = config
            .get("privacy.redaction.id.inclusions")
            .map(|v| v == "ON")
            .unwrap_or(false);
        if inclusions_on {
            redactor.policy = RedactionPolicy::Inclusions;
            if let Some(list) = config.get("privacy.redaction.id.included") {
                redactor.inclusions = list
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }
        redactor
    }

    /// Forget the inclusion list and redact everything.
    pub fn redact_all(&mut self) {
        self.inclusions.clear();
        self.policy = RedactionPolicy::All;
    }

    /// Forget the inclusion list and redact nothing.
    pub fn clear_inclusions(&mut self) {
        self.inclusions.clear();
        self.policy = RedactionPolicy::Nothing;
    }

    pub fn add_inclusion(&mut self, id: &str) {
        self.policy = RedactionPolicy::Inclusions;
        self.inclusions.insert(id.to_string());
    }

    pub fn remove_inclusion(&mut self, id: &str) {
        self.policy = RedactionPolicy::Inclusions;
        self.inclusions.remove(id);
    }

    /// Inclusion count; -1 is the redact-everything sentinel.
    pub fn num_inclusions(&self) -> i64 {
        match self.policy {
            RedactionPolicy::All => -1,
            RedactionPolicy::Nothing => 0,
            RedactionPolicy::Inclusions => self.inclusions.len() as i64,
        }
    }

    pub fn has_inclusions(&self) -> bool {
        self.policy == RedactionPolicy::Inclusions && !self.inclusions.is_empty()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn should_redact(&self, id: &str) -> bool {
        match self.policy {
            RedactionPolicy::All => true,
            RedactionPolicy::Nothing => false,
            RedactionPolicy::Inclusions => self.inclusions.contains(id),
        }
    }

    /// Overwrite `id` with the replacement value when it applies; returns
    /// whether a redaction happened.
    pub fn redact(&self, id: &mut String) -> bool {
        if self.should_redact(id) {
            id.clear();
            id.push_str(&self.value);
            true
        } else {
            false
        }
    }
}

impl Default for IdRedactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ConfigMap {
        ConfigMap::from([
            ("privacy.redaction.id.value".to_string(), "---".to_string()),
            ("privacy.redaction.id.inclusions".to_string(), "ON".to_string()),
            ("privacy.redaction.id.included".to_string(), "ID1,ID2".to_string()),
        ])
    }

    #[test]
    fn test_velocity_filter_band() {
        let config = ConfigMap::from([
            ("privacy.filter.velocity.min".to_string(), "5".to_string()),
            ("privacy.filter.velocity.max".to_string(), "100".to_string()),
        ]);
        let vf = VelocityFilter::from_config(&config);

        assert!(vf.suppress(4.999));
        assert!(vf.suppress(100.001));
        assert!(!vf.suppress(10.0));

        // Both bounds retain.
        assert!(vf.retain(5.0));
        assert!(vf.retain(100.0));
        assert!(vf.retain(10.0));
        assert!(!vf.retain(4.999));
        assert!(!vf.retain(100.001));
    }

    #[test]
    fn test_velocity_filter_reband() {
        let mut vf = VelocityFilter::new(5.0, 100.0);
        vf.set_min(3.0);
        vf.set_max(200.0);
        assert!(vf.suppress(2.999));
        assert!(vf.suppress(200.001));
        assert!(vf.retain(3.0));
        assert!(vf.retain(200.0));
    }

    #[test]
    fn test_velocity_filter_defaults() {
        let vf = VelocityFilter::from_config(&ConfigMap::new());
        assert!(vf.retain(DEFAULT_MIN_VELOCITY));
        assert!(vf.retain(DEFAULT_MAX_VELOCITY));
        assert!(vf.suppress(DEFAULT_MAX_VELOCITY + 0.001));
    }

    #[test]
    fn test_inclusion_state() {
        let mut idr = IdRedactor::from_config(&test_config());
        assert!(idr.has_inclusions());
        assert_eq!(idr.num_inclusions(), 2);

        idr.clear_inclusions();
        assert_eq!(idr.num_inclusions(), 0);

        idr.redact_all();
        assert!(!idr.has_inclusions());
        assert_eq!(idr.num_inclusions(), -1);
    }

    #[test]
    fn test_inclusion_redaction() {
        let idr = IdRedactor::from_config(&test_config());
        let mut id = "ID1".to_string();
        assert!(idr.redact(&mut id));
        assert_eq!(id, "---");

        let mut id = "IDX".to_string();
        assert!(!idr.redact(&mut id));
        assert_eq!(id, "IDX");
    }

    #[test]
    fn test_add_and_remove_inclusions() {
        let mut idr = IdRedactor::from_config(&test_config());
        idr.add_inclusion("ID3");
        assert_eq!(idr.num_inclusions(), 3);
        let mut id = "ID3".to_string();
        assert!(idr.redact(&mut id));
        assert_eq!(id, "---");

        idr.remove_inclusion("ID3");
        idr.remove_inclusion("ID1");
        assert_eq!(idr.num_inclusions(), 1);
        let mut id = "ID1".to_string();
        assert!(!idr.redact(&mut id));
        assert_eq!(id, "ID1");
        let mut id = "ID2".to_string();
        assert!(idr.redact(&mut id));
        assert_eq!(id, "---");
    }

    #[test]
    fn test_redact_all_overwrites_anything() {
        let mut idr = IdRedactor::from_config(&test_config());
        idr.redact_all();
        let mut id = "IDX".to_string();
        assert!(idr.redact(&mut id));
        assert_eq!(id, "---");
    }

    #[test]
    fn test_clear_inclusions_redacts_nothing() {
        let mut idr = IdRedactor::from_config(&test_config());
        idr.clear_inclusions();
        for original in ["ID1", "ID2"] {
            let mut id = original.to_string();
            assert!(!idr.redact(&mut id));
            assert_eq!(id, original);
        }
    }

    #[test]
    fn test_round_trip_policy_change() {
        let mut idr = IdRedactor::new();
        idr.redact_all();
        idr.clear_inclusions();
        idr.add_inclusion("X");
        assert!(idr.should_redact("X"));
        assert!(!idr.should_redact("Y"));
        assert_eq!(idr.num_inclusions(), 1);
    }
}
