//! Bounds validation for numeric command parameters
//!
//! Two sources of limits exist: a rule's `allowed_range`, applied to every
//! known numeric parameter in `ParameterKind::RANGE_CHECK_ORDER`, and the
//! global temperature/brightness bounds used when no rule matched.

use homegate_core::{CommandParameters, HubError, HubResult, ParameterKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Optional min/max attached to a device rule
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ValueRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self::new(Some(min), Some(max))
    }

    pub fn at_most(max: f64) -> Self {
        Self::new(None, Some(max))
    }

    pub fn at_least(min: f64) -> Self {
        Self::new(Some(min), None)
    }

    fn check(&self, kind: ParameterKind, value: f64) -> Option<RangeViolation> {
        if !value.is_finite() {
            return Some(RangeViolation::new(kind, value, Limit::NotFinite, LimitSource::Rule));
        }
        if let Some(min) = self.min {
            if value < min {
                return Some(RangeViolation::new(kind, value, Limit::Min(min), LimitSource::Rule));
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Some(RangeViolation::new(kind, value, Limit::Max(max), LimitSource::Rule));
            }
        }
        None
    }

    pub fn validate(&self, field: &str) -> HubResult<()> {
        for bound in [self.min, self.max].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(HubError::NonFiniteBound {
                    field: field.to_string(),
                });
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(HubError::InvalidRange {
                    field: field.to_string(),
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}

/// Global min/max for one parameter kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn check(&self, kind: ParameterKind, value: f64) -> Option<RangeViolation> {
        if !value.is_finite() {
            Some(RangeViolation::new(kind, value, Limit::NotFinite, LimitSource::Global))
        } else if value < self.min {
            Some(RangeViolation::new(kind, value, Limit::Min(self.min), LimitSource::Global))
        } else if value > self.max {
            Some(RangeViolation::new(kind, value, Limit::Max(self.max), LimitSource::Global))
        } else {
            None
        }
    }

    pub fn validate(&self, field: &str) -> HubResult<()> {
        ValueRange::between(self.min, self.max).validate(field)
    }
}

/// Which limit was crossed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limit {
    Min(f64),
    Max(f64),
    /// NaN or infinite values never fit a range
    NotFinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSource {
    Rule,
    Global,
}

/// A parameter outside its permitted range
#[derive(Debug, Clone, PartialEq)]
pub struct RangeViolation {
    pub kind: ParameterKind,
    pub value: f64,
    pub limit: Limit,
    pub source: LimitSource,
}

impl RangeViolation {
    fn new(kind: ParameterKind, value: f64, limit: Limit, source: LimitSource) -> Self {
        Self {
            kind,
            value,
            limit,
            source,
        }
    }
}

impl fmt::Display for RangeViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let scope = match self.source {
            LimitSource::Rule => "allowed",
            LimitSource::Global => "global",
        };
        match self.limit {
            Limit::Min(min) => write!(
                f,
                "{} {} is below the {} minimum of {}",
                self.kind, self.value, scope, min
            ),
            Limit::Max(max) => write!(
                f,
                "{} {} exceeds the {} maximum of {}",
                self.kind, self.value, scope, max
            ),
            Limit::NotFinite => write!(
                f,
                "{} {} is not a finite number",
                self.kind, self.value
            ),
        }
    }
}

/// Check every known numeric parameter present against a rule's range.
/// Returns the first violation in check order.
pub fn check_allowed_range(range: &ValueRange, params: &CommandParameters) -> Option<RangeViolation> {
    ParameterKind::RANGE_CHECK_ORDER
        .into_iter()
        .filter_map(|kind| params.numeric(kind).map(|value| (kind, value)))
        .find_map(|(kind, value)| range.check(kind, value))
}

/// Check temperature, then brightness, against the global bounds
pub fn check_global_bounds(
    temperature: Option<&Bounds>,
    brightness: Option<&Bounds>,
    params: &CommandParameters,
) -> Option<RangeViolation> {
    [
        (ParameterKind::Temperature, temperature),
        (ParameterKind::Brightness, brightness),
    ]
    .into_iter()
    .find_map(|(kind, bounds)| {
        let value = params.numeric(kind)?;
        bounds?.check(kind, value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(kind: ParameterKind, value: f64) -> CommandParameters {
        CommandParameters::new().with(kind, value)
    }

    #[test]
    fn test_range_violation_message() {
        let violation =
            check_allowed_range(&ValueRange::between(60.0, 80.0), &params(ParameterKind::Temperature, 90.0))
                .unwrap();
        let message = violation.to_string();
        assert!(message.contains("90"));
        assert!(message.contains("80"));
        assert_eq!(message, "temperature 90 exceeds the allowed maximum of 80");
    }

    #[test]
    fn test_range_inclusive() {
        let range = ValueRange::between(60.0, 80.0);
        assert!(check_allowed_range(&range, &params(ParameterKind::Temperature, 60.0)).is_none());
        assert!(check_allowed_range(&range, &params(ParameterKind::Temperature, 80.0)).is_none());
        let low = check_allowed_range(&range, &params(ParameterKind::Temperature, 59.5)).unwrap();
        assert_eq!(low.limit, Limit::Min(60.0));
    }

    #[test]
    fn test_range_checks_every_kind_in_order() {
        let range = ValueRange::at_most(50.0);
        let p = CommandParameters::new()
            .with(ParameterKind::Value, 70.0)
            .with(ParameterKind::Volume, 60.0)
            .with(ParameterKind::Brightness, 10.0);
        // volume precedes value in check order
        let violation = check_allowed_range(&range, &p).unwrap();
        assert_eq!(violation.kind, ParameterKind::Volume);
        assert_eq!(violation.source, LimitSource::Rule);
    }

    #[test]
    fn test_range_ignores_non_numeric() {
        let p = CommandParameters::new().with_raw("position", json!("open"));
        assert!(check_allowed_range(&ValueRange::at_most(10.0), &p).is_none());
    }

    #[test]
    fn test_open_range_never_violates() {
        let p = params(ParameterKind::Brightness, 1000.0);
        assert!(check_allowed_range(&ValueRange::default(), &p).is_none());
        assert!(check_allowed_range(&ValueRange::at_least(0.0), &p).is_none());
    }

    #[test]
    fn test_global_bounds_temperature_first() {
        let temperature = Bounds::new(10.0, 30.0);
        let brightness = Bounds::new(0.0, 100.0);
        let p = CommandParameters::new()
            .with(ParameterKind::Brightness, 150.0)
            .with(ParameterKind::Temperature, 5.0);

        let violation = check_global_bounds(Some(&temperature), Some(&brightness), &p).unwrap();
        assert_eq!(violation.kind, ParameterKind::Temperature);
        assert_eq!(violation.to_string(), "temperature 5 is below the global minimum of 10");

        let violation = check_global_bounds(None, Some(&brightness), &p).unwrap();
        assert_eq!(violation.kind, ParameterKind::Brightness);
    }

    #[test]
    fn test_non_finite_values_violate() {
        let nan = params(ParameterKind::Temperature, f64::NAN);
        let violation = check_allowed_range(&ValueRange::between(60.0, 80.0), &nan).unwrap();
        assert_eq!(violation.limit, Limit::NotFinite);
        assert_eq!(violation.to_string(), "temperature NaN is not a finite number");

        let inf = params(ParameterKind::Brightness, f64::INFINITY);
        assert!(check_allowed_range(&ValueRange::default(), &inf).is_some());

        let bounds = Bounds::new(0.0, 100.0);
        let violation = check_global_bounds(None, Some(&bounds), &inf).unwrap();
        assert_eq!(violation.limit, Limit::NotFinite);
        assert_eq!(violation.source, LimitSource::Global);
    }

    #[test]
    fn test_global_bounds_skip_other_kinds() {
        let p = params(ParameterKind::Volume, 500.0);
        let bounds = Bounds::new(0.0, 1.0);
        assert!(check_global_bounds(Some(&bounds), Some(&bounds), &p).is_none());
    }

    #[test]
    fn test_validate() {
        assert!(ValueRange::between(1.0, 2.0).validate("allowed_range").is_ok());
        assert!(matches!(
            ValueRange::between(3.0, 2.0).validate("allowed_range"),
            Err(HubError::InvalidRange { .. })
        ));
        assert!(matches!(
            Bounds::new(f64::NAN, 2.0).validate("brightness_bounds"),
            Err(HubError::NonFiniteBound { .. })
        ));
    }
}
