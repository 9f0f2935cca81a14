//! Field range validation

use crate::error::RejectionReason;
use crate::processing::fields::FieldSpec;

/// Convert a raw wire value and range-check it against `spec`
///
/// Bounds are inclusive; a missing bound leaves that side open. `NaN` and
/// infinities are rejected as non-numeric.
pub fn validate(name: &str, raw_value: &str, spec: &FieldSpec) -> Result<f64, RejectionReason> {
    let value = raw_value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RejectionReason::NotNumeric {
            name: name.to_string(),
            raw_value: raw_value.to_string(),
        })?;

    let min = spec.min.unwrap_or(f64::NEG_INFINITY);
    let max = spec.max.unwrap_or(f64::INFINITY);
    if value < min || value > max {
        return Err(RejectionReason::OutOfRange {
            name: name.to_string(),
            value,
            min,
            max,
        });
    }

    Ok(value)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn humidity() -> FieldSpec {
        FieldSpec::new("Humidity", "humidity_%").with_bounds(0.0, 100.0)
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let spec = humidity();
        assert_eq!(validate("Humidity", "0", &spec).unwrap(), 0.0);
        assert_eq!(validate("Humidity", "100.0", &spec).unwrap(), 100.0);
        assert_eq!(validate("Humidity", "65.0", &spec).unwrap(), 65.0);
    }

    #[test]
    fn test_accepts_iff_within_bounds() {
        let spec = FieldSpec::new("Temp", "temperature_C").with_bounds(-40.0, 85.0);
        for tenth in -500..=1000 {
            let v = f64::from(tenth) / 10.0;
            let accepted = validate("Temp", &v.to_string(), &spec).is_ok();
            assert_eq!(accepted, (-40.0..=85.0).contains(&v), "value {}", v);
        }
    }

    #[test]
    fn test_out_of_range_reports_bounds() {
        let err = validate("Humidity", "150.0", &humidity()).unwrap_err();
        assert_eq!(
            err,
            RejectionReason::OutOfRange {
                name: "Humidity".to_string(),
                value: 150.0,
                min: 0.0,
                max: 100.0,
            }
        );
    }

    #[test]
    fn test_unbounded_field_passes() {
        let spec = FieldSpec::new("Max_A", "maxAcceleration_m/s2");
        assert_eq!(validate("Max_A", "-12345.5", &spec).unwrap(), -12345.5);
    }

    #[test]
    fn test_half_open_bounds() {
        let spec = FieldSpec {
            min: Some(300.0),
            ..FieldSpec::new("Pressure", "pressure_hPa")
        };
        assert!(validate("Pressure", "299.9", &spec).is_err());
        assert!(validate("Pressure", "5000", &spec).is_ok());
    }

    #[test]
    fn test_not_numeric_checked_before_range() {
        for raw in ["OK", "", "12abc", "NaN", "inf"] {
            let err = validate("Humidity", raw, &humidity()).unwrap_err();
            assert!(
                matches!(err, RejectionReason::NotNumeric { ref raw_value, .. } if raw_value == raw),
                "raw {:?} gave {:?}",
                raw,
                err
            );
        }
    }
}
