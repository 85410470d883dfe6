//! Fault isolation for individual metrics.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;
use tracing::warn;

use crate::error::MetricError;
use crate::value::MetricValue;

/// Run one metric. An `Err` or a panic becomes an error marker keyed by
/// `name`; the caller carries on with the next metric.
pub fn invoke<F>(name: &str, f: F) -> MetricValue
where
    F: FnOnce() -> Result<Value, MetricError>,
{
    // Metrics only read immutable views; nothing is left half-updated on unwind.
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => MetricValue::Value(value),
        Ok(Err(error)) => {
            warn!(metric = name, error = %error, "metric failed");
            MetricValue::error(name, error)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(metric = name, panic = %message, "metric panicked");
            MetricValue::error(name, MetricError::Panicked(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn passes_values_through() {
        assert_eq!(invoke("ok", || Ok(json!(1.5))), MetricValue::Value(json!(1.5)));
    }

    #[test]
    fn errors_become_markers() {
        let value = invoke("melodic_entropy", || Err(MetricError::NonFinite(f64::INFINITY)));
        assert_eq!(
            value.marker().unwrap(),
            "[error in melodic_entropy]: non-finite result (inf)"
        );
    }

    #[test]
    fn panics_are_contained() {
        let value = invoke("fractal_signature", || {
            let empty: Vec<f64> = Vec::new();
            Ok(json!(empty[3]))
        });
        assert!(value.is_error());
        assert!(value
            .marker()
            .unwrap()
            .starts_with("[error in fractal_signature]: panicked: index out of bounds"));
    }
}
