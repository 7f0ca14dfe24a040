//! Serde helpers for the metadata record.
//!
//! [`finite_or_null`] writes an `f64` as `null` when it is not finite and reads `null` back as
//! NaN, so undefined statistics survive a JSON round trip.

/// Non-finite `f64` <-> JSON `null`.
pub mod finite_or_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if v.is_finite() {
            serializer.serialize_f64(*v)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}
