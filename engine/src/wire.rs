//! Remote JSON boundary helpers.
//!
//! The remote API transmits booleans as `0`/`1`. Use
//! `#[serde(with = "crate::wire::bool_flag")]` on boolean fields; it writes
//! integers and reads either integers or JSON booleans.

/// Serde adapter for booleans carried as `0`/`1`.
pub mod bool_flag {
    use serde::de::{self, Unexpected, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        deserializer.deserialize_any(FlagVisitor)
    }

    struct FlagVisitor;

    impl Visitor<'_> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("0, 1, true or false")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(E::invalid_value(Unexpected::Unsigned(other), &self)),
            }
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            match u64::try_from(v) {
                Ok(v) => self.visit_u64(v),
                Err(_) => Err(E::invalid_value(Unexpected::Signed(v), &self)),
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            match v {
                "0" | "false" => Ok(false),
                "1" | "true" => Ok(true),
                other => Err(E::invalid_value(Unexpected::Str(other), &self)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Flags {
        #[serde(with = "super::bool_flag")]
        on: bool,
        #[serde(default, with = "super::bool_flag")]
        off: bool,
    }

    #[test]
    fn writes_integers() {
        let json = serde_json::to_string(&Flags { on: true, off: false }).unwrap();
        assert_eq!(json, r#"{"on":1,"off":0}"#);
    }

    #[test]
    fn reads_integers_and_booleans() {
        let a: Flags = serde_json::from_str(r#"{"on":1,"off":0}"#).unwrap();
        let b: Flags = serde_json::from_str(r#"{"on":true,"off":false}"#).unwrap();
        assert_eq!(a, b);
        assert!(a.on);
    }

    #[test]
    fn missing_flag_defaults_false() {
        let flags: Flags = serde_json::from_str(r#"{"on":1}"#).unwrap();
        assert!(!flags.off);
    }

    #[test]
    fn rejects_other_numbers() {
        assert!(serde_json::from_str::<Flags>(r#"{"on":2}"#).is_err());
        assert!(serde_json::from_str::<Flags>(r#"{"on":-1}"#).is_err());
    }
}
