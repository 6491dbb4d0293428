use serde::{Deserialize, Deserializer};
use std::fmt;

/// A text field that tolerates numbers, booleans and null in Alexa payloads.
/// Scalars are rendered the way they appear in the JSON; null becomes empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlexText(pub String);

impl FlexText {
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for FlexText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FlexText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct FlexTextVisitor;

        impl<'de> Visitor<'de> for FlexTextVisitor {
            type Value = FlexText;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string, number, boolean, or null")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(FlexText(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(FlexText(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(FlexText(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(FlexText(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(FlexText(v.to_string()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(FlexText(v.to_string()))
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(FlexText::default())
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(FlexText::default())
            }
        }

        deserializer.deserialize_any(FlexTextVisitor)
    }
}

/// `#[serde(deserialize_with)]` helper yielding a plain `String`
pub fn deserialize_flex_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    FlexText::deserialize(deserializer).map(FlexText::into_inner)
}
