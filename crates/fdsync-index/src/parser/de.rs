//! Lenient field decoders for index JSON.
//!
//! Index generators are inconsistent about types: numbers sometimes arrive
//! as strings, and empty strings stand in for missing values.

use std::fmt;

use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer,
};

pub fn empty_is_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.is_empty()))
}

/// Accepts an integer, a numeric string, an empty string or null. Strings
/// that do not parse are treated as absent.
pub fn optional_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OptI64Visitor;

    impl<'de> Visitor<'de> for OptI64Visitor {
        type Value = Option<i64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer, a numeric string, or null")
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_any(self)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(i64::try_from(v).ok())
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
            Ok(v.is_finite().then_some(v as i64))
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v.trim().parse::<i64>().ok())
        }
    }

    deserializer.deserialize_any(OptI64Visitor)
}

/// Like [`optional_number`] for fields that default to zero.
pub fn number_or_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_number(deserializer)?.unwrap_or(0))
}

/// `i32` flavour of [`number_or_zero`] for SDK levels and protocol versions.
pub fn small_number_or_zero<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_number(deserializer)?
        .and_then(|n| i32::try_from(n).ok())
        .unwrap_or(0))
}

/// A list of strings that may also be a single comma separated string.
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrSeq {
        String(String),
        Seq(Vec<Option<String>>),
    }

    Ok(match Option::<StringOrSeq>::deserialize(deserializer)? {
        Some(StringOrSeq::String(s)) => split_list(&s),
        Some(StringOrSeq::Seq(items)) => {
            items
                .into_iter()
                .flatten()
                .filter(|s| !s.is_empty())
                .collect()
        }
        None => Vec::new(),
    })
}

/// Splits a comma separated list, dropping blanks.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "empty_is_none")]
        text: Option<String>,
        #[serde(default, deserialize_with = "optional_number")]
        code: Option<i64>,
        #[serde(default, deserialize_with = "small_number_or_zero")]
        sdk: i32,
        #[serde(default, deserialize_with = "string_list")]
        list: Vec<String>,
    }

    fn sample(json: &str) -> Sample {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(sample(r#"{"text":""}"#).text, None);
        assert_eq!(sample(r#"{"text":"x"}"#).text.as_deref(), Some("x"));
        assert_eq!(sample(r#"{"text":null}"#).text, None);
    }

    #[test]
    fn test_optional_number() {
        assert_eq!(sample(r#"{"code":12}"#).code, Some(12));
        assert_eq!(sample(r#"{"code":"1004"}"#).code, Some(1004));
        assert_eq!(sample(r#"{"code":-5}"#).code, Some(-5));
        assert_eq!(sample(r#"{"code":""}"#).code, None);
        assert_eq!(sample(r#"{"code":"abc"}"#).code, None);
        assert_eq!(sample(r#"{"code":null}"#).code, None);
        assert_eq!(sample(r#"{}"#).code, None);
    }

    #[test]
    fn test_small_number() {
        assert_eq!(sample(r#"{"sdk":"21"}"#).sdk, 21);
        assert_eq!(sample(r#"{"sdk":99999999999}"#).sdk, 0);
    }

    #[test]
    fn test_string_list() {
        assert_eq!(
            sample(r#"{"list":"GPL-3.0-only, MIT"}"#).list,
            vec!["GPL-3.0-only", "MIT"]
        );
        assert_eq!(
            sample(r#"{"list":["Ads", "", null, "Tracking"]}"#).list,
            vec!["Ads", "Tracking"]
        );
        assert!(sample(r#"{"list":null}"#).list.is_empty());
    }
}
