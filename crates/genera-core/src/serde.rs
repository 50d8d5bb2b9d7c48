use serde::{Deserialize, Deserializer};
use uuid::Uuid;

/// Treats an empty query-string value as `None` instead of a parse error.
pub fn deserialize_optional_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => Uuid::parse_str(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Accepts `true`/`false`/`1`/`0` and the empty string (as `None`).
pub fn deserialize_optional_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref() {
        None | Some("") => Ok(None),
        Some("true") | Some("1") => Ok(Some(true)),
        Some("false") | Some("0") => Ok(Some(false)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "invalid boolean: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Query {
        #[serde(default, deserialize_with = "deserialize_optional_uuid")]
        school_id: Option<Uuid>,
        #[serde(default, deserialize_with = "deserialize_optional_bool")]
        include_inactive: Option<bool>,
    }

    #[test]
    fn test_empty_values_are_none() {
        let q: Query =
            serde_json::from_str(r#"{"school_id":"","include_inactive":""}"#).unwrap();
        assert!(q.school_id.is_none());
        assert!(q.include_inactive.is_none());
    }

    #[test]
    fn test_values_parse() {
        let id = Uuid::new_v4();
        let q: Query = serde_json::from_str(&format!(
            r#"{{"school_id":"{}","include_inactive":"1"}}"#,
            id
        ))
        .unwrap();
        assert_eq!(q.school_id, Some(id));
        assert_eq!(q.include_inactive, Some(true));
    }

    #[test]
    fn test_invalid_bool_is_error() {
        assert!(serde_json::from_str::<Query>(r#"{"include_inactive":"maybe"}"#).is_err());
    }
}
