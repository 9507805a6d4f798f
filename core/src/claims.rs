//! Normalized claim set
//!
//! Both trust sources decode into the same [`Claims`] type so callers can
//! make authorization decisions without knowing which verifier ran.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer
    pub iss: String,

    /// Subject
    pub sub: String,

    /// Audience (can be string or array)
    #[serde(
        default,
        deserialize_with = "deserialize_audience",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub aud: Vec<String>,

    /// Expiration time
    #[serde(
        default,
        deserialize_with = "deserialize_numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<i64>,

    /// Issued at
    #[serde(
        default,
        deserialize_with = "deserialize_numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<i64>,

    /// Not before
    #[serde(
        default,
        deserialize_with = "deserialize_numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub nbf: Option<i64>,

    /// Read as absent unless it is a string
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<String>,

    /// Provider-specific claims (groups, name, ...)
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Claims {
    pub fn new(iss: impl Into<String>, sub: impl Into<String>) -> Self {
        Self {
            iss: iss.into(),
            sub: sub.into(),
            aud: Vec::new(),
            exp: None,
            iat: None,
            nbf: None,
            email: None,
            extra: HashMap::new(),
        }
    }
}

/// Deserialize audience as either string or array
fn deserialize_audience<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct AudienceVisitor;

    impl<'de> Visitor<'de> for AudienceVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("string or array of strings")
        }

        fn visit_str<E>(self, value: &str) -> std::result::Result<Vec<String>, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_unit<E>(self) -> std::result::Result<Vec<String>, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Vec<String>, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut values = Vec::new();
            while let Some(value) = seq.next_element()? {
                values.push(value);
            }
            Ok(values)
        }
    }

    deserializer.deserialize_any(AudienceVisitor)
}

/// NumericDate as whole seconds. Fractional values are truncated.
pub(crate) fn numeric_date(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
}

fn deserialize_numeric_date<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => numeric_date(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("NumericDate must be a number, got {}", value))),
    }
}

fn deserialize_lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Look up a string claim by name.
///
/// Returns `""` when the claim is absent or not a string; callers must read
/// an empty result as "not present".
pub fn get_field<'a>(claims: &'a Claims, name: &str) -> &'a str {
    match name {
        "iss" => &claims.iss,
        "sub" => &claims.sub,
        "email" => claims.email.as_deref().unwrap_or(""),
        _ => claims
            .extra
            .get(name)
            .and_then(|value| value.as_str())
            .unwrap_or(""),
    }
}

/// Human readable identity for a verified claim set: the subject for tokens
/// minted by `local_issuer`, the email address for everything else.
pub fn display_name<'a>(claims: &'a Claims, local_issuer: &str) -> &'a str {
    if get_field(claims, "iss") == local_issuer {
        get_field(claims, "sub")
    } else {
        get_field(claims, "email")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn external_claims() -> Claims {
        serde_json::from_value(serde_json::json!({
            "iss": "https://idp.example.com",
            "sub": "CiQwOGE4Njg0Yi1kYjg4",
            "aud": "argo-cd",
            "exp": 1706903600,
            "email": "a@b.com",
            "name": "Alice",
            "groups": ["admins"],
        }))
        .unwrap()
    }

    #[test]
    fn test_display_name_local() {
        let claims = Claims::new("argocd", "admin");
        assert_eq!(display_name(&claims, "argocd"), "admin");
    }

    #[test]
    fn test_display_name_external() {
        let claims = external_claims();
        assert_eq!(display_name(&claims, "argocd"), "a@b.com");
    }

    #[test]
    fn test_display_name_external_without_email() {
        let claims = Claims::new("https://idp.example.com", "someone");
        assert_eq!(display_name(&claims, "argocd"), "");
    }

    #[test]
    fn test_get_field_known_and_extra() {
        let claims = external_claims();
        assert_eq!(get_field(&claims, "iss"), "https://idp.example.com");
        assert_eq!(get_field(&claims, "email"), "a@b.com");
        assert_eq!(get_field(&claims, "name"), "Alice");
    }

    #[test]
    fn test_get_field_absent_or_not_string() {
        let claims = external_claims();
        assert_eq!(get_field(&claims, "missing"), "");
        assert_eq!(get_field(&claims, "groups"), "");
        assert_eq!(get_field(&claims, "exp"), "");
    }

    #[test]
    fn test_fractional_numeric_dates_truncated() {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "iss": "https://idp.example.com",
            "sub": "x",
            "exp": 1706903600.5,
            "iat": 1706900000.9,
            "nbf": 1706900000,
        }))
        .unwrap();

        assert_eq!(claims.exp, Some(1706903600));
        assert_eq!(claims.iat, Some(1706900000));
        assert_eq!(claims.nbf, Some(1706900000));
    }

    #[test]
    fn test_non_numeric_date_rejected() {
        let result = serde_json::from_value::<Claims>(serde_json::json!({
            "iss": "https://idp.example.com",
            "sub": "x",
            "exp": "tomorrow",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_non_string_email_reads_as_absent() {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "iss": "https://idp.example.com",
            "sub": "x",
            "email": ["a@b.com"],
        }))
        .unwrap();

        assert_eq!(claims.email, None);
        assert_eq!(get_field(&claims, "email"), "");
        assert_eq!(display_name(&claims, "argocd"), "");
    }

    #[test]
    fn test_audience_string_or_array() {
        let single = external_claims();
        assert_eq!(single.aud, vec!["argo-cd".to_string()]);

        let multiple: Claims = serde_json::from_value(serde_json::json!({
            "iss": "https://idp.example.com",
            "sub": "x",
            "aud": ["first", "second"],
        }))
        .unwrap();
        assert_eq!(multiple.aud, vec!["first".to_string(), "second".to_string()]);

        let absent: Claims = serde_json::from_value(serde_json::json!({
            "iss": "argocd",
            "sub": "admin",
        }))
        .unwrap();
        assert!(absent.aud.is_empty());
    }

    #[test]
    fn test_missing_issuer_fails_to_parse() {
        let result: std::result::Result<Claims, _> =
            serde_json::from_value(serde_json::json!({"sub": "admin"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_local_claims_serialize_without_empty_fields() {
        let mut claims = Claims::new("argocd", "admin");
        claims.iat = Some(1706900000);
        let value = serde_json::to_value(&claims).unwrap();

        assert_eq!(value["iss"], "argocd");
        assert_eq!(value["iat"], 1706900000);
        assert!(value.get("exp").is_none());
        assert!(value.get("aud").is_none());
        assert!(value.get("email").is_none());
    }
}
