use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Deserializer};

/// East Africa Time. Daraja validates timestamps against Nairobi local time.
const EAT_OFFSET_SECS: i32 = 3 * 3600;

/// Formats `now` as the `YYYYMMDDHHMMSS` timestamp Daraja expects, in Nairobi time.
pub fn daraja_timestamp(now: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(EAT_OFFSET_SECS) {
        Some(tz) => now.with_timezone(&tz).format("%Y%m%d%H%M%S").to_string(),
        None => now.format("%Y%m%d%H%M%S").to_string(),
    }
}

/// The STK password is `base64(shortcode + passkey + timestamp)`.
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    base64::encode(format!("{shortcode}{passkey}{timestamp}"))
}

/// Value for the `Authorization` header of the OAuth request.
pub fn basic_auth_header(consumer_key: &str, consumer_secret: &str) -> String {
    format!("Basic {}", base64::encode(format!("{consumer_key}:{consumer_secret}")))
}

/// Daraja is inconsistent about whether numeric codes are sent as strings or numbers.
pub fn string_or_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where D: Deserializer<'de> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        Int(i64),
        Str(String),
    }
    match StringOrInt::deserialize(deserializer)? {
        StringOrInt::Int(i) => Ok(i),
        StringOrInt::Str(s) => s.trim().parse::<i64>().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn timestamp_is_in_nairobi_time() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 22, 15, 9).unwrap();
        assert_eq!(daraja_timestamp(now), "20240302011509");
    }

    #[test]
    fn password() {
        let password = stk_password("174379", "passkey", "20240101120000");
        assert_eq!(base64::decode(password).unwrap(), b"174379passkey20240101120000");
    }

    #[test]
    fn basic_auth() {
        assert_eq!(basic_auth_header("key", "secret"), "Basic a2V5OnNlY3JldA==");
    }

    #[test]
    fn codes_as_strings_or_numbers() {
        #[derive(Deserialize)]
        struct Code {
            #[serde(deserialize_with = "string_or_int")]
            code: i64,
        }
        let a: Code = serde_json::from_str(r#"{"code":"1032"}"#).unwrap();
        let b: Code = serde_json::from_str(r#"{"code":0}"#).unwrap();
        assert_eq!(a.code, 1032);
        assert_eq!(b.code, 0);
        assert!(serde_json::from_str::<Code>(r#"{"code":"abc"}"#).is_err());
    }
}
