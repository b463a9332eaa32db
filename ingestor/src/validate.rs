use crate::errors::{Error, Result};

/// Checks a received message and returns its payload as text.
pub fn validate_message<'a>(topic: &str, payload: &'a [u8]) -> Result<&'a str> {
    if topic.is_empty() {
        return Err(Error::Validation("Topic cannot be empty".to_string()));
    }
    std::str::from_utf8(payload)
        .map_err(|e| Error::Validation(format!("Payload on {} is not UTF-8: {}", topic, e)))
}

/// Checks an MQTT topic filter: `+` and `#` must fill a whole level and `#`
/// may only be last.
pub fn validate_filter(filter: &str) -> Result<()> {
    if filter.is_empty() {
        return Err(Error::Config("Topic filter cannot be empty".to_string()));
    }

    let levels: Vec<&str> = filter.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        let wildcard = level.contains('+') || level.contains('#');
        if wildcard && level.len() != 1 {
            return Err(Error::Config(format!(
                "Wildcard must occupy a whole level in {}",
                filter
            )));
        }
        if *level == "#" && i != levels.len() - 1 {
            return Err(Error::Config(format!("'#' must be the last level in {}", filter)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_message() {
        assert_eq!(validate_message("base/state/pm25", b"23.4").unwrap(), "23.4");
    }

    #[test]
    fn test_empty_payload_is_valid() {
        assert_eq!(validate_message("base/state/status", b"").unwrap(), "");
    }

    #[test]
    fn test_empty_topic() {
        assert!(validate_message("", b"1").is_err());
    }

    #[test]
    fn test_invalid_utf8() {
        assert!(matches!(
            validate_message("base/state/co2", &[0xff, 0xfe]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_filters() {
        assert!(validate_filter("v1/devices/me/telemetry/#").is_ok());
        assert!(validate_filter("v1/devices/me/attributes").is_ok());
        assert!(validate_filter("devices/+/state/#").is_ok());
        assert!(validate_filter("#").is_ok());
        assert!(validate_filter("").is_err());
        assert!(validate_filter("a/#/b").is_err());
        assert!(validate_filter("a/b#").is_err());
        assert!(validate_filter("a/+b/c").is_err());
    }
}
