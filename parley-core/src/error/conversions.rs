//! Error conversion implementations for ParleyError

use super::types::ParleyError;

impl From<serde_json::Error> for ParleyError {
    fn from(err: serde_json::Error) -> Self {
        ParleyError::JsonError(Box::new(err))
    }
}

impl From<std::io::Error> for ParleyError {
    fn from(err: std::io::Error) -> Self {
        ParleyError::IoError(Box::new(err))
    }
}

impl From<toml::de::Error> for ParleyError {
    fn from(err: toml::de::Error) -> Self {
        ParleyError::ConfigurationError {
            component: "config_file".to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_conversion() {
        fn parse() -> Result<serde_json::Value, ParleyError> {
            Ok(serde_json::from_str("{not json")?)
        }

        assert!(matches!(parse(), Err(ParleyError::JsonError(_))));
    }

    #[test]
    fn test_toml_error_is_configuration() {
        fn parse() -> Result<toml::Value, ParleyError> {
            Ok(toml::from_str("[node\nname = 1")?)
        }

        match parse() {
            Err(ParleyError::ConfigurationError { component, .. }) => {
                assert_eq!(component, "config_file");
            }
            other => panic!("Expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_user_facing_classification() {
        assert!(ParleyError::NotJoined.is_user_facing());
        assert!(ParleyError::SelfTarget.is_user_facing());
        assert!(!ParleyError::TransportClosed.is_user_facing());
        assert!(!ParleyError::decode("bad").is_user_facing());
    }
}
