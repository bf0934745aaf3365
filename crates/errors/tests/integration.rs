//! Integration tests for error types

#[cfg(test)]
mod tests {
    use rackfit_errors::*;

    #[test]
    fn test_error_conversion() {
        let err: Error = ResourceError::exhausted("SATA port", 1, 0).into();
        assert!(matches!(err, Error::Resource(_)));
        assert!(err.is_exhaustion());

        let err: Error = ValidationError::Structural {
            errors: vec!["missing motherboard".into()],
        }
        .into();
        assert!(!err.is_exhaustion());
    }

    #[test]
    fn test_exhaustion_display() {
        let err = ResourceError::exhausted("PCIe x16 slot", 2, 1);
        assert_eq!(
            err.to_string(),
            "insufficient PCIe x16 slot: requested 2, available 1"
        );
        assert_eq!(err.requested(), 2);
        assert_eq!(err.available(), 1);
    }

    #[test]
    fn test_structural_display_joins_errors() {
        let err = ValidationError::Structural {
            errors: vec!["missing motherboard".into(), "missing cpu".into()],
        };
        assert_eq!(
            err.to_string(),
            "invalid configuration structure: missing motherboard; missing cpu"
        );
        assert_eq!(err.errors().len(), 2);
    }

    #[test]
    fn test_user_codes() {
        let err: Error = ResourceError::exhausted("PCIe lanes", 8, 4).into();
        assert_eq!(err.user_code(), Some("resource.exhausted"));
        assert!(err.user_hint().is_some());
        assert!(!err.is_retryable());

        let err: Error = ConfigError::InvalidValue {
            field: "RACKFIT_BOTTLENECK_THRESHOLD".into(),
            value: "2".into(),
        }
        .into();
        assert_eq!(err.user_code(), Some("config.invalid_value"));
    }

    #[test]
    fn test_json_error_is_parse_failure() {
        let json_err = serde_json::from_str::<Vec<u32>>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Validation(ValidationError::Parse { .. })));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "build.json");
        let err: Error = Error::io_with_path(&io_err, "/tmp/build.json");
        assert!(matches!(err, Error::Io { path: Some(_), .. }));
        assert!(err.is_retryable());
        assert_eq!(err.user_code(), Some("error.io"));
        assert_eq!(err.user_message(), "build.json");
        assert!(err.user_hint().is_none());
    }
}
