use {crate::Result, serde::Deserialize};

///
/// Configuration for logging and tracing.
///
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Format for log output.
    /// The default format is `default`, which is "full" human-readable format.
    /// Other options are `json`, `compact`, and `pretty`.
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Default,
    Compact,
    Pretty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        logging: LoggingConfig,
    }

    #[test]
    fn test_log_format_parsing() {
        for (text, expected) in [
            ("json", "Json"),
            ("default", "Default"),
            ("compact", "Compact"),
            ("pretty", "Pretty"),
        ] {
            let wrapper: Wrapper =
                toml::from_str(&format!("[logging]\nformat = \"{text}\"")).unwrap();
            assert_eq!(format!("{:?}", wrapper.logging.format), expected);
        }
    }

    #[test]
    fn test_log_format_rejects_unknown() {
        let result = toml::from_str::<Wrapper>("[logging]\nformat = \"xml\"");
        assert!(result.is_err());
    }
}
