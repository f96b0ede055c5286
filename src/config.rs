//! YAML benchmark configuration.
//!
//! ```yaml
//! formats:
//!   - kind: parquet
//!     compression: zstd
//!     cdc: { min_chunk_size: 262144, max_chunk_size: 1048576, norm_level: 0 }
//!   - kind: jsonlines
//! estimator: { min: 8192, avg: 16384, max: 65536 }
//! external:
//!   program: /usr/local/bin/xtool
//!   args: [upload, --dry-run]
//! max_workers: 4
//! sanity_check: true
//! ```

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::{BenchError, Result},
    estimate::{ChunkSizes, ExternalToolConfig},
    formats::FileFormat,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Replaces the command's built-in format matrix when non-empty.
    pub formats: Vec<FileFormat>,
    pub estimator: ChunkSizes,
    pub external: Option<ExternalToolConfig>,
    pub max_workers: Option<usize>,
    pub sanity_check: Option<bool>,
}

impl BenchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: BenchConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.estimator.validate()?;
        if self.max_workers == Some(0) {
            return Err(BenchError::Config("max_workers must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdc::{CdcParams, CdcSetting};
    use crate::formats::{Compression, ParquetOptions};

    #[test]
    fn full_config_parses() {
        let yaml = r#"
formats:
  - kind: parquet
    compression: zstd
    use_dictionary: false
    cdc: { min_chunk_size: 4096, max_chunk_size: 16384, norm_level: 1 }
  - kind: sqlite
estimator: { min: 256, avg: 1024, max: 4096 }
external:
  program: /bin/echo
  args: [transmitted, "10"]
max_workers: 2
"#;
        let config = BenchConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.formats.len(), 2);
        assert_eq!(
            config.formats[0],
            FileFormat::Parquet(ParquetOptions {
                compression: Compression::Zstd,
                use_dictionary: false,
                cdc: CdcSetting::Params(CdcParams::new(4096, 16384, 1)),
                ..ParquetOptions::default()
            })
        );
        assert_eq!(config.estimator.avg, 1024);
        let external = config.external.unwrap();
        assert_eq!(external.token_var, "XTOOL_TOKEN");
        assert!(external.token.is_none());
        assert_eq!(config.max_workers, Some(2));
        assert_eq!(config.sanity_check, None);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = BenchConfig::from_yaml("{}").unwrap();
        assert!(config.formats.is_empty());
        assert_eq!(config.estimator, ChunkSizes::default());
    }

    #[test]
    fn invalid_values_are_config_errors() {
        assert!(matches!(
            BenchConfig::from_yaml("max_workers: 0"),
            Err(BenchError::Config(_))
        ));
        assert!(matches!(
            BenchConfig::from_yaml("estimator: { min: 1, avg: 2, max: 3 }"),
            Err(BenchError::Config(_))
        ));
        assert!(matches!(
            BenchConfig::from_yaml("unknown_key: 1"),
            Err(BenchError::Yaml(_))
        ));
    }
}
