//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::dump::DumpOptions;
use crate::error::{DumpError, Result};
use crate::sink::OutputMode;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl DumpConfig {
    /// Resolve the destination path for a dump started at `now`.
    ///
    /// An explicit `output` wins; otherwise the name is generated from
    /// `name_format` inside `directory`. The extension of `mode` is appended
    /// when the path does not already carry it.
    ///
    /// # Errors
    ///
    /// Returns `DumpError::Config` if `name_format` is not a valid chrono
    /// format string.
    pub fn destination(&self, now: DateTime<Local>) -> Result<PathBuf> {
        let base = match &self.output {
            Some(path) => path.clone(),
            None => {
                let mut name = String::new();
                write!(name, "{}", now.format(&self.name_format)).map_err(|_| {
                    DumpError::Config(format!(
                        "dump.name_format is not a valid time format: {:?}",
                        self.name_format
                    ))
                })?;
                self.directory.join(name)
            }
        };
        Ok(with_mode_extension(base, self.mode))
    }

    /// Engine options for this configuration.
    pub fn options(&self) -> DumpOptions {
        DumpOptions {
            drop_database: self.drop_database,
            tables: if self.tables.is_empty() {
                None
            } else {
                Some(self.tables.clone())
            },
            ..Default::default()
        }
    }
}

fn with_mode_extension(path: PathBuf, mode: OutputMode) -> PathBuf {
    let suffix = {
        let name = path.to_string_lossy();
        match mode {
            OutputMode::Plain if name.ends_with(".sql") => "",
            OutputMode::Plain => ".sql",
            OutputMode::Gzip if name.ends_with(".gz") => "",
            OutputMode::Gzip if name.ends_with(".sql") => ".gz",
            OutputMode::Gzip => ".sql.gz",
            OutputMode::Zip if name.ends_with(".zip") => "",
            OutputMode::Zip => ".zip",
        }
    };
    if suffix.is_empty() {
        return path;
    }
    let mut name = path.into_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap()
    }

    #[test]
    fn test_from_yaml_with_defaults() {
        let config = Config::from_yaml(
            r#"
source:
  host: localhost
  database: shop
  user: root
  password: secret
"#,
        )
        .unwrap();

        assert_eq!(config.source.port, 3306);
        assert_eq!(config.source.ssl_mode, SslMode::Preferred);
        assert_eq!(config.dump.mode, OutputMode::Plain);
        assert_eq!(config.dump.directory, PathBuf::from("/var/tmp"));
        assert!(!config.dump.drop_database);
        assert!(config.dump.options().tables.is_none());
    }

    #[test]
    fn test_from_yaml_full() {
        let config = Config::from_yaml(
            r#"
source:
  host: db.internal
  port: 3307
  database: shop
  user: backup
  password: secret
  ssl_mode: required
dump:
  output: /backups/shop
  mode: gzip
  drop_database: true
  tables: [orders, users]
"#,
        )
        .unwrap();

        assert_eq!(config.source.ssl_mode, SslMode::Required);
        assert_eq!(
            config.dump.destination(at()).unwrap(),
            PathBuf::from("/backups/shop.sql.gz")
        );
        let options = config.dump.options();
        assert!(options.drop_database);
        assert_eq!(
            options.tables,
            Some(vec!["orders".to_string(), "users".to_string()])
        );
    }

    #[test]
    fn test_unknown_ssl_mode_is_rejected() {
        let result = Config::from_yaml(
            r#"
source:
  host: localhost
  database: shop
  user: root
  ssl_mode: sometimes
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_required_field() {
        let result = Config::from_yaml("source:\n  host: localhost\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_generated_destination() {
        let dump = DumpConfig::default();
        assert_eq!(
            dump.destination(at()).unwrap(),
            PathBuf::from("/var/tmp/sqldump-20240305-1407.sql")
        );

        let zip = DumpConfig {
            mode: OutputMode::Zip,
            ..Default::default()
        };
        assert_eq!(
            zip.destination(at()).unwrap(),
            PathBuf::from("/var/tmp/sqldump-20240305-1407.zip")
        );
    }

    #[test]
    fn test_invalid_name_format() {
        let dump = DumpConfig {
            name_format: "dump-%Q".to_string(),
            ..Default::default()
        };
        assert!(matches!(dump.destination(at()), Err(DumpError::Config(_))));
    }

    #[test]
    fn test_explicit_destination_keeps_matching_extension() {
        let dump = |output: &str, mode| DumpConfig {
            output: Some(PathBuf::from(output)),
            mode,
            ..Default::default()
        };

        assert_eq!(
            dump("/b/a.sql", OutputMode::Plain).destination(at()).unwrap(),
            PathBuf::from("/b/a.sql")
        );
        assert_eq!(
            dump("/b/a.sql", OutputMode::Gzip).destination(at()).unwrap(),
            PathBuf::from("/b/a.sql.gz")
        );
        assert_eq!(
            dump("/b/a.sql.gz", OutputMode::Gzip).destination(at()).unwrap(),
            PathBuf::from("/b/a.sql.gz")
        );
        assert_eq!(
            dump("/b/a.sql", OutputMode::Zip).destination(at()).unwrap(),
            PathBuf::from("/b/a.sql.zip")
        );
        assert_eq!(
            dump("/b/a.zip", OutputMode::Zip).destination(at()).unwrap(),
            PathBuf::from("/b/a.zip")
        );
    }
}
