//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{Result, SubsetError};
use std::path::Path;

impl Config {
    /// Load and validate configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a YAML file without validating it.
    ///
    /// Callers that patch fields afterwards (command-line overrides) must
    /// call [`Config::validate`] themselves.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                SubsetError::Config(format!("config file not found: {}", path.display()))
            }
            _ => SubsetError::Io(e),
        })?;
        Ok(serde_yaml::from_str(&content)?)
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

impl ConnectionConfig {
    /// Build a `mysql://` URL for logging (password omitted).
    pub fn display_url(&self) -> String {
        format!(
            "mysql://{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML: &str = r#"
source:
  host: db.internal
  database: shop
  user: reader
  password: secret
target:
  host: localhost
  database: shop_subset
  user: root
  password: root
root_table: customers
city_filter: Springfield
"#;

    #[test]
    fn test_from_yaml_defaults() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.source.port, 3306);
        assert_eq!(config.source.ssl_mode, "disable");
        assert_eq!(config.filter_column, "city");
        assert_eq!(config.city_filter, CityFilter::One("Springfield".into()));
        assert_eq!(config.subset.insert_order, InsertOrder::Topological);
        assert!(config.subset.clear_target);
        assert!(!config.subset.allow_keyless_tables);
    }

    #[test]
    fn test_from_yaml_city_list_and_subset_options() {
        let yaml = format!(
            "{}filter_column: town\nsubset:\n  insert_order: edge_count\n  clear_target: false\n",
            YAML.replace(
                "city_filter: Springfield",
                "city_filter: [Springfield, Shelbyville]"
            )
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.city_filter.values(), ["Springfield", "Shelbyville"]);
        assert_eq!(config.filter_column, "town");
        assert_eq!(config.subset.insert_order, InsertOrder::EdgeCount);
        assert!(!config.subset.clear_target);
    }

    #[test]
    fn test_from_yaml_missing_root_table() {
        let yaml = YAML.replace("root_table: customers\n", "");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = Config::load("/nonexistent/subset-config.yaml").unwrap_err();
        assert!(matches!(err, SubsetError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.root_table, "customers");
    }

    #[test]
    fn test_read_defers_validation() {
        let yaml = YAML
            .replace("root_table: customers\n", "")
            .replace("city_filter: Springfield\n", "");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        assert!(Config::load(file.path()).is_err());

        let mut config = Config::read(file.path()).unwrap();
        assert!(config.root_table.is_empty());
        assert!(config.city_filter.values().is_empty());
        assert!(config.validate().is_err());

        config.root_table = "customers".into();
        config.city_filter = vec!["Springfield".to_string()].into();
        config.validate().unwrap();
    }

    #[test]
    fn test_display_url_omits_password() {
        let config = Config::from_yaml(YAML).unwrap();
        let url = config.source.display_url();
        assert_eq!(url, "mysql://reader@db.internal:3306/shop");
        assert!(!url.contains("secret"));
    }

    #[test]
    fn test_city_filter_from_vec() {
        assert_eq!(
            CityFilter::from(vec!["A".to_string()]),
            CityFilter::One("A".into())
        );
        assert_eq!(
            CityFilter::from(vec!["A".to_string(), "B".to_string()]),
            CityFilter::Many(vec!["A".into(), "B".into()])
        );
    }
}
