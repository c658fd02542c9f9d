use crate::types::{CertFinderError, Config};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load the configuration: defaults, then the optional TOML file, then
/// environment overrides.
pub fn load_config(config_path: Option<&str>) -> Result<Config, CertFinderError> {
    let mut config = Config::default();

    if let Some(path) = config_path {
        if !Path::new(path).exists() {
            return Err(CertFinderError::ConfigError(format!("Config file {} not found", path)));
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| CertFinderError::ConfigError(format!("Failed to read config file: {}", e)))?;
        apply_toml(&mut config, &contents)?;
    }

    apply_env_overrides(&mut config, |key| env::var(key).ok())?;
    validate_config(&config)?;

    Ok(config)
}

pub fn apply_toml(config: &mut Config, contents: &str) -> Result<(), CertFinderError> {
    let value: toml::Value = toml::from_str(contents)
        .map_err(|e| CertFinderError::ConfigError(format!("Failed to parse config file: {}", e)))?;

    let Some(table) = value.as_table() else {
        return Ok(());
    };

    if let Some(http) = table.get("http").and_then(|v| v.as_table()) {
        if let Some(secs) = get_u64(http, "timeout_secs")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(agent) = http.get("user_agent").and_then(|v| v.as_str()) {
            config.user_agent = agent.to_string();
        }
    }

    if let Some(sources) = table.get("sources").and_then(|v| v.as_table()) {
        if let Some(url) = sources.get("aggregator_url").and_then(|v| v.as_str()) {
            config.aggregator_url = url.to_string();
        }
        if let Some(url) = sources.get("log_list_url").and_then(|v| v.as_str()) {
            config.log_list_url = url.to_string();
        }
        if let Some(url) = sources.get("default_log_url").and_then(|v| v.as_str()) {
            config.default_log_url = Some(url.to_string());
        }
    }

    if let Some(store) = table.get("store").and_then(|v| v.as_table()) {
        if let Some(path) = store.get("path").and_then(|v| v.as_str()) {
            config.database_path = PathBuf::from(path);
        }
    }

    if let Some(resolver) = table.get("resolver").and_then(|v| v.as_table()) {
        if let Some(concurrency) = get_u64(resolver, "concurrency")? {
            config.resolver.concurrency = concurrency as usize;
        }
        if let Some(secs) = get_u64(resolver, "timeout_secs")? {
            config.resolver.timeout = Duration::from_secs(secs);
        }
        if let Some(system) = resolver.get("use_system_resolver").and_then(|v| v.as_bool()) {
            config.resolver.use_system_resolver = system;
        }
        if let Some(servers) = resolver.get("nameservers").and_then(|v| v.as_array()) {
            config.resolver.nameservers = servers
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect();
        }
    }

    if let Some(ingest) = table.get("ingest").and_then(|v| v.as_table()) {
        if let Some(size) = get_u64(ingest, "batch_size")? {
            config.ingest.batch_size = size;
        }
        if let Some(workers) = get_u64(ingest, "workers")? {
            config.ingest.workers = workers as usize;
        }
        if let Some(secs) = get_u64(ingest, "probe_timeout_secs")? {
            config.ingest.probe_timeout = Duration::from_secs(secs);
        }
        if let Some(rps) = get_u64(ingest, "requests_per_second")? {
            config.rate_limits.insert("ctlog".to_string(), Some(rps as u32));
        }
    }

    Ok(())
}

fn get_u64(table: &toml::value::Table, key: &str) -> Result<Option<u64>, CertFinderError> {
    match table.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_integer()
            .and_then(|n| u64::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| CertFinderError::ConfigError(format!("{} must be a non-negative integer", key))),
    }
}

pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), CertFinderError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup("CERTFINDER_DB") {
        config.database_path = PathBuf::from(path);
    }
    if let Some(url) = lookup("CERTFINDER_AGGREGATOR_URL") {
        config.aggregator_url = url;
    }
    if let Some(value) = lookup("CERTFINDER_RESOLVER_CONCURRENCY") {
        config.resolver.concurrency = value.trim().parse().map_err(|e| {
            CertFinderError::ConfigError(format!("CERTFINDER_RESOLVER_CONCURRENCY: {}", e))
        })?;
    }
    if let Some(value) = lookup("CERTFINDER_WORKERS") {
        config.ingest.workers = value
            .trim()
            .parse()
            .map_err(|e| CertFinderError::ConfigError(format!("CERTFINDER_WORKERS: {}", e)))?;
    }
    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), CertFinderError> {
    if config.timeout.as_secs() == 0 {
        return Err(CertFinderError::ConfigError("Timeout must be greater than 0".to_string()));
    }
    if config.resolver.concurrency == 0 {
        return Err(CertFinderError::ConfigError("Resolver concurrency must be greater than 0".to_string()));
    }
    if config.ingest.workers == 0 {
        return Err(CertFinderError::ConfigError("Ingest workers must be greater than 0".to_string()));
    }
    if config.ingest.batch_size == 0 || config.ingest.batch_size > 1000 {
        return Err(CertFinderError::ConfigError("Batch size must be between 1 and 1000".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        validate_config(&config).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.ingest.batch_size, 1000);
        assert_eq!(config.ingest.probe_timeout, Duration::from_secs(2));
        assert_eq!(config.database_path, PathBuf::from("data.db"));
        assert_eq!(config.default_log_url, None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[http]
timeout_secs = 20

[sources]
default_log_url = "ct.example.net/shard2027/"

[store]
path = "/tmp/names.db"

[resolver]
concurrency = 8
nameservers = ["9.9.9.9:53"]

[ingest]
workers = 2
batch_size = 256
requests_per_second = 5
"#
        )
        .unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.database_path, PathBuf::from("/tmp/names.db"));
        assert_eq!(config.default_log_url.as_deref(), Some("ct.example.net/shard2027/"));
        assert_eq!(config.resolver.concurrency, 8);
        assert_eq!(config.resolver.nameservers, vec!["9.9.9.9:53"]);
        assert_eq!(config.ingest.workers, 2);
        assert_eq!(config.ingest.batch_size, 256);
        assert_eq!(config.rate_limits.get("ctlog"), Some(&Some(5)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        assert!(apply_toml(&mut config, "[ingest]\nworkers = -1\n").is_err());

        let mut config = Config::default();
        apply_toml(&mut config, "[ingest]\nbatch_size = 5000\n").unwrap();
        assert!(validate_config(&config).is_err());

        assert!(load_config(Some("/definitely/not/here.toml")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CERTFINDER_DB", "other.db"),
            ("CERTFINDER_RESOLVER_CONCURRENCY", "3"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("other.db"));
        assert_eq!(config.resolver.concurrency, 3);
        assert_eq!(config.ingest.workers, 12);

        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, |key| {
            (key == "CERTFINDER_WORKERS").then(|| "many".to_string())
        });
        assert!(result.is_err());
    }
}
