//! PPM configuration: a flat `key = value` properties file plus CLI
//! overrides, resolved into the typed settings the supervisor needs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use bsm_filter::ConfigMap;
use cv_geo::Point;

/// Default poll timeout when `privacy.consumer.timeout.ms` is absent.
pub const DEFAULT_CONSUMER_TIMEOUT: Duration = Duration::from_millis(500);
/// Default partition: unassigned, the bus client picks.
pub const DEFAULT_PARTITION: i32 = -1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration line {line}: expected key=value, got {text:?}")]
    Malformed { line: usize, text: String },

    #[error("missing required configuration key: {0}")]
    MissingKey(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Parse a properties file into a flat map. Blank lines and `#` comments are
/// skipped; whitespace around keys and values is stripped; later duplicates
/// win. Keys the PPM does not recognize are kept and passed through to the
/// filter configuration untouched.
pub fn load_config_file(path: &Path) -> Result<ConfigMap, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut map = ConfigMap::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::Malformed {
                line: idx + 1,
                text: line.to_string(),
            });
        };
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(map)
}

/// The typed slice of configuration the supervisor reads; everything else
/// stays in `raw` for the handler.
#[derive(Debug, Clone)]
pub struct PpmConfig {
    pub consumed_topic: String,
    pub published_topic: String,
    pub partition: i32,
    pub consumer_timeout: Duration,
    pub mapfile: PathBuf,
    pub fence_sw: Point,
    pub fence_ne: Point,
    pub raw: ConfigMap,
}

impl PpmConfig {
    /// Resolve the flat map (after any CLI overrides were folded in).
    pub fn resolve(raw: ConfigMap) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            raw.get(key)
                .cloned()
                .ok_or(ConfigError::MissingKey(key))
        };

        let mapfile = PathBuf::from(required("privacy.filter.geofence.mapfile")?);
        let consumed_topic = required("privacy.topic.consumer")?;
        let published_topic = required("privacy.topic.producer")?;

        let partition = match raw.get("privacy.kafka.partition") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "privacy.kafka.partition",
                value: value.clone(),
            })?,
            None => DEFAULT_PARTITION,
        };

        let consumer_timeout = raw
            .get("privacy.consumer.timeout.ms")
            .and_then(|value| value.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| {
                info!("using the default consumer timeout");
                DEFAULT_CONSUMER_TIMEOUT
            });

        let coord = |key: &'static str| -> Result<f64, ConfigError> {
            match raw.get(key) {
                Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                    key,
                    value: value.clone(),
                }),
                None => Ok(0.0),
            }
        };
        let fence_sw = Point::new(
            coord("privacy.filter.geofence.sw.lat")?,
            coord("privacy.filter.geofence.sw.lon")?,
        );
        let fence_ne = Point::new(
            coord("privacy.filter.geofence.ne.lat")?,
            coord("privacy.filter.geofence.ne.lon")?,
        );

        Ok(Self {
            consumed_topic,
            published_topic,
            partition,
            consumer_timeout,
            mapfile,
            fence_sw,
            fence_ne,
            raw,
        })
    }

    /// Render the resolved configuration, sorted by key, for `--config-check`.
    pub fn render(&self) -> String {
        let mut keys: Vec<&String> = self.raw.keys().collect();
        keys.sort();
        let mut out = String::from("# Privacy configuration\n");
        for key in keys {
            out.push_str(&format!("{} = {}\n", key, self.raw[key]));
        }
        out.push_str(&format!(
            "# Resolved: consume {} -> produce {} (partition {}, timeout {:?})\n",
            self.consumed_topic, self.published_topic, self.partition, self.consumer_timeout
        ));
        out
    }
}
