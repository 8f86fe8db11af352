//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use super::Config;

impl Config {
    /// Generate the TOML representation of this config, with comments.
    /// Used both for the first-run template and `config --show`/`--update`.
    pub fn to_toml(&self) -> String {
        format!(
            r#"# memgate configuration
# Precedence: CLI flags > environment variables > this file > defaults

# Address the gateway listens on (env: MEMGATE_BIND)
bind_addr = "{bind_addr}"

[backend]
# Loopback endpoint of the embedded backend (env: MEMGATE_BACKEND_HOST / MEMGATE_BACKEND_PORT)
host = "{backend_host}"
port = {backend_port}
# Seconds to wait for the backend health check before aborting startup
# (env: MEMGATE_BACKEND_STARTUP_TIMEOUT)
startup_timeout_secs = {startup_timeout}
# Backend module log level (env: MEMGATE_BACKEND_LOG_LEVEL)
log_level = "{backend_log_level}"
# Model table consumed by the backend (env: MEMGATE_BACKEND_CONFIG)
config_path = "{backend_config_path}"
# Set to false to skip launching the backend (requires [upstream].base_url)
embedded = {backend_embedded}

[upstream]
# Uncomment to front an external API instead of the embedded backend
# (env: MEMGATE_UPSTREAM_URL)
{upstream_base_url}
# Per-request timeout in seconds. Unset = no timeout, so long streaming
# completions are never truncated. (env: MEMGATE_UPSTREAM_TIMEOUT)
{upstream_timeout}
# Host header handling when relaying: "rewrite" or "strip".
# Unset = rewrite for the embedded backend, strip for an external upstream.
{host_header}

[memory]
# Activate the persistent-context service at startup
enabled = {memory_enabled}
conscious_ingest = {conscious_ingest}
auto_ingest = {auto_ingest}

[logging]
# Gateway log level: trace, debug, info, warn, error
level = "{log_level}"
# Write JSON logs to rotating files in addition to stdout
file_enabled = {file_enabled}
file_dir = "{file_dir}"
# Rotation: "hourly", "daily", or "never"
file_rotation = "{file_rotation}"
file_prefix = "{file_prefix}"
"#,
            bind_addr = self.bind_addr,
            backend_host = self.backend.host,
            backend_port = self.backend.port,
            startup_timeout = self.backend.startup_timeout_secs,
            backend_log_level = self.backend.log_level,
            backend_config_path = self.backend.config_path.display(),
            backend_embedded = self.backend.embedded,
            upstream_base_url = match &self.upstream.base_url {
                Some(url) => format!("base_url = \"{}\"", url),
                None => "# base_url = \"https://api.openai.com\"".to_string(),
            },
            upstream_timeout = match self.upstream.request_timeout_secs {
                Some(secs) => format!("request_timeout_secs = {}", secs),
                None => "# request_timeout_secs = 300".to_string(),
            },
            host_header = match self.upstream.host_header {
                Some(policy) => format!("host_header = \"{}\"", policy.as_str()),
                None => "# host_header = \"rewrite\"".to_string(),
            },
            memory_enabled = self.memory.enabled,
            conscious_ingest = self.memory.conscious_ingest,
            auto_ingest = self.memory.auto_ingest,
            log_level = self.logging.level,
            file_enabled = self.logging.file_enabled,
            file_dir = self.logging.file_dir.display(),
            file_rotation = self.logging.file_rotation.as_str(),
            file_prefix = self.logging.file_prefix,
        )
    }
}
