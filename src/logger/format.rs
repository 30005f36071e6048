//! Access log format module
//!
//! Supports multiple log formats:
//! - `combined` (Apache/Nginx combined format, plus requested and served range)
//! - `common` (Common Log Format - CLF)
//! - `json` (JSON structured logging)
//! - Custom patterns with variables

use crate::http::range::ByteRange;
use chrono::Local;

/// Access log entry containing all request/response information
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    /// Client IP address
    pub remote_addr: String,
    /// Request timestamp
    pub time: chrono::DateTime<Local>,
    /// HTTP method (GET, HEAD, ...)
    pub method: String,
    /// Request URI path
    pub path: String,
    /// HTTP version (1.0, 1.1, 2)
    pub http_version: String,
    /// Response status code
    pub status: u16,
    /// Body bytes written to the client
    pub body_bytes: u64,
    /// User-Agent header
    pub user_agent: Option<String>,
    /// Layer name, for layer requests
    pub layer: Option<String>,
    /// Range header as sent by the client
    pub requested_range: Option<String>,
    /// Range actually served, after clamping
    pub served_range: Option<ByteRange>,
    /// Request processing time in microseconds
    pub request_time_us: u64,
}

impl AccessLogEntry {
    /// Create a new access log entry with current timestamp
    pub fn new(remote_addr: String, method: String, path: String) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            method,
            path,
            http_version: "1.1".to_string(),
            status: 200,
            body_bytes: 0,
            user_agent: None,
            layer: None,
            requested_range: None,
            served_range: None,
            request_time_us: 0,
        }
    }

    /// Format the log entry according to the specified format
    pub fn format(&self, format: &str) -> String {
        match format {
            "combined" => self.format_combined(),
            "common" => self.format_common(),
            "json" => self.format_json(),
            custom => self.format_custom(custom),
        }
    }

    fn served_range_str(&self) -> String {
        self.served_range
            .map_or_else(|| "-".to_string(), |r| format!("{}-{}", r.start, r.end))
    }

    /// Combined Log Format with requested and served range appended
    /// `$remote_addr - - [$time_local] "$request" $status $body_bytes_sent "-" "$http_user_agent" "$range" $served_range`
    fn format_combined(&self) -> String {
        format!(
            "{} \"-\" \"{}\" \"{}\" {}",
            self.format_common(),
            self.user_agent.as_deref().unwrap_or("-"),
            self.requested_range.as_deref().unwrap_or("-"),
            self.served_range_str(),
        )
    }

    /// Common Log Format (CLF)
    /// `$remote_addr - - [$time_local] "$request" $status $body_bytes_sent`
    fn format_common(&self) -> String {
        format!(
            "{} - - [{}] \"{} {} HTTP/{}\" {} {}",
            self.remote_addr,
            self.time.format("%d/%b/%Y:%H:%M:%S %z"),
            self.method,
            self.path,
            self.http_version,
            self.status,
            self.body_bytes,
        )
    }

    /// JSON structured log format
    fn format_json(&self) -> String {
        serde_json::json!({
            "remote_addr": self.remote_addr,
            "time": self.time.to_rfc3339(),
            "method": self.method,
            "path": self.path,
            "http_version": self.http_version,
            "status": self.status,
            "body_bytes": self.body_bytes,
            "user_agent": self.user_agent,
            "layer": self.layer,
            "requested_range": self.requested_range,
            "served_range": self.served_range.map(|r| [r.start, r.end]),
            "request_time_us": self.request_time_us,
        })
        .to_string()
    }

    /// Custom format with `$variable` substitution
    ///
    /// Variables: `$remote_addr`, `$time_local`, `$time_iso8601`, `$request`,
    /// `$request_method`, `$request_uri`, `$request_time` (seconds, 3 decimals),
    /// `$status`, `$body_bytes_sent`, `$http_user_agent`, `$http_range`,
    /// `$served_range`, `$layer`. Unknown variables are left as written.
    fn format_custom(&self, pattern: &str) -> String {
        #[allow(clippy::cast_precision_loss)]
        let seconds = self.request_time_us as f64 / 1_000_000.0;

        // Longest names first, so `$request` never eats `$request_time`
        let vars: [(&str, String); 13] = [
            ("$http_user_agent", self.user_agent.clone().unwrap_or_else(|| "-".into())),
            ("$body_bytes_sent", self.body_bytes.to_string()),
            ("$request_method", self.method.clone()),
            ("$served_range", self.served_range_str()),
            ("$time_iso8601", self.time.to_rfc3339()),
            ("$request_time", format!("{seconds:.3}")),
            ("$remote_addr", self.remote_addr.clone()),
            ("$request_uri", self.path.clone()),
            ("$http_range", self.requested_range.clone().unwrap_or_else(|| "-".into())),
            ("$time_local", self.time.format("%d/%b/%Y:%H:%M:%S %z").to_string()),
            ("$request", format!("{} {} HTTP/{}", self.method, self.path, self.http_version)),
            ("$status", self.status.to_string()),
            ("$layer", self.layer.clone().unwrap_or_else(|| "-".into())),
        ];

        vars.iter()
            .fold(pattern.to_string(), |line, (name, value)| line.replace(name, value))
    }
}
