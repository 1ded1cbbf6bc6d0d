//! Resource identity and span attribute helpers.
//!
//! Attribute keys follow the OpenTelemetry semantic conventions for HTTP and
//! database client spans.

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;

use crate::storage::DbTarget;

pub const SERVICE_NAME: &str = "service.name";
pub const SERVICE_VERSION: &str = "service.version";

pub const HTTP_METHOD: &str = "http.method";
pub const HTTP_ROUTE: &str = "http.route";
pub const DB_SYSTEM: &str = "db.system";
pub const DB_NAME: &str = "db.name";
pub const DB_OPERATION: &str = "db.operation";
pub const DB_TABLE: &str = "db.sql.table";
pub const DB_ROWS_RETURNED: &str = "db.rows_returned";
pub const DB_ROWS_AFFECTED: &str = "db.rows_affected";
pub const SERVER_ADDRESS: &str = "server.address";
pub const SERVER_PORT: &str = "server.port";
pub const ITEM_ID: &str = "item.id";
pub const ITEM_NAME: &str = "item.name";

/// The fixed (service name, service version) pair tagged onto all telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentity {
    service_name: String,
    service_version: String,
}

impl ResourceIdentity {
    pub fn new(service_name: impl Into<String>, service_version: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: service_version.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn service_version(&self) -> &str {
        &self.service_version
    }

    /// OpenTelemetry resource: SDK defaults overlaid with the service identity.
    pub fn to_resource(&self) -> Resource {
        Resource::default().merge(&Resource::new([
            KeyValue::new(SERVICE_NAME, self.service_name.clone()),
            KeyValue::new(SERVICE_VERSION, self.service_version.clone()),
        ]))
    }

    /// Constant labels applied to every Prometheus series.
    pub fn metric_labels(&self) -> Vec<(String, String)> {
        vec![
            ("service_name".to_string(), self.service_name.clone()),
            ("service_version".to_string(), self.service_version.clone()),
        ]
    }
}

/// String attribute that is always present; `None` becomes `""`.
pub fn string_or_empty(key: &'static str, value: Option<&str>) -> KeyValue {
    KeyValue::new(key, value.unwrap_or_default().to_string())
}

/// `http.method` and `http.route` for the request that issued the operation.
pub fn http_attributes(method: &str, route: &str) -> [KeyValue; 2] {
    [
        KeyValue::new(HTTP_METHOD, method.to_string()),
        KeyValue::new(HTTP_ROUTE, route.to_string()),
    ]
}

/// Database client attributes: system, name, verb, table and peer.
pub fn db_attributes(target: &DbTarget, operation: &'static str, table: &'static str) -> Vec<KeyValue> {
    let mut attrs = vec![
        KeyValue::new(DB_SYSTEM, target.system),
        KeyValue::new(DB_NAME, target.name.clone()),
        KeyValue::new(DB_OPERATION, operation),
        KeyValue::new(DB_TABLE, table),
    ];
    if let Some(host) = &target.host {
        attrs.push(KeyValue::new(SERVER_ADDRESS, host.clone()));
    }
    if let Some(port) = target.port {
        attrs.push(KeyValue::new(SERVER_PORT, i64::from(port)));
    }
    attrs
}
