use serde::{Deserialize, Serialize};

use crate::model::{check_same_identifier, require_identifier, Id, UpdateValue, Violation};
use crate::store::query::{OrderKey, Orderable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub conn_id: Id,
    pub conn_type: String,
    pub description: Option<String>,
    pub host: Option<String>,
    pub schema: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    pub extra: Option<serde_json::Value>,
}

impl Connection {
    pub fn apply_update(&mut self, update: ConnectionUpdate) -> Result<(), Violation> {
        check_same_identifier("conn_id", &self.conn_id, update.conn_id.as_deref())?;
        let port = update.port.try_map(check_port)?;
        if let Some(conn_type) = &update.conn_type {
            if conn_type.trim().is_empty() {
                return Err(Violation::Empty { field: "conn_type" });
            }
        }

        if let Some(conn_type) = update.conn_type {
            self.conn_type = conn_type;
        }
        self.description = update.description.apply_to(self.description.take());
        self.host = update.host.apply_to(self.host.take());
        self.schema = update.schema.apply_to(self.schema.take());
        self.login = update.login.apply_to(self.login.take());
        self.password = update.password.apply_to(self.password.take());
        self.port = port.apply_to(self.port);
        self.extra = update.extra.apply_to(self.extra.take());
        Ok(())
    }
}

fn check_port(port: i64) -> Result<u16, Violation> {
    u16::try_from(port).map_err(|_| Violation::OutOfRange {
        field: "port",
        value: port,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewConnection {
    pub conn_id: Option<Id>,
    pub conn_type: Option<String>,
    pub description: Option<String>,
    pub host: Option<String>,
    pub schema: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
    pub port: Option<i64>,
    pub extra: Option<serde_json::Value>,
}

impl NewConnection {
    pub fn new(conn_id: impl Into<Id>, conn_type: impl Into<String>) -> Self {
        Self {
            conn_id: Some(conn_id.into()),
            conn_type: Some(conn_type.into()),
            ..Self::default()
        }
    }

    pub fn into_connection(self) -> Result<Connection, Violation> {
        let conn_id = require_identifier("conn_id", self.conn_id)?;
        let conn_type = require_identifier("conn_type", self.conn_type)?;
        let port = self.port.map(check_port).transpose()?;

        Ok(Connection {
            conn_id,
            conn_type,
            description: self.description,
            host: self.host,
            schema: self.schema,
            login: self.login,
            password: self.password,
            port,
            extra: self.extra,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionUpdate {
    pub conn_id: Option<Id>,
    pub conn_type: Option<String>,
    #[serde(default)]
    pub description: UpdateValue<String>,
    #[serde(default)]
    pub host: UpdateValue<String>,
    #[serde(default)]
    pub schema: UpdateValue<String>,
    #[serde(default)]
    pub login: UpdateValue<String>,
    #[serde(default)]
    pub password: UpdateValue<String>,
    #[serde(default)]
    pub port: UpdateValue<i64>,
    #[serde(default)]
    pub extra: UpdateValue<serde_json::Value>,
}

impl Orderable for Connection {
    const ORDER_FIELDS: &'static [&'static str] = &["conn_id", "conn_type", "host"];

    fn order_key(&self, field: &str) -> Option<OrderKey> {
        match field {
            "conn_id" => Some(OrderKey::text(&self.conn_id)),
            "conn_type" => Some(OrderKey::text(&self.conn_type)),
            "host" => Some(OrderKey::Text(self.host.clone().unwrap_or_default())),
            _ => None,
        }
    }
}
