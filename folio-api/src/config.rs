use folio_common::snowflake::WorkerId;
use serde::Deserialize;
use std::{net::IpAddr, num::NonZeroU64, path::PathBuf, time::Duration};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Files,
    Postgres,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    #[serde(default)]
    pub store_backend: StoreBackend,
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,
    pub database_url: Option<String>,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: NonZeroU64,
    #[serde(default)]
    pub worker_id: WorkerId,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    pub admin_password: Option<String>,
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_store_timeout_ms() -> NonZeroU64 {
    NonZeroU64::new(5000).unwrap_or(NonZeroU64::MIN)
}

fn default_admin_username() -> String {
    "admin".to_owned()
}

impl Env {
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms.get())
    }
}
