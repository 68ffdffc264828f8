/// Address of the real SMB server the proxy forwards traffic to.
///
/// Grounded on `REMOTE_SAMBA_HOST`/`REMOTE_SAMBA_PORT` from the ambient
/// configuration: the proxy listens on the well-known SMB port and connects
/// onward to an internal Samba instance on a non-standard port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            host: "127.0.0.1".to_string(),
            port: 1445,
        }
    }
}

impl BackendConfig {
    pub fn addr_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
