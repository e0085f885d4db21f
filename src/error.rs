use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum SupervisorError {
    #[display("failed to connect to {host}:{port}")]
    Connection { host: String, port: u16 },
    #[display("write to exchange socket failed")]
    Write,
}

#[derive(Debug, Display, Error)]
pub enum IoError {
    #[display("failed to create directory {path}")]
    CreateDir { path: String },
}
