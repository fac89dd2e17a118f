use crate::{cli::CommandResult, config::Config};

/// Pretty-printed JSON schema of the configuration file
pub(super) fn print() -> CommandResult {
    let schema = schemars::schema_for!(Config);
    Ok(serde_json::to_string_pretty(&schema)?)
}
