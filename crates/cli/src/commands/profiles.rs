//! profiles command - List configured profiles

use serde::Serialize;

use super::{CommandContext, fail};
use crate::exit_code::ExitCode;

#[derive(Debug, Serialize)]
struct ProfileList<'a> {
    profiles: Vec<&'a str>,
}

/// Execute the profiles command
pub fn execute(ctx: &CommandContext) -> ExitCode {
    let formatter = ctx.formatter();

    let manager = match &ctx.global.config {
        Some(path) => s3tree_core::ConfigManager::with_path(path),
        None => match s3tree_core::ConfigManager::new() {
            Ok(manager) => manager,
            Err(e) => return fail(&formatter, "Failed to locate configuration", &e),
        },
    };

    let config = match manager.load() {
        Ok(config) => config,
        Err(e) => {
            let context = format!("Failed to load {}", manager.path().display());
            return fail(&formatter, &context, &e);
        }
    };

    let profiles = config.profile_names();
    if formatter.is_json() {
        formatter.json_line(&ProfileList { profiles });
    } else {
        for name in profiles {
            formatter.println(name);
        }
    }

    ExitCode::Success
}
