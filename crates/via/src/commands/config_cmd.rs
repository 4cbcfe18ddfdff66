//! Config command handlers. None of these contact the server.

use serde::Serialize;
use via_config::Profile;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct ProfileView<'a> {
    name: &'a str,
    default: bool,
    #[serde(flatten)]
    profile: &'a Profile,
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let default_name = config::active_profile_name(global, &cfg);

            let mut entries: Vec<(&String, &Profile)> = cfg.profiles.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let redacted: Vec<(&String, Profile)> = entries
                .into_iter()
                .map(|(name, profile)| {
                    let mut profile = profile.clone();
                    if profile.password.is_some() {
                        profile.password = Some("********".into());
                    }
                    (name, profile)
                })
                .collect();
            let views: Vec<ProfileView<'_>> = redacted
                .iter()
                .map(|(name, profile)| ProfileView {
                    name,
                    default: **name == default_name,
                    profile,
                })
                .collect();

            let out = output::render_single(&global.output, &views, |vs| {
                if vs.is_empty() {
                    return format!(
                        "No profiles configured ({})",
                        config::config_path().display()
                    );
                }
                vs.iter()
                    .map(|v| {
                        let marker = if v.default { "*" } else { " " };
                        let user = v.profile.username.as_deref().unwrap_or("(anonymous)");
                        format!("{marker} {:<16} {:<40} {user}", v.name, v.profile.server)
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let (name, profile) = config::effective_profile(global)?;
            let username = profile.username.as_deref().unwrap_or("admin");
            let password =
                rpassword::prompt_password(format!("Password for {username}@{}: ", profile.server))?;
            via_config::store_password(&name, &password)?;
            if !global.quiet {
                eprintln!("Password stored in the system keyring for profile '{name}'");
            }
            Ok(())
        }
    }
}
