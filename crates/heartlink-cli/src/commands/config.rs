//! Config command implementation.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::cli::ConfigAction;
use crate::config::Config;

pub fn cmd_config(action: ConfigAction) -> Result<()> {
    run_config(action, &Config::path(), &mut std::io::stdout())
}

fn run_config<W: Write>(action: ConfigAction, path: &Path, out: &mut W) -> Result<()> {
    match action {
        ConfigAction::Path => {
            writeln!(out, "{}", path.display())?;
        }
        ConfigAction::Show => {
            let config = Config::load_from(path);
            let content =
                toml::to_string_pretty(&config).context("Failed to serialize config")?;
            write!(out, "{}", content)?;
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "Config already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save_to(path)?;
            writeln!(out, "Wrote default config to {}", path.display())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_action() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut out = Vec::new();

        run_config(ConfigAction::Path, &path, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap().trim(),
            path.display().to_string()
        );
    }

    #[test]
    fn test_init_then_show() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        run_config(ConfigAction::Init { force: false }, &path, &mut Vec::new()).unwrap();
        assert!(path.exists());

        let mut out = Vec::new();
        run_config(ConfigAction::Show, &path, &mut out).unwrap();
        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("target_name = \"BLEScanner\""));
        assert!(shown.contains("decoder = \"literal\""));
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "no_color = true\n").unwrap();

        let err = run_config(ConfigAction::Init { force: false }, &path, &mut Vec::new())
            .unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert!(Config::load_from(&path).no_color);

        run_config(ConfigAction::Init { force: true }, &path, &mut Vec::new()).unwrap();
        assert!(!Config::load_from(&path).no_color);
    }
}
