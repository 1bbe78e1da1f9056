//! `kbagent config`: configuration management commands.

use anyhow::Context;
use kbagent_config::AppConfig;

pub async fn show() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    println!("{}", config.to_toml()?);
    Ok(())
}

pub async fn path() -> anyhow::Result<()> {
    println!("{}", config_path().display());
    Ok(())
}

pub async fn validate() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Config is invalid")?;

    let foundation = &config.knowledge_base.foundation_dir;
    println!("Config OK ({})", config_path().display());
    println!("  Model:       {}/{}", config.inference.provider, config.inference.model);
    println!("  Max turns:   {}", config.orchestrator.max_turns);
    println!("  Runtime:     {}", config.runtime.url);
    if foundation.is_dir() {
        println!("  Foundation:  {}", foundation.display());
    } else {
        println!("  Foundation:  {} (missing, knowledge base will be empty)", foundation.display());
    }
    Ok(())
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = super::config_path();
        assert!(path.to_str().unwrap().ends_with("config.toml"));
        assert!(path.to_str().unwrap().contains(".kbagent"));
    }
}
