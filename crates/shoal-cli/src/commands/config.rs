//! `shoal config show`.

use anyhow::{Result, anyhow};
use shoal_config::{ResolvedConfig, ShowFormat};

/// Parse the `--format` value.
pub(crate) fn parse_format(format: &str) -> Result<ShowFormat> {
    match format {
        "toml" => Ok(ShowFormat::Toml),
        "json" => Ok(ShowFormat::Json),
        other => Err(anyhow!("unknown format '{other}', expected toml or json")),
    }
}

/// Print the resolved configuration.
pub(crate) fn show_config(resolved: &ResolvedConfig, format: &str) -> Result<()> {
    let rendered = resolved
        .show(parse_format(format)?)
        .map_err(|_| anyhow!("failed to render configuration"))?;
    println!("{rendered}");
    Ok(())
}
