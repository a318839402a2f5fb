//! Load options, read from JSON.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

/// How to treat a block whose length is not a multiple of its record size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthPolicy {
    /// Drop the trailing partial record and keep going.
    #[default]
    Lenient,
    /// Report the block as malformed and skip it entirely.
    Strict,
}

/// Options controlling how levels are decoded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoadOptions {
    /// Applies to every record block except the area options.
    #[serde(default)]
    pub record_lengths: LengthPolicy,
    /// Whether the session loads the tilesets named by the current area.
    #[serde(default = "default_true")]
    pub load_tilesets: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            record_lengths: LengthPolicy::Lenient,
            load_tilesets: true,
        }
    }
}

impl LoadOptions {
    /// Strict-length variant of the defaults.
    pub fn strict() -> Self {
        Self {
            record_lengths: LengthPolicy::Strict,
            ..Self::default()
        }
    }

    /// Parse options from JSON text; missing fields take their defaults.
    pub fn from_json_str(txt: &str) -> anyhow::Result<Self> {
        serde_json::from_str(txt).context("Parsing load options")
    }

    /// Read options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let p = path.as_ref();
        if p.extension().and_then(|e| e.to_str()) != Some("json") {
            anyhow::bail!("Options file must be a JSON file: {}", p.display());
        }
        let txt = std::fs::read_to_string(p)
            .with_context(|| format!("Reading options file {}", p.display()))?;
        Self::from_json_str(&txt)
            .with_context(|| format!("Parsing options file {}", p.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let opts = LoadOptions::from_json_str("{}").expect("empty object parses");
        assert_eq!(opts, LoadOptions::default());
    }

    #[test]
    fn parses_strict_mode() {
        let opts = LoadOptions::from_json_str(r#"{ "record_lengths": "strict", "load_tilesets": false }"#)
            .expect("valid options");
        assert_eq!(opts.record_lengths, LengthPolicy::Strict);
        assert!(!opts.load_tilesets);
    }

    #[test]
    fn rejects_non_json_extension() {
        let err = LoadOptions::from_json_file("options.toml").unwrap_err();
        assert!(err.to_string().contains("must be a JSON file"));
    }
}
