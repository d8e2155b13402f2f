use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

use crate::config::{PipelineConfig, ShadowCascades, ShadowMapSize};

/// Arguments of the `frame_trace` tool.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraceArgs {
    pub scene: PathBuf,
    pub config: Option<PathBuf>,
    pub reversed_z: bool,
    shadow_map_size: Option<ShadowMapSize>,
    cascades: Option<ShadowCascades>,
}

impl TraceArgs {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = TraceArgs::default();
        let mut scene = None;
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw) = iter.next() {
            let arg = raw.as_ref();
            let Some(key) = arg.strip_prefix("--") else {
                if scene.is_some() {
                    bail!("Unexpected argument '{arg}'. Only one scene path is accepted.");
                }
                scene = Some(PathBuf::from(arg));
                continue;
            };
            let value = iter.next().ok_or_else(|| anyhow!("Expected a value after '{arg}'"))?.as_ref().to_string();
            match key {
                "config" => parsed.config = Some(PathBuf::from(value)),
                "reversed-z" => parsed.reversed_z = parse_bool_flag("reversed-z", &value)?,
                "shadow-map-size" => {
                    let pixels = value.parse::<u32>().with_context(|| format!("Invalid shadow map size '{value}'"))?;
                    parsed.shadow_map_size = Some(ShadowMapSize::try_from(pixels).map_err(|err| anyhow!(err))?);
                }
                "cascades" => {
                    let count = value.parse::<u32>().with_context(|| format!("Invalid cascade count '{value}'"))?;
                    parsed.cascades = Some(ShadowCascades::try_from(count).map_err(|err| anyhow!(err))?);
                }
                _ => bail!(
                    "Unknown flag '{arg}'. Supported flags: --config, --reversed-z, --shadow-map-size, --cascades."
                ),
            }
        }
        parsed.scene = scene.ok_or_else(|| anyhow!("Missing scene path: frame_trace <scene.json> [flags]"))?;
        Ok(parsed)
    }

    /// Loads the config file (or defaults) and applies the command-line overrides on top.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(size) = self.shadow_map_size {
            config.shadow_map_size = size;
        }
        if let Some(cascades) = self.cascades {
            config.shadow_cascades = cascades;
        }
        Ok(config)
    }
}

fn parse_bool_flag(flag: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("Invalid {flag} value '{other}'. Use on/off or true/false."),
    }
}
