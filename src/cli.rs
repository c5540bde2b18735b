use clap::Parser;

/// Multi-tenant reverse proxy in front of a generative-model provider.
#[derive(Debug, Parser)]
#[command(name = "genrelay", version, about)]
pub struct Cli {
    /// Path to the YAML config file.
    #[arg(long, env = "GENRELAY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Bind address override; takes precedence over the config file's host:port.
    #[arg(long, env = "GENRELAY_BIND")]
    pub bind: Option<String>,
}
