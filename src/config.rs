use clap::Parser;
use tracing::Level;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6379;

#[derive(Parser, Debug, Clone)]
#[command(name = "scriptdis", about = "A Redis compatible server with Lua scripting")]
pub struct Config {
    /// The address to bind to
    #[arg(long, env = "SCRIPTDIS_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// The port to listen on
    #[arg(short, long, env = "SCRIPTDIS_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum level of the emitted logs
    #[arg(long, env = "SCRIPTDIS_LOG_LEVEL", default_value_t = Level::INFO)]
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_level: Level::INFO,
        }
    }
}
