use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Peerlink signaling relay server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "peerlink-server", version, about = "Peerlink signaling relay server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PEERLINK_PORT", default_value = "8080")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "PEERLINK_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./peerlink.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "PEERLINK_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Origins allowed for CORS and WebSocket connections; empty allows any
    #[arg(long, env = "PEERLINK_ALLOWED_ORIGINS", value_delimiter = ',')]
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// AI proxy configuration (loaded from [ai] section in TOML)
    #[arg(skip)]
    #[serde(default = "default_ai_config")]
    pub ai: Option<AiConfig>,
}

/// Configuration for the AI chat-completion proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Base URL of the OpenAI-compatible upstream (default: https://api.openai.com/v1)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key pool; requests rotate round-robin through these
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// Model name sent on server-generated requests (default: gpt-4o-mini)
    #[serde(default = "default_model")]
    pub model: String,

    /// System prompt used to generate a character's daily event and mood.
    /// `{character}` is replaced with the character's own system prompt.
    #[serde(default = "default_event_mood_prompt")]
    pub event_mood_prompt: String,

    /// System prompt used when condensing a conversation into a summary
    #[serde(default = "default_summary_prompt")]
    pub summary_prompt: String,

    /// Timeout in seconds for non-streaming upstream calls (default: 30)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Interval in seconds between daily mood cache clears (default: 86400 = 24 hours)
    #[serde(default = "default_mood_clear_interval")]
    pub mood_clear_interval_secs: u64,

    /// Rate limit: seconds to replenish one request token per client IP (default: 2)
    #[serde(default = "default_rate_limit_replenish")]
    pub rate_limit_replenish_secs: u64,

    /// Rate limit: burst size per client IP (default: 30)
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_keys: Vec::new(),
            model: default_model(),
            event_mood_prompt: default_event_mood_prompt(),
            summary_prompt: default_summary_prompt(),
            request_timeout_secs: default_request_timeout(),
            mood_clear_interval_secs: default_mood_clear_interval(),
            rate_limit_replenish_secs: default_rate_limit_replenish(),
            rate_limit_burst: default_rate_limit_burst(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_event_mood_prompt() -> String {
    "You play a character described below. Invent one small thing that \
     happened to the character today and the mood it left them in. Respond \
     with a JSON object of the form {\"event\": \"...\", \"mood\": \"...\"} \
     and nothing else.\n\nCharacter:\n{character}"
        .to_string()
}

fn default_summary_prompt() -> String {
    "Condense the conversation below into a short summary the character \
     could recall later. Keep names, decisions and emotional beats; drop \
     filler."
        .to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_mood_clear_interval() -> u64 {
    86400
}

fn default_rate_limit_replenish() -> u64 {
    2
}

fn default_rate_limit_burst() -> u32 {
    30
}

fn default_ai_config() -> Option<AiConfig> {
    Some(AiConfig::default())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            config: "./peerlink.toml".to_string(),
            json_logs: false,
            generate_config: false,
            allowed_origins: Vec::new(),
            ai: Some(AiConfig::default()),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (PEERLINK_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("PEERLINK_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Peerlink Signaling Server Configuration
# Place this file at ./peerlink.toml or specify with --config <path>
# All settings can be overridden via environment variables (PEERLINK_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Origins allowed for CORS and WebSocket connections.
# Empty list (the default) allows any origin.
# allowed_origins = ["https://chat.example.com"]

# ---- AI Chat Proxy ----
# [ai]

# Base URL of the OpenAI-compatible upstream
# base_url = "https://api.openai.com/v1"

# API key pool; requests rotate round-robin through these.
# With no keys configured the /v1 endpoints answer 502.
# api_keys = ["sk-first", "sk-second"]

# Model used for server-generated requests (mood generation, summaries)
# model = "gpt-4o-mini"

# Timeout in seconds for non-streaming upstream calls
# request_timeout_secs = 30

# Interval in seconds between daily mood cache clears (default: 24 hours)
# mood_clear_interval_secs = 86400

# Per-IP rate limit on /v1/*: one request token replenished every
# rate_limit_replenish_secs seconds, up to rate_limit_burst tokens.
# rate_limit_replenish_secs = 2
# rate_limit_burst = 30
"#
    .to_string()
}
