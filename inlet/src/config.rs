use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port the server listens on
    pub port: u16,
    /// Directory holding per-user databases (`<data_dir>/users/<id>.db`)
    pub data_dir: PathBuf,
    /// Origins allowed by the CORS layer
    pub cors_origins: Vec<String>,
    /// Optional pull enhancement: answer an up-to-date cookie with an empty
    /// patch instead of recomputing the full snapshot
    pub pull_skip_unchanged: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: env_parse("INLET_PORT", 8080)?,
            data_dir: std::env::var("INLET_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            cors_origins: std::env::var("INLET_CORS_ORIGINS")
                .map(|value| {
                    value
                        .split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| {
                    vec![
                        "http://localhost:3000".to_string(),
                        "http://127.0.0.1:3000".to_string(),
                    ]
                }),
            pull_skip_unchanged: env_flag("INLET_PULL_SKIP_UNCHANGED", false),
        })
    }
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid {key} '{value}': {e}")),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            normalized == "1" || normalized == "true" || normalized == "yes"
        })
        .unwrap_or(default)
}
