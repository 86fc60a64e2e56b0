use anyhow::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => anyhow::bail!("unknown USER_STORE backend: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    /// Present only for the postgres backend.
    pub db: Option<DbConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't touch the process env.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("APP_PORT") {
            Some(v) => v.parse::<u16>().context("APP_PORT must be a port number")?,
            None => 3000,
        };
        let store = match lookup("USER_STORE") {
            Some(v) => v.parse()?,
            None => StoreBackend::Postgres,
        };

        let db = match store {
            StoreBackend::Postgres => Some(DbConfig {
                url: lookup("DATABASE_URL").context("DATABASE_URL is required for the postgres store")?,
                max_connections: match lookup("DB_MAX_CONNECTIONS") {
                    Some(v) => v
                        .parse::<u32>()
                        .context("DB_MAX_CONNECTIONS must be a positive integer")?,
                    None => 10,
                },
            }),
            StoreBackend::Memory => None,
        };

        Ok(Self {
            host,
            port,
            store,
            db,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
