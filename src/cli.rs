//! Command-line flags shared by the database-backed binaries

use crate::store::DbConfig;
use clap::Args;

/// Store connection flags, each falling back to the libpq environment variable
#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    /// Full connection URL, overrides the individual flags
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "PGHOST", default_value = "localhost")]
    pub db_host: String,

    #[arg(long, env = "PGPORT", default_value_t = 5432)]
    pub db_port: u16,

    #[arg(long, env = "PGUSER", default_value = "postgres")]
    pub db_user: String,

    #[arg(long, env = "PGPASSWORD", default_value = "", hide_env_values = true)]
    pub db_password: String,

    #[arg(long, env = "PGDATABASE", default_value = "repo_ingest")]
    pub db_name: String,

    /// Maximum pool connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub db_max_connections: u32,
}

impl From<DbArgs> for DbConfig {
    fn from(args: DbArgs) -> Self {
        DbConfig {
            database_url: args.database_url.filter(|url| !url.is_empty()),
            host: args.db_host,
            port: args.db_port,
            user: args.db_user,
            password: args.db_password,
            database: args.db_name,
            max_connections: args.db_max_connections,
            ..DbConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        db: DbArgs,
    }

    #[test]
    fn test_flags_map_to_config() {
        let harness = Harness::parse_from([
            "test",
            "--db-host",
            "db.internal",
            "--db-port",
            "6543",
            "--db-name",
            "corpus",
            "--database-url",
            "",
        ]);
        let config: DbConfig = harness.db.into();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6543);
        assert_eq!(config.database, "corpus");
        assert!(config.database_url.is_none());
    }
}
