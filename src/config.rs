use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Candidates pulled from the provider when the pantry has food.
    pub fetch_limit: usize,
    pub top_n: usize,
    /// Unscored candidates shown when nothing can be ranked.
    pub fallback_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RewardsConfig {
    pub points_per_food_save: i32,
    pub points_per_donated_unit: i32,
    pub redemption_ttl_days: i64,
    pub tx_max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub request_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub recipes: RecipeConfig,
    pub rewards: RewardsConfig,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.yummy.co.id".into(),
            timeout_secs: 30,
            fetch_limit: 15,
            top_n: 5,
            fallback_size: 5,
        }
    }
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            points_per_food_save: 10,
            points_per_donated_unit: 10,
            redemption_ttl_days: 30,
            tx_max_attempts: 3,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "pantry-rewards".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "pantry-rewards-users".into()),
        };

        let d = RecipeConfig::default();
        let recipes = RecipeConfig {
            base_url: std::env::var("RECIPE_API_BASE_URL").unwrap_or(d.base_url),
            timeout_secs: env_or("RECIPE_API_TIMEOUT_SECS", d.timeout_secs),
            fetch_limit: env_or("RECIPE_FETCH_LIMIT", d.fetch_limit),
            top_n: env_or("RECIPE_TOP_N", d.top_n),
            fallback_size: env_or("RECIPE_FALLBACK_SIZE", d.fallback_size),
        };

        let d = RewardsConfig::default();
        let rewards = RewardsConfig {
            points_per_food_save: env_or("POINTS_PER_FOOD_SAVE", d.points_per_food_save),
            points_per_donated_unit: env_or("POINTS_PER_DONATED_UNIT", d.points_per_donated_unit),
            redemption_ttl_days: env_or("REDEMPTION_TTL_DAYS", d.redemption_ttl_days),
            tx_max_attempts: env_or("TX_MAX_ATTEMPTS", d.tx_max_attempts).max(1),
        };

        anyhow::ensure!(
            rewards.points_per_food_save > 0 && rewards.points_per_donated_unit > 0,
            "point awards must be positive"
        );
        anyhow::ensure!(rewards.redemption_ttl_days > 0, "REDEMPTION_TTL_DAYS must be positive");

        Ok(Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 15),
            jwt,
            recipes,
            rewards,
        })
    }
}
