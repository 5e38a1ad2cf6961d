// src/config.rs
use crate::services::slot_grid::SlotGrid;
use chrono::Duration;
use std::net::SocketAddr;
use thiserror::Error;

/// Comprimento mínimo da chave de assinatura dos cookies de sessão.
pub const MIN_SESSION_SECRET_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("variável de ambiente {0} não definida")]
    Missing(&'static str),
    #[error("variável de ambiente {name} inválida: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session_secret: String,
    pub bind_addr: SocketAddr,
    pub login_qr_ttl: Duration,
    pub attendance_qr_ttl: Duration,
    pub attendance_qr_max_ttl: Duration,
    pub nonce_sweep_every: std::time::Duration,
    pub session_idle_days: i64,
    pub grid: SlotGrid,
    pub bootstrap_admin: Option<(String, String)>,
}

impl AppConfig {
    /// Lê a configuração do ambiente (depois de `dotenvy::dotenv()`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let session_secret = get("SESSION_SECRET").ok_or(ConfigError::Missing("SESSION_SECRET"))?;
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "SESSION_SECRET",
                reason: format!("precisa de pelo menos {} bytes", MIN_SESSION_SECRET_LEN),
            });
        }

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 3000)),
        };

        let login_minutes = positive(&get, "LOGIN_QR_TTL_MINUTES", 15)?;
        let attendance_minutes = positive(&get, "ATTENDANCE_QR_TTL_MINUTES", 10)?;
        let max_minutes = positive(&get, "ATTENDANCE_QR_MAX_TTL_MINUTES", 120)?;
        if attendance_minutes > max_minutes {
            return Err(ConfigError::Invalid {
                name: "ATTENDANCE_QR_TTL_MINUTES",
                reason: format!("maior que o máximo ({})", max_minutes),
            });
        }
        let sweep_secs = positive(&get, "NONCE_SWEEP_SECS", 60)?;
        let session_idle_days = positive(&get, "SESSION_IDLE_DAYS", 1)?;
        if session_idle_days.checked_mul(86_400).is_none() {
            return Err(ConfigError::Invalid {
                name: "SESSION_IDLE_DAYS",
                reason: format!("{} dias está fora do intervalo suportado", session_idle_days),
            });
        }

        let grid = match get("GRID_TIME_WINDOWS") {
            Some(raw) => SlotGrid::from_window_list(&raw).ok_or_else(|| ConfigError::Invalid {
                name: "GRID_TIME_WINDOWS",
                reason: format!("esperado 'HH:MM-HH:MM,...', recebido '{}'", raw),
            })?,
            None => SlotGrid::standard(),
        };

        let bootstrap_admin = match (get("BOOTSTRAP_ADMIN_USERNAME"), get("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(user), Some(pass)) => Some((user, pass)),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Invalid {
                    name: "BOOTSTRAP_ADMIN_PASSWORD",
                    reason: "username e password do admin inicial têm de vir juntos".into(),
                })
            }
        };

        let login_qr_ttl = minutes("LOGIN_QR_TTL_MINUTES", login_minutes)?;
        let attendance_qr_ttl = minutes("ATTENDANCE_QR_TTL_MINUTES", attendance_minutes)?;
        let attendance_qr_max_ttl = minutes("ATTENDANCE_QR_MAX_TTL_MINUTES", max_minutes)?;

        Ok(Self {
            database_url,
            session_secret,
            bind_addr,
            login_qr_ttl,
            attendance_qr_ttl,
            attendance_qr_max_ttl,
            nonce_sweep_every: std::time::Duration::from_secs(sweep_secs as u64),
            session_idle_days,
            grid,
            bootstrap_admin,
        })
    }
}

fn minutes(name: &'static str, value: i64) -> Result<Duration, ConfigError> {
    Duration::try_minutes(value).ok_or_else(|| ConfigError::Invalid {
        name,
        reason: format!("{} minutos está fora do intervalo suportado", value),
    })
}

fn positive<G>(get: &G, name: &'static str, default: i64) -> Result<i64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<i64>() {
        Ok(v) if v > 0 => Ok(v),
        Ok(_) => Err(ConfigError::Invalid {
            name,
            reason: "tem de ser maior que zero".into(),
        }),
        Err(e) => Err(ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn secret() -> String {
        "x".repeat(64)
    }

    #[test]
    fn defaults_apply() {
        let secret = secret();
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite://classsync.db"),
            ("SESSION_SECRET", secret.as_str()),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, SocketAddr::from(([0, 0, 0, 0], 3000)));
        assert_eq!(config.login_qr_ttl, Duration::minutes(15));
        assert_eq!(config.attendance_qr_ttl, Duration::minutes(10));
        assert_eq!(config.attendance_qr_max_ttl, Duration::minutes(120));
        assert_eq!(config.nonce_sweep_every, std::time::Duration::from_secs(60));
        assert_eq!(config.grid, SlotGrid::standard());
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn required_values_are_checked() {
        assert_eq!(
            AppConfig::from_lookup(lookup(&[("SESSION_SECRET", secret().as_str())])).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("DATABASE_URL", "sqlite::memory:"), ("SESSION_SECRET", "curta")])),
            Err(ConfigError::Invalid { name: "SESSION_SECRET", .. })
        ));
    }

    #[test]
    fn overrides_are_parsed() {
        let secret = secret();
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("SESSION_SECRET", secret.as_str()),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("LOGIN_QR_TTL_MINUTES", "5"),
            ("GRID_TIME_WINDOWS", "08:00-09:00,10:00-11:00"),
            ("BOOTSTRAP_ADMIN_USERNAME", "admin"),
            ("BOOTSTRAP_ADMIN_PASSWORD", "admin123"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.login_qr_ttl, Duration::minutes(5));
        assert_eq!(config.grid.windows().len(), 2);
        assert_eq!(config.bootstrap_admin, Some(("admin".into(), "admin123".into())));

        assert!(matches!(
            AppConfig::from_lookup(lookup(&[
                ("DATABASE_URL", "sqlite::memory:"),
                ("SESSION_SECRET", secret.as_str()),
                ("NONCE_SWEEP_SECS", "0"),
            ])),
            Err(ConfigError::Invalid { name: "NONCE_SWEEP_SECS", .. })
        ));
    }

    #[test]
    fn out_of_range_durations_are_config_errors() {
        let secret = secret();
        let huge = i64::MAX.to_string();
        for name in ["LOGIN_QR_TTL_MINUTES", "ATTENDANCE_QR_MAX_TTL_MINUTES", "SESSION_IDLE_DAYS"] {
            let result = AppConfig::from_lookup(lookup(&[
                ("DATABASE_URL", "sqlite::memory:"),
                ("SESSION_SECRET", secret.as_str()),
                (name, huge.as_str()),
            ]));
            assert!(
                matches!(result, Err(ConfigError::Invalid { name: n, .. }) if n == name),
                "{} devia ser inválido",
                name
            );
        }
    }
}
