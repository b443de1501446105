//! Extension pour intégrer LiveMonitor dans lmconfig
//!
//! Ce module fournit le trait `LiveMonitorConfigExt` qui ajoute à
//! `lmconfig::Config` des getters typés pour la section `livemonitor` :
//! source, intervalle de mise à jour, timeouts et réglages du résolveur.
//!
//! Les valeurs absentes ou invalides retombent sur les valeurs par défaut.
//!
//! # Exemple
//!
//! ```no_run
//! use lmconfig::get_config;
//! use lmjrs::LiveMonitorConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! println!("Source: {}", config.get_source_url()?);
//! println!("Interval: {:?}", config.get_fetch_interval()?);
//! # Ok(())
//! # }
//! ```

use crate::client::{DEFAULT_FEED_TIMEOUT_SECS, DEFAULT_REFERER, DEFAULT_SOURCE_URL};
use crate::monitor::DEFAULT_GROUP_LABEL;
use crate::resolver::{DEFAULT_MAX_DEPTH, DEFAULT_MIN_BASE64_LEN};
use anyhow::Result;
use lmconfig::Config;
use serde_yaml::Value;
use std::time::Duration;

/// Intervalle par défaut entre deux mises à jour (5 minutes)
pub const DEFAULT_FETCH_INTERVAL_SECS: u64 = 300;

/// Délai par défaut avant la première mise à jour
pub const DEFAULT_STARTUP_DELAY_SECS: u64 = 5;

pub const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 8;
pub const DEFAULT_FRAME_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_THROTTLE_MS: u64 = 200;

const SECTION: &str = "livemonitor";

/// Trait d'extension pour la configuration LiveMonitor
pub trait LiveMonitorConfigExt {
    /// URL du script de programme (sans paramètre anti-cache)
    fn get_source_url(&self) -> Result<String>;

    /// Change l'URL du script de programme
    fn set_source_url(&self, url: &str) -> Result<()>;

    /// Referer envoyé avec les requêtes
    fn get_referer(&self) -> Result<String>;

    /// Intervalle entre deux cycles planifiés (au moins une seconde)
    fn get_fetch_interval(&self) -> Result<Duration>;

    /// Change l'intervalle entre deux cycles planifiés
    fn set_fetch_interval(&self, interval: Duration) -> Result<()>;

    /// Délai avant le premier cycle, laisse au serveur HTTP le temps de démarrer
    fn get_startup_delay(&self) -> Result<Duration>;

    /// Libellé de groupe des entrées de la playlist
    fn get_group_label(&self) -> Result<String>;

    fn get_feed_timeout(&self) -> Result<Duration>;
    fn get_page_timeout(&self) -> Result<Duration>;
    fn get_frame_timeout(&self) -> Result<Duration>;

    /// Pause entre deux appels réseau du résolveur
    fn get_throttle(&self) -> Result<Duration>;

    /// Profondeur maximale de récursion dans les iframes
    fn get_resolver_max_depth(&self) -> Result<usize>;

    /// Longueur minimale d'un jeton base64 candidat
    fn get_min_base64_len(&self) -> Result<usize>;
}

impl LiveMonitorConfigExt for Config {
    fn get_source_url(&self) -> Result<String> {
        Ok(self.get_string_or(&[SECTION, "source_url"], DEFAULT_SOURCE_URL))
    }

    fn set_source_url(&self, url: &str) -> Result<()> {
        self.set_value(&[SECTION, "source_url"], Value::String(url.to_string()))
    }

    fn get_referer(&self) -> Result<String> {
        Ok(self.get_string_or(&[SECTION, "referer"], DEFAULT_REFERER))
    }

    fn get_fetch_interval(&self) -> Result<Duration> {
        let secs = self.get_u64_or(&[SECTION, "fetch_interval_secs"], DEFAULT_FETCH_INTERVAL_SECS);
        Ok(Duration::from_secs(secs.max(1)))
    }

    fn set_fetch_interval(&self, interval: Duration) -> Result<()> {
        self.set_value(
            &[SECTION, "fetch_interval_secs"],
            Value::Number(serde_yaml::Number::from(interval.as_secs())),
        )
    }

    fn get_startup_delay(&self) -> Result<Duration> {
        Ok(Duration::from_secs(self.get_u64_or(
            &[SECTION, "startup_delay_secs"],
            DEFAULT_STARTUP_DELAY_SECS,
        )))
    }

    fn get_group_label(&self) -> Result<String> {
        Ok(self.get_string_or(&[SECTION, "group_label"], DEFAULT_GROUP_LABEL))
    }

    fn get_feed_timeout(&self) -> Result<Duration> {
        Ok(Duration::from_secs(self.get_u64_or(
            &[SECTION, "timeouts", "feed_secs"],
            DEFAULT_FEED_TIMEOUT_SECS,
        )))
    }

    fn get_page_timeout(&self) -> Result<Duration> {
        Ok(Duration::from_secs(self.get_u64_or(
            &[SECTION, "timeouts", "page_secs"],
            DEFAULT_PAGE_TIMEOUT_SECS,
        )))
    }

    fn get_frame_timeout(&self) -> Result<Duration> {
        Ok(Duration::from_secs(self.get_u64_or(
            &[SECTION, "timeouts", "frame_secs"],
            DEFAULT_FRAME_TIMEOUT_SECS,
        )))
    }

    fn get_throttle(&self) -> Result<Duration> {
        Ok(Duration::from_millis(
            self.get_u64_or(&[SECTION, "throttle_ms"], DEFAULT_THROTTLE_MS),
        ))
    }

    fn get_resolver_max_depth(&self) -> Result<usize> {
        let depth = self.get_u64_or(&[SECTION, "resolver", "max_depth"], DEFAULT_MAX_DEPTH as u64);
        Ok(usize::try_from(depth)?)
    }

    fn get_min_base64_len(&self) -> Result<usize> {
        let len = self.get_u64_or(
            &[SECTION, "resolver", "min_base64_len"],
            DEFAULT_MIN_BASE64_LEN as u64,
        );
        Ok(usize::try_from(len)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults() {
        let config = Config::embedded().unwrap();
        assert_eq!(config.get_source_url().unwrap(), DEFAULT_SOURCE_URL);
        assert_eq!(config.get_referer().unwrap(), DEFAULT_REFERER);
        assert_eq!(config.get_fetch_interval().unwrap(), Duration::from_secs(300));
        assert_eq!(config.get_startup_delay().unwrap(), Duration::from_secs(5));
        assert_eq!(config.get_group_label().unwrap(), "JRS直播");
        assert_eq!(config.get_feed_timeout().unwrap(), Duration::from_secs(15));
        assert_eq!(config.get_page_timeout().unwrap(), Duration::from_secs(8));
        assert_eq!(config.get_frame_timeout().unwrap(), Duration::from_secs(5));
        assert_eq!(config.get_throttle().unwrap(), Duration::from_millis(200));
        assert_eq!(config.get_resolver_max_depth().unwrap(), 2);
        assert_eq!(config.get_min_base64_len().unwrap(), 30);
    }

    #[test]
    fn test_setters() {
        let config = Config::embedded().unwrap();
        config.set_source_url("https://feed.example/index.js?x").unwrap();
        config.set_fetch_interval(Duration::from_secs(60)).unwrap();
        assert_eq!(config.get_source_url().unwrap(), "https://feed.example/index.js?x");
        assert_eq!(config.get_fetch_interval().unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = Config::embedded().unwrap();
        config.set_fetch_interval(Duration::ZERO).unwrap();
        assert_eq!(config.get_fetch_interval().unwrap(), Duration::from_secs(1));
    }
}
