//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP client and retry settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Where and how the bulletin is discovered
    #[serde(default)]
    pub source: SourceConfig,

    /// Day-block parsing vocabulary
    #[serde(default)]
    pub parser: ParserConfig,

    /// Geocoding backend settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Output and cache locations
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("cannot read {}: {e}", path.display())))?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.max_attempts == 0 || self.http.probe_attempts == 0 {
            return Err(AppError::validation(
                "http.max_attempts and http.probe_attempts must be > 0",
            ));
        }
        if url::Url::parse(&self.source.site_base).is_err() {
            return Err(AppError::validation(format!(
                "source.site_base is not a valid URL: {}",
                self.source.site_base
            )));
        }
        if self.source.radar_tokens.is_empty() {
            return Err(AppError::validation("source.radar_tokens is empty"));
        }
        if self.source.filename_templates.is_empty() || self.source.storage_paths.is_empty() {
            return Err(AppError::validation(
                "source.filename_templates and source.storage_paths must not be empty",
            ));
        }
        if self.parser.morning_labels.is_empty() || self.parser.afternoon_labels.is_empty() {
            return Err(AppError::validation("parser shift labels must not be empty"));
        }
        if self.resolver.mirrors.is_empty() {
            return Err(AppError::validation("resolver.mirrors is empty"));
        }
        if self.resolver.mirror_attempts == 0 {
            return Err(AppError::validation("resolver.mirror_attempts must be > 0"));
        }
        if !self.resolver.bbox.is_valid() {
            return Err(AppError::validation(
                "resolver.bbox must satisfy south < north and west < east",
            ));
        }
        Ok(())
    }
}

/// HTTP client and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for every request
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts for page and document fetches
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds
    #[serde(default = "defaults::base_delay")]
    pub base_delay_ms: u64,

    /// Extra delay added per attempt, in milliseconds
    #[serde(default = "defaults::delay_step")]
    pub delay_step_ms: u64,

    /// Attempts for existence checks (a 404 is an answer, not a fault)
    #[serde(default = "defaults::probe_attempts")]
    pub probe_attempts: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay(),
            delay_step_ms: defaults::delay_step(),
            probe_attempts: defaults::probe_attempts(),
        }
    }
}

/// Bulletin discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Scheme and host of the publishing site
    #[serde(default = "defaults::site_base")]
    pub site_base: String,

    /// Path of the site's built-in search page
    #[serde(default = "defaults::search_path")]
    pub search_path: String,

    /// Keyword submitted to the site search
    #[serde(default = "defaults::search_keyword")]
    pub search_keyword: String,

    /// Only search documents modified within this many days
    #[serde(default = "defaults::search_days_back")]
    pub search_days_back: i64,

    /// Locale id expected by the search page
    #[serde(default = "defaults::search_locale")]
    pub search_locale: u32,

    /// Tokens identifying a radar bulletin link (matched case-insensitively)
    #[serde(default = "defaults::radar_tokens")]
    pub radar_tokens: Vec<String>,

    /// Listing pages crawled by the listing strategy
    #[serde(default = "defaults::listing_pages")]
    pub listing_pages: Vec<String>,

    /// Query parameter used for paginated listing variants
    #[serde(default = "defaults::page_param")]
    pub page_param: String,

    /// Paginated variants fetched per listing page (beyond the first)
    #[serde(default = "defaults::max_listing_pages")]
    pub max_listing_pages: u32,

    /// Articles followed for embedded PDFs
    #[serde(default = "defaults::max_articles")]
    pub max_articles: usize,

    /// Path fragments that mark a link as an article page
    #[serde(default = "defaults::article_patterns")]
    pub article_patterns: Vec<String>,

    /// Document library paths where bulletins are stored
    #[serde(default = "defaults::storage_paths")]
    pub storage_paths: Vec<String>,

    /// Bulletin filename templates
    #[serde(default = "defaults::filename_templates")]
    pub filename_templates: Vec<String>,

    /// Months scanned by the historical fallback
    #[serde(default = "defaults::history_months")]
    pub history_months: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            site_base: defaults::site_base(),
            search_path: defaults::search_path(),
            search_keyword: defaults::search_keyword(),
            search_days_back: defaults::search_days_back(),
            search_locale: defaults::search_locale(),
            radar_tokens: defaults::radar_tokens(),
            listing_pages: defaults::listing_pages(),
            page_param: defaults::page_param(),
            max_listing_pages: defaults::max_listing_pages(),
            max_articles: defaults::max_articles(),
            article_patterns: defaults::article_patterns(),
            storage_paths: defaults::storage_paths(),
            filename_templates: defaults::filename_templates(),
            history_months: defaults::history_months(),
        }
    }
}

/// Vocabulary used to cut and clean day blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default = "defaults::morning_labels")]
    pub morning_labels: Vec<String>,

    #[serde(default = "defaults::afternoon_labels")]
    pub afternoon_labels: Vec<String>,

    /// Letterhead phrases removed from every block
    #[serde(default = "defaults::boilerplate")]
    pub boilerplate: Vec<String>,

    /// Text from these words to end of line is dropped
    #[serde(default = "defaults::velocity_keywords")]
    pub velocity_keywords: Vec<String>,

    /// Header lines dropped when they make up the whole line
    #[serde(default = "defaults::stoplist")]
    pub stoplist: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            morning_labels: defaults::morning_labels(),
            afternoon_labels: defaults::afternoon_labels(),
            boilerplate: defaults::boilerplate(),
            velocity_keywords: defaults::velocity_keywords(),
            stoplist: defaults::stoplist(),
        }
    }
}

/// Geocoding backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Interchangeable interpreter endpoints, tried in order
    #[serde(default = "defaults::mirrors")]
    pub mirrors: Vec<String>,

    /// Area searched for streets
    #[serde(default)]
    pub bbox: BoundingBox,

    /// Pause between two backend queries, in milliseconds
    #[serde(default = "defaults::cooldown")]
    pub cooldown_ms: u64,

    /// Attempts per mirror before moving to the next one
    #[serde(default = "defaults::mirror_attempts")]
    pub mirror_attempts: u32,

    /// Server-side query timeout in seconds
    #[serde(default = "defaults::query_timeout")]
    pub query_timeout_secs: u64,

    /// Known bulletin names whose map name differs
    #[serde(default = "defaults::aliases")]
    pub aliases: Vec<StreetAlias>,
}

impl ResolverConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mirrors: defaults::mirrors(),
            bbox: BoundingBox::default(),
            cooldown_ms: defaults::cooldown(),
            mirror_attempts: defaults::mirror_attempts(),
            query_timeout_secs: defaults::query_timeout(),
            aliases: defaults::aliases(),
        }
    }
}

/// Geographic bounding box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn is_valid(&self) -> bool {
        self.south < self.north && self.west < self.east
    }
}

impl Default for BoundingBox {
    /// León city and its ring roads.
    fn default() -> Self {
        Self {
            south: 42.55,
            west: -5.63,
            north: 42.64,
            east: -5.52,
        }
    }
}

/// Map names to try for a street the bulletin spells differently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreetAlias {
    pub name: String,
    pub aliases: Vec<String>,
}

/// Output and cache locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "defaults::output_dir")]
    pub output_dir: String,

    /// Feature collection file, relative to `output_dir`
    #[serde(default = "defaults::features_file")]
    pub features_file: String,

    /// Last-known-good bulletin URL, relative to `output_dir`
    #[serde(default = "defaults::cache_file")]
    pub cache_file: String,

    /// `source` property written on every feature
    #[serde(default = "defaults::attribution")]
    pub attribution: String,
}

impl OutputConfig {
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: defaults::output_dir(),
            features_file: defaults::features_file(),
            cache_file: defaults::cache_file(),
            attribution: defaults::attribution(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use super::StreetAlias;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; radar-feed/0.1; +https://github.com/radar-feed)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn base_delay() -> u64 {
        1000
    }
    pub fn delay_step() -> u64 {
        1500
    }
    pub fn probe_attempts() -> u32 {
        1
    }

    // Source defaults
    pub fn site_base() -> String {
        "https://www.aytoleon.es".into()
    }
    pub fn search_path() -> String {
        "/_layouts/15/osssearchresults.aspx".into()
    }
    pub fn search_keyword() -> String {
        "radar".into()
    }
    pub fn search_days_back() -> i64 {
        60
    }
    pub fn search_locale() -> u32 {
        3082
    }
    pub fn radar_tokens() -> Vec<String> {
        strings(&["radar"])
    }
    pub fn listing_pages() -> Vec<String> {
        strings(&[
            "/es/actualidad/noticias/Paginas/default.aspx",
            "/es/actualidad/avisos/Paginas/default.aspx",
        ])
    }
    pub fn page_param() -> String {
        "page".into()
    }
    pub fn max_listing_pages() -> u32 {
        3
    }
    pub fn max_articles() -> usize {
        15
    }
    pub fn article_patterns() -> Vec<String> {
        strings(&["/noticias/Paginas/", "/avisos/Paginas/"])
    }
    pub fn storage_paths() -> Vec<String> {
        strings(&[
            "/es/actualidad/noticias/Documents/",
            "/es/actualidad/avisos/Documents/",
            "/es/municipio/policia-local/Documents/",
        ])
    }
    pub fn filename_templates() -> Vec<String> {
        strings(&[
            "Radares {Mes} {yyyy}.pdf",
            "RADARES {MES} {yyyy}.pdf",
            "radares-{mes}-{yyyy}.pdf",
            "radares_{mes}_{yyyy}.pdf",
            "Radares-{mm}-{yyyy}.pdf",
            "radar-{mes}-{yy}.pdf",
        ])
    }
    pub fn history_months() -> u32 {
        12
    }

    // Parser defaults
    pub fn morning_labels() -> Vec<String> {
        strings(&["mañana", "manana", "morning"])
    }
    pub fn afternoon_labels() -> Vec<String> {
        strings(&["tarde", "afternoon"])
    }
    pub fn boilerplate() -> Vec<String> {
        strings(&[
            "Ayuntamiento de León",
            "Excmo. Ayuntamiento de León",
            "Policía Local de León",
            "Policía Local",
            "Concejalía de Seguridad y Movilidad",
            "Ubicación de radares móviles",
            "Radar móvil",
        ])
    }
    pub fn velocity_keywords() -> Vec<String> {
        strings(&["velocidad", "velocity"])
    }
    pub fn stoplist() -> Vec<String> {
        strings(&[
            "día", "dia", "días", "turno", "day", "shift", "fecha", "ubicación", "ubicacion",
            "lugar", "horario",
        ])
    }

    // Resolver defaults
    pub fn mirrors() -> Vec<String> {
        strings(&[
            "https://overpass-api.de/api/interpreter",
            "https://overpass.kumi.systems/api/interpreter",
            "https://overpass.private.coffee/api/interpreter",
        ])
    }
    pub fn cooldown() -> u64 {
        1100
    }
    pub fn mirror_attempts() -> u32 {
        2
    }
    pub fn query_timeout() -> u64 {
        25
    }
    pub fn aliases() -> Vec<StreetAlias> {
        vec![
            StreetAlias {
                name: "Avenida Ordoño II".to_string(),
                aliases: strings(&["Avenida de Ordoño II", "Calle Ordoño II"]),
            },
            StreetAlias {
                name: "Avenida Padre Isla".to_string(),
                aliases: strings(&["Avenida del Padre Isla"]),
            },
            StreetAlias {
                name: "Avenida Fernández Ladreda".to_string(),
                aliases: strings(&["Avenida de Fernández Ladreda"]),
            },
            StreetAlias {
                name: "Avenida Mariano Andrés".to_string(),
                aliases: strings(&["Avenida de Mariano Andrés"]),
            },
            StreetAlias {
                name: "Avenida Párroco Pablo Díez".to_string(),
                aliases: strings(&["Avenida del Párroco Pablo Díez"]),
            },
        ]
    }

    // Output defaults
    pub fn output_dir() -> String {
        "radars".into()
    }
    pub fn features_file() -> String {
        "radares_moviles_hoy.geojson".into()
    }
    pub fn cache_file() -> String {
        "last_radar_pdf.txt".into()
    }
    pub fn attribution() -> String {
        "Ayuntamiento de León - Policía Local; geometría © OpenStreetMap".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.http.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_mirrors() {
        let mut config = Config::default();
        config.resolver.mirrors.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_bbox() {
        let mut config = Config::default();
        config.resolver.bbox.south = 43.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [resolver]
            cooldown_ms = 0

            [output]
            output_dir = "out"
            "#,
        )
        .unwrap();
        assert_eq!(config.resolver.cooldown_ms, 0);
        assert_eq!(config.resolver.mirrors.len(), 3);
        assert_eq!(config.output.output_dir, "out");
        assert_eq!(config.output.cache_file, "last_radar_pdf.txt");
        assert_eq!(config.source.history_months, 12);
    }

    #[test]
    fn load_or_default_survives_missing_file() {
        let config = Config::load_or_default("does/not/exist.toml");
        assert_eq!(config.http.max_attempts, 3);
    }

    #[test]
    fn load_reports_malformed_toml_as_toml_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[resolver\ncooldown_ms = ").unwrap();

        assert!(matches!(Config::load(&path), Err(AppError::Toml(_))));
    }

    #[test]
    fn load_reports_missing_file_as_config_error() {
        assert!(matches!(
            Config::load("does/not/exist.toml"),
            Err(AppError::Config(_))
        ));
    }
}
