// src/services/parser.rs

//! Day-block parser.
//!
//! The bulletin has no usable table structure once extracted, only a text
//! stream. A day's entries start at a line like `14 MAÑANA` and run until
//! the next `<day> <shift>` line, so each shift is located independently:
//! the morning and afternoon blocks of one day are not always adjacent.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::Result;
use crate::models::{DayBlock, ParserConfig, Shift, StreetMention};

/// Day numbers accepted as block anchors.
const ANY_DAY: &str = r"(?:0?[1-9]|[12][0-9]|3[01])";

/// Street-type abbreviations and their expansions.
static ABBREVIATIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\bavda\b", "Avenida"),
        (r"(?i)\bavd\b", "Avenida"),
        (r"(?i)\bav\b", "Avenida"),
        (r"(?i)\bc/\s*", "Calle "),
        (r"(?i)\bpza\b", "Plaza"),
        (r"(?i)\bpl\b", "Plaza"),
        (r"(?i)\bctra\b", "Carretera"),
        (r"(?i)\bpso\b", "Paseo"),
        (r"(?i)\bp[º°]\s*", "Paseo "),
        (r"(?i)\bgta\b", "Glorieta"),
        (r"(?i)\brda\b", "Ronda"),
        (r"(?i)\btrva\b", "Travesía"),
    ]
    .into_iter()
    .filter_map(|(pattern, full)| Regex::new(pattern).ok().map(|re| (re, full)))
    .collect()
});

/// Linking articles inside a name: "de la", "de los", "de las", "del".
static LINKING_ARTICLE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(\s)(de\s+l(?:as|os|a)|del)\b").ok());

/// Normalize one bulletin line into a street name.
///
/// Removes periods, expands abbreviations, lower-cases embedded linking
/// articles, trims non-word characters at both ends and collapses
/// whitespace. Applying it twice gives the same result as applying it once.
pub fn normalize_street_name(line: &str) -> String {
    let mut name = line.replace('.', "");

    for (pattern, full) in ABBREVIATIONS.iter() {
        name = pattern.replace_all(&name, *full).into_owned();
    }

    if let Some(article) = LINKING_ARTICLE.as_ref() {
        name = article
            .replace_all(&name, |caps: &Captures| {
                format!("{}{}", &caps[1], caps[2].to_lowercase())
            })
            .into_owned();
    }

    name.trim_matches(|c: char| !c.is_alphanumeric())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escaped alternation of literal phrases.
fn alternation(items: &[String]) -> String {
    items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("|")
}

/// Extracts the street list for one day from bulletin text.
#[derive(Debug, Clone)]
pub struct DayBlockParser {
    morning_labels: String,
    afternoon_labels: String,
    next_anchor: Regex,
    label_tokens: Regex,
    boilerplate: Option<Regex>,
    velocity_tail: Option<Regex>,
    speed_limit: Regex,
    stoplist: HashSet<String>,
}

impl DayBlockParser {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        let morning_labels = alternation(&config.morning_labels);
        let afternoon_labels = alternation(&config.afternoon_labels);
        let all_labels = format!("{morning_labels}|{afternoon_labels}");

        let boilerplate = alternation(&config.boilerplate);
        let velocity = alternation(&config.velocity_keywords);

        Ok(Self {
            next_anchor: Regex::new(&format!(
                r"(?mi)^[^\S\n]*{ANY_DAY}[^\S\n]+(?:{all_labels})\b"
            ))?,
            label_tokens: Regex::new(&format!(r"(?i)\b(?:{all_labels})\b"))?,
            boilerplate: if boilerplate.is_empty() {
                None
            } else {
                Some(Regex::new(&format!("(?i){boilerplate}"))?)
            },
            velocity_tail: if velocity.is_empty() {
                None
            } else {
                Some(Regex::new(&format!(r"(?i)\b(?:{velocity})\b.*$"))?)
            },
            speed_limit: Regex::new(r"\b\d{2,3}\b")?,
            stoplist: config
                .stoplist
                .iter()
                .map(|word| word.trim().to_lowercase())
                .collect(),
            morning_labels,
            afternoon_labels,
        })
    }

    fn labels(&self, shift: Shift) -> &str {
        match shift {
            Shift::Morning => &self.morning_labels,
            Shift::Afternoon => &self.afternoon_labels,
        }
    }

    /// The raw text of each shift block for `day`, morning first.
    ///
    /// A shift whose anchor line is absent yields no block.
    pub fn locate_blocks(&self, text: &str, day: u32) -> Result<Vec<DayBlock>> {
        let mut blocks = Vec::new();

        for shift in Shift::ALL {
            let anchor = Regex::new(&format!(
                r"(?mi)^[^\S\n]*0?{day}[^\S\n]+(?:{})\b",
                self.labels(shift)
            ))?;
            let Some(start) = anchor.find(text) else {
                log::debug!("No {} block for day {}", shift, day);
                continue;
            };

            // The rest of the anchor line belongs to the block; the next
            // anchor can only start on a following line.
            let rest = &text[start.end()..];
            let body_start = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
            let end = self
                .next_anchor
                .find(&rest[body_start..])
                .map(|next| body_start + next.start())
                .unwrap_or(rest.len());

            let raw_lines = rest[..end]
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect();

            blocks.push(DayBlock {
                day,
                shift,
                raw_lines,
            });
        }
        Ok(blocks)
    }

    /// Strip noise from one raw line, leaving candidate street text.
    fn clean_line(&self, line: &str) -> String {
        let mut line = line.to_string();
        if let Some(velocity) = &self.velocity_tail {
            line = velocity.replace(&line, "").into_owned();
        }
        if let Some(boilerplate) = &self.boilerplate {
            line = boilerplate.replace_all(&line, " ").into_owned();
        }
        line = self.label_tokens.replace_all(&line, " ").into_owned();
        line = self.speed_limit.replace_all(&line, " ").into_owned();
        line.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn is_header_noise(&self, line: &str) -> bool {
        let key = line
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        self.stoplist.contains(&key)
    }

    /// Normalized, deduplicated street mentions for `day`, both shifts combined.
    pub fn extract_mentions(&self, text: &str, day: u32) -> Result<Vec<StreetMention>> {
        let mut seen = HashSet::new();
        let mut mentions = Vec::new();

        for block in self.locate_blocks(text, day)? {
            for raw in &block.raw_lines {
                let cleaned = self.clean_line(raw);
                if cleaned.is_empty() || self.is_header_noise(&cleaned) {
                    continue;
                }
                let name = normalize_street_name(&cleaned);
                if !name.chars().any(char::is_alphabetic) || self.is_header_noise(&name) {
                    continue;
                }
                if seen.insert(name.clone()) {
                    mentions.push(StreetMention {
                        name,
                        source_line: raw.clone(),
                    });
                }
            }
        }

        log::info!("Day {}: {} street(s) found", day, mentions.len());
        Ok(mentions)
    }

    /// Street names for `day` in first-seen order.
    pub fn extract_streets(&self, text: &str, day: u32) -> Result<Vec<String>> {
        Ok(self
            .extract_mentions(text, day)?
            .into_iter()
            .map(|mention| mention.name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> DayBlockParser {
        DayBlockParser::new(&ParserConfig::default()).unwrap()
    }

    const BULLETIN: &str = "\
AYUNTAMIENTO DE LEÓN
POLICÍA LOCAL
DÍA TURNO UBICACIÓN
13 MAÑANA
Calle Ancha
13 TARDE
Avda. Mariano Andrés 50
14 MAÑANA Avda. Padre Isla
C/ La Corredera  velocidad máxima 50
Pza. de la Inmaculada
15 MAÑANA
Paseo de Salamanca
14 TARDE
Avenida Fernández Ladreda 40
Avda Padre Isla
";

    #[test]
    fn test_single_line_scenario() {
        let streets = parser()
            .extract_streets("14 morning\nAvenida Ordoño II\n30\n", 14)
            .unwrap();
        assert_eq!(streets, vec!["Avenida Ordoño II"]);
    }

    #[test]
    fn test_shifts_are_located_independently() {
        let streets = parser().extract_streets(BULLETIN, 14).unwrap();
        assert_eq!(
            streets,
            vec![
                "Avenida Padre Isla",
                "Calle La Corredera",
                "Plaza de la Inmaculada",
                "Avenida Fernández Ladreda",
            ]
        );
    }

    #[test]
    fn test_blocks_stop_at_next_anchor() {
        let blocks = parser().locate_blocks(BULLETIN, 13).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].shift, Shift::Morning);
        assert_eq!(blocks[0].raw_lines, vec!["Calle Ancha"]);
        assert_eq!(blocks[1].shift, Shift::Afternoon);
        assert_eq!(blocks[1].raw_lines, vec!["Avda. Mariano Andrés 50"]);
    }

    #[test]
    fn test_interleaved_anchor_line_does_not_end_block() {
        let text = "14 MAÑANA 14 TARDE\nCalle Ancha\nAvda. Padre Isla\n15 MAÑANA\nCalle Real\n";
        let blocks = parser().locate_blocks(text, 14).unwrap();
        assert_eq!(blocks[0].shift, Shift::Morning);
        assert_eq!(blocks[0].raw_lines, vec!["14 TARDE", "Calle Ancha", "Avda. Padre Isla"]);
        assert_eq!(
            parser().extract_streets(text, 14).unwrap(),
            vec!["Calle Ancha", "Avenida Padre Isla"]
        );
    }

    #[test]
    fn test_day_one_does_not_match_day_fourteen() {
        assert!(parser().locate_blocks(BULLETIN, 1).unwrap().is_empty());
        assert!(parser().extract_streets(BULLETIN, 1).unwrap().is_empty());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let parser = parser();
        let first = parser.extract_streets(BULLETIN, 14).unwrap();
        let second = parser.extract_streets(BULLETIN, 14).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_header_noise_is_dropped() {
        let text = "14 MAÑANA\nDía\nTurno:\nUbicación\nCalle Ancha\n";
        assert_eq!(parser().extract_streets(text, 14).unwrap(), vec!["Calle Ancha"]);
    }

    #[test]
    fn test_mentions_keep_source_line() {
        let mentions = parser()
            .extract_mentions("14 TARDE\nAvda. Padre Isla 50\n", 14)
            .unwrap();
        assert_eq!(mentions[0].name, "Avenida Padre Isla");
        assert_eq!(mentions[0].source_line, "Avda. Padre Isla 50");
    }

    #[test]
    fn test_normalize_expands_and_lowercases_articles() {
        assert_eq!(normalize_street_name("Avda. De La Facultad"), "Avenida de la Facultad");
        assert_eq!(normalize_street_name("C/Ancha"), "Calle Ancha");
        assert_eq!(normalize_street_name("Pº Del Parque"), "Paseo del Parque");
        assert_eq!(normalize_street_name("Ctra. De Los Cubos -"), "Carretera de los Cubos");
        assert_eq!(normalize_street_name("Gta.  Guzmán  el Bueno"), "Glorieta Guzmán el Bueno");
        assert_eq!(normalize_street_name("  (Pza. Mayor) "), "Plaza Mayor");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            "Avda. De La Facultad",
            "C/ Ancha",
            "Pº Del Parque",
            "Trva. Las Cercas",
            "Rda. Este",
            "  Avenida Ordoño II ",
            "Pl. San Marcelo",
        ] {
            let once = normalize_street_name(raw);
            assert_eq!(normalize_street_name(&once), once, "not idempotent: {raw}");
        }
    }
}
