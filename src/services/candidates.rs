//! Name candidates for map lookups.
//!
//! Bulletin names rarely match the map's canonical name verbatim
//! ("Corredera" vs "Calle de la Corredera"). Candidates are built by
//! stripping the street type and leading articles to get a core name, then
//! recombining the core with every street-type head and linking article.

use crate::models::StreetAlias;
use crate::utils::dedup_preserving_order;

/// Street types removed when deriving core names.
const TYPE_PREFIXES: [&str; 10] = [
    "calle",
    "avenida",
    "paseo",
    "plaza",
    "glorieta",
    "ronda",
    "carretera",
    "travesía",
    "travesia",
    "camino",
];

/// Heads recombined with each core; the empty head keeps the bare core.
pub const HEADS: [&str; 6] = ["", "Calle", "Avenida", "Paseo", "Plaza", "Glorieta"];

/// Linking articles placed between head and core.
pub const LINKERS: [&str; 6] = ["", "de", "del", "de la", "de los", "de las"];

const LINKING_ARTICLES: [&str; 5] = ["de las", "de los", "de la", "del", "de"];
const ARTICLES: [&str; 4] = ["las", "los", "la", "el"];

/// Remove `prefix` (a whole word or phrase) from the start of `name`.
fn strip_word_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let head = name.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) && head.to_lowercase() != prefix {
        return None;
    }
    let rest = &name[prefix.len()..];
    rest.starts_with(char::is_whitespace)
        .then(|| rest.trim_start())
        .filter(|rest| !rest.is_empty())
}

fn strip_any<'a>(name: &'a str, prefixes: &[&str]) -> &'a str {
    prefixes
        .iter()
        .find_map(|prefix| strip_word_prefix(name, prefix))
        .unwrap_or(name)
}

/// Up to three core variants: without street type, then also without the
/// linking article, then also without the leading article.
pub fn core_variants(name: &str) -> Vec<String> {
    let name = name.trim();
    let without_type = strip_any(name, &TYPE_PREFIXES);
    let without_linker = strip_any(without_type, &LINKING_ARTICLES);
    let without_article = strip_any(without_linker, &ARTICLES);

    dedup_preserving_order(
        [without_type, without_linker, without_article]
            .into_iter()
            .filter(|core| !core.is_empty())
            .map(String::from),
    )
}

/// Curated alternative spellings for `name` (matched case-insensitively in
/// either direction).
pub fn aliases_for(name: &str, aliases: &[StreetAlias]) -> Vec<String> {
    let key = name.trim().to_lowercase();
    let mut out = Vec::new();
    for alias in aliases {
        let names = std::iter::once(&alias.name).chain(alias.aliases.iter());
        if names.clone().any(|n| n.to_lowercase() == key) {
            out.extend(names.cloned());
        }
    }
    out
}

/// Every candidate for `name`, most specific first.
///
/// The unmodified input always comes first, followed by curated aliases
/// and then each core crossed with [`HEADS`] and [`LINKERS`].
pub fn generate_candidates(name: &str, aliases: &[StreetAlias]) -> Vec<String> {
    let name = name.trim();
    let mut candidates = vec![name.to_string()];
    candidates.extend(aliases_for(name, aliases));

    for core in core_variants(name) {
        for head in HEADS {
            for linker in LINKERS {
                let joined = [head, linker, core.as_str()]
                    .into_iter()
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                candidates.push(joined);
            }
        }
    }

    dedup_preserving_order(candidates.into_iter().filter(|c| !c.is_empty()))
}
