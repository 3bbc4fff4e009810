//! Diacritic-tolerant name patterns.
//!
//! Bulletin names are typed by hand and frequently drop or misplace
//! accents, while map names carry them correctly. [`tolerant_pattern`]
//! compiles a name into a regular expression in which every letter accepts
//! its accented and upper/lower-case variants.
//!
//! ## Escaping rules
//!
//! - Letters with Spanish/Latin accent variants (`a e i o u n c`) become a
//!   bracket class listing every variant in both cases, e.g. `e` becomes
//!   `[eéèëêEÉÈËÊ]`. An accented input letter is folded first, so `é`
//!   produces the same class as `e`.
//! - Other ASCII letters become a two-case class, e.g. `[lL]`.
//! - Runs of whitespace become ` +`.
//! - The ERE metacharacters `\ . + * ? ( ) | [ ] { } ^ $` are escaped with
//!   a backslash.
//! - Everything else (digits, `-`, `'`, `,`, non-Latin letters) is copied
//!   as is.
//! - The result is anchored with `^` and `$`.
//!
//! The output is valid both as a POSIX extended regular expression (what
//! the geocoding backend evaluates) and for the `regex` crate. To embed it
//! in a query string literal, pass it through [`ql_string`].

/// Accent variants per base letter, lower case first.
const VARIANTS: [(char, &str); 7] = [
    ('a', "aáàäâAÁÀÄÂ"),
    ('e', "eéèëêEÉÈËÊ"),
    ('i', "iíìïîIÍÌÏÎ"),
    ('o', "oóòöôOÓÒÖÔ"),
    ('u', "uúùüûUÚÙÜÛ"),
    ('n', "nñNÑ"),
    ('c', "cçCÇ"),
];

const METACHARACTERS: &str = "\\.+*?()|[]{}^$";

/// Base letter of an accented Latin letter, lower-cased.
pub fn fold(c: char) -> char {
    let lower = c.to_lowercase().next().unwrap_or(c);
    VARIANTS
        .iter()
        .find(|(_, variants)| variants.contains(lower))
        .map(|(base, _)| *base)
        .unwrap_or(lower)
}

/// Compile a street name into an anchored, accent-tolerant pattern.
pub fn tolerant_pattern(name: &str) -> String {
    let mut pattern = String::from("^");
    let mut in_space = false;

    for c in name.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                pattern.push_str(" +");
                in_space = true;
            }
            continue;
        }
        in_space = false;

        let base = fold(c);
        if let Some((_, variants)) = VARIANTS.iter().find(|(b, _)| *b == base) {
            pattern.push('[');
            pattern.push_str(variants);
            pattern.push(']');
        } else if base.is_ascii_alphabetic() {
            pattern.push('[');
            pattern.push(base);
            pattern.push(base.to_ascii_uppercase());
            pattern.push(']');
        } else if METACHARACTERS.contains(c) {
            pattern.push('\\');
            pattern.push(c);
        } else {
            pattern.push(c);
        }
    }

    pattern.push('$');
    pattern
}

/// Quote a value as an Overpass QL string literal body (without the
/// surrounding quotes): backslashes and double quotes are escaped.
pub fn ql_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}
