//! Calendar helpers for Spanish bulletin naming.

use chrono::{Datelike, NaiveDate};

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Lower-case Spanish month name for a 1-based month.
pub fn month_name_es(month: u32) -> &'static str {
    let index = month.clamp(1, 12) as usize - 1;
    MONTHS_ES[index]
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `(year, month)` pairs starting at `today`'s month and going back.
pub fn months_back(today: NaiveDate, count: u32) -> Vec<(i32, u32)> {
    let mut year = today.year();
    let mut month = today.month();
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push((year, month));
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    out
}

/// Fill a filename template.
///
/// Placeholders: `{mes}`, `{Mes}`, `{MES}` (Spanish month name in lower,
/// capitalised and upper case), `{yyyy}`, `{yy}`, `{mm}`.
pub fn render_template(template: &str, year: i32, month: u32) -> String {
    let name = month_name_es(month);
    template
        .replace("{mes}", name)
        .replace("{Mes}", &capitalize(name))
        .replace("{MES}", &name.to_uppercase())
        .replace("{yyyy}", &format!("{year:04}"))
        .replace("{yy}", &format!("{:02}", year.rem_euclid(100)))
        .replace("{mm}", &format!("{month:02}"))
}
