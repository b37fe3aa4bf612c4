use std::path::Path;

use chrono::{Datelike, NaiveDate};

const SIZE_UNITS: [&str; 4] = ["Б", "КБ", "МБ", "ГБ"];

const MONTHS_GENITIVE: [&str; 12] = [
    "января", "февраля", "марта", "апреля", "мая", "июня",
    "июля", "августа", "сентября", "октября", "ноября", "декабря",
];

/// Greeting thresholds: the entry with the largest limit below the day count wins.
const DAY_GREETINGS: [(i64, &str, &str); 6] = [
    (0, "Только что с нами!", "🎉"),
    (1, "Уже целых", "✨"),
    (4, "Ого, мы", "🔥"),
    (11, "Вау, уже", "🌟"),
    (31, "Вот это да,", "🌟"),
    (91, "Давний пользователь!", "⚕"),
];

/// Extracts the file extension (with its dot) from a filename and converts it to lowercase.
pub fn get_file_extension(filename: &str) -> Option<String> {
    Path::new(filename) // treats string as filesystem path.
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

/// Byte count for people: at most three divisions by 1024, so anything
/// past gigabytes stays in `ГБ`.
pub fn human_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size > 1023.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{}{}", size.round_ties_even() as u64, SIZE_UNITS[unit])
}

/// Russian plural of "день" for `days`.
fn day_word(days: i64) -> &'static str {
    let (last, last_two) = (days % 10, days % 100);
    if last == 1 && last_two != 11 {
        "день"
    } else if (2..=4).contains(&last) && !(10..20).contains(&last_two) {
        "дня"
    } else {
        "дней"
    }
}

pub fn days_message(days: i64) -> String {
    let (_, message, emoji) = DAY_GREETINGS
        .iter()
        .rev()
        .find(|(limit, _, _)| days > *limit)
        .unwrap_or(&DAY_GREETINGS[0]);
    format!("{} {} {} вместе {}", message, days, day_word(days), emoji)
}

/// `05 марта 2024 г.`
pub fn ru_date(date: NaiveDate) -> String {
    format!(
        "{:02} {} {} г.",
        date.day(),
        MONTHS_GENITIVE[date.month0() as usize],
        date.year()
    )
}
