use std::path::{Component, Path};

use super::error::MalformedStoragePath;

/// Remote object key for a file in the media tree: `YYYY/MM/DD/<basename>`.
///
/// The date is taken from the last `YYYY/MM/DD` directory run in `path`.
pub fn remote_key(path: &Path) -> Result<String, MalformedStoragePath> {
    let malformed = || MalformedStoragePath {
        path: path.to_string_lossy().into_owned(),
    };

    let parts = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_str()),
            _ => None,
        })
        .collect::<Option<Vec<&str>>>()
        .ok_or_else(malformed)?;

    let (basename, dirs) = parts.split_last().ok_or_else(malformed)?;

    let date = dirs
        .windows(3)
        .rev()
        .find(|w| is_date_run(w[0], w[1], w[2]))
        .ok_or_else(malformed)?;

    Ok(format!("{}/{}/{}/{}", date[0], date[1], date[2], basename))
}

fn is_date_run(year: &str, month: &str, day: &str) -> bool {
    fixed_digits(year, 4) && fixed_digits(month, 2) && fixed_digits(day, 2)
}

fn fixed_digits(s: &str, width: usize) -> bool {
    s.len() == width && s.bytes().all(|b| b.is_ascii_digit())
}
