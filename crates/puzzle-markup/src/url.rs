use thiserror::Error;

/// First year puzzles were published.
pub const FIRST_YEAR: u16 = 2015;
pub const LAST_DAY: u8 = 25;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("day {0} is outside 1..={LAST_DAY}")]
    Day(u8),
    #[error("year {0} predates {FIRST_YEAR}")]
    Year(u16),
}

/// Page address of a puzzle, e.g. `https://adventofcode.com/2017/day/5`.
pub fn puzzle_url(base_url: &str, year: u16, day: u8) -> Result<String, UrlError> {
    if !(1..=LAST_DAY).contains(&day) {
        return Err(UrlError::Day(day));
    }
    if year < FIRST_YEAR {
        return Err(UrlError::Year(year));
    }
    Ok(format!("{}/{year}/day/{day}", base_url.trim_end_matches('/')))
}
