//! Field checks that the JSON shape alone can't express. Failures are 422.

use crate::error::ApiError;

pub const LOGIN_LEN: (usize, usize) = (3, 50);
pub const PASSWORD_LEN: (usize, usize) = (8, 100);
pub const TITLE_LEN: (usize, usize) = (1, 200);
pub const DESCRIPTION_MAX: usize = 1000;
pub const STICKER_TEXT_MAX: usize = 5000;
pub const STICKER_SIZE: (f64, f64) = (50.0, 1000.0);

fn length(field: &str, value: &str, (min, max): (usize, usize)) -> Result<(), ApiError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ApiError::Validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

pub fn login(value: &str) -> Result<(), ApiError> {
    length("login", value, LOGIN_LEN)
}

pub fn password(value: &str) -> Result<(), ApiError> {
    length("password", value, PASSWORD_LEN)
}

pub fn title(value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation("title must not be blank".into()));
    }
    length("title", value, TITLE_LEN)
}

pub fn description(value: &str) -> Result<(), ApiError> {
    length("description", value, (0, DESCRIPTION_MAX))
}

pub fn sticker_text(value: &str) -> Result<(), ApiError> {
    length("text", value, (0, STICKER_TEXT_MAX))
}

/// `#RRGGBB`, either case.
pub fn hex_color(field: &str, value: &str) -> Result<(), ApiError> {
    let valid = value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(ApiError::Validation(format!(
            "{field} must be a hex color like #FFEB3B"
        )));
    }
    Ok(())
}

pub fn sticker_size(field: &str, value: f64) -> Result<(), ApiError> {
    let (min, max) = STICKER_SIZE;
    if !(min..=max).contains(&value) {
        return Err(ApiError::Validation(format!(
            "{field} must be between {min} and {max}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_bounds() {
        assert!(login("ab").is_err());
        assert!(login("abc").is_ok());
        assert!(login(&"x".repeat(50)).is_ok());
        assert!(login(&"x".repeat(51)).is_err());
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        assert!(login("жук").is_ok());
        assert!(title(&"я".repeat(200)).is_ok());
    }

    #[test]
    fn blank_title_rejected() {
        assert!(title("").is_err());
        assert!(title("   ").is_err());
    }

    #[test]
    fn colors() {
        assert!(hex_color("color", "#FFEB3B").is_ok());
        assert!(hex_color("color", "#ffeb3b").is_ok());
        assert!(hex_color("color", "FFEB3B").is_err());
        assert!(hex_color("color", "#FFEB3").is_err());
        assert!(hex_color("color", "#GGGGGG").is_err());
        assert!(hex_color("color", "#ЖЖЖ").is_err());
    }

    #[test]
    fn sticker_sizes() {
        assert!(sticker_size("width", 49.9).is_err());
        assert!(sticker_size("width", 50.0).is_ok());
        assert!(sticker_size("height", 1000.0).is_ok());
        assert!(sticker_size("height", 1000.5).is_err());
    }
}
