//! Input rules for usernames and passwords.

const MAX_USERNAME_LENGTH: usize = 13;
const MAX_PASSWORD_LENGTH: usize = 30;
const PASSWORD_SYMBOLS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?";

/// Usernames are numeric account ids, at most 13 digits.
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.is_empty() {
        return Err("Username cannot be empty");
    }
    if !username.chars().all(|c| c.is_ascii_digit()) {
        return Err("Username must contain only digits");
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err("Username cannot be longer than 13 digits");
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.is_empty() {
        return Err("Password cannot be empty");
    }
    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err("Password cannot be longer than 30 characters");
    }

    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_symbol = password.chars().any(|c| PASSWORD_SYMBOLS.contains(c));

    if !(has_digit && has_letter && has_symbol) {
        return Err("Password must contain a digit, a letter and a symbol");
    }
    Ok(())
}
