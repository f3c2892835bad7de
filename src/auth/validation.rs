/// Username: 3-50 chars of letters, digits, `_`, `.` or `-`.
pub fn validate_username_format(username: &str) -> Result<(), String> {
    if username.len() < 3 {
        return Err("Username must be at least 3 characters".to_string());
    }
    if username.len() > 50 {
        return Err("Username must be at most 50 characters".to_string());
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        return Err("Username can only contain letters, numbers, '_', '.' and '-'".to_string());
    }
    Ok(())
}

pub fn validate_email_format(email: &str) -> Result<(), String> {
    if email.len() > 254 {
        return Err("Email address is too long".to_string());
    }
    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| "Email address must contain '@'".to_string())?;

    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return Err("Invalid email address".to_string());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err("Email domain is invalid".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert!(validate_username_format("alice_01").is_ok());
        assert!(validate_username_format("a.b-c").is_ok());
        assert!(validate_username_format("ab").is_err());
        assert!(validate_username_format("has space").is_err());
        assert!(validate_username_format(&"x".repeat(51)).is_err());
    }

    #[test]
    fn emails() {
        assert!(validate_email_format("alice@example.com").is_ok());
        assert!(validate_email_format("alice@localhost").is_err());
        assert!(validate_email_format("@example.com").is_err());
        assert!(validate_email_format("a@b@example.com").is_err());
        assert!(validate_email_format("alice@.com").is_err());
        assert!(validate_email_format("alice example.com").is_err());
    }
}
