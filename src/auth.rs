use std::borrow::Cow;
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors};

/// Per-field problems found before any login request is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginErrors {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LoginErrors {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none()
    }
}

#[derive(Debug, Validate)]
pub struct LoginForm {
    #[validate(
        length(min = 3, message = "El usuario debe tener al menos 3 caracteres"),
        custom(function = "email_when_at_sign")
    )]
    pub username: String,
    #[validate(
        length(min = 6, message = "La contraseña debe tener al menos 6 caracteres"),
        custom(function = "has_uppercase"),
        custom(function = "has_digit")
    )]
    pub password: String,
}

// Only the first failing rule of each field is shown, in this order.
const USERNAME_RULES: [&str; 2] = ["length", "email"];
const PASSWORD_RULES: [&str; 3] = ["length", "uppercase", "digit"];

impl LoginForm {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.trim().to_string(),
            password: password.to_string(),
        }
    }
}

pub fn validate_login(username: &str, password: &str) -> Result<(), LoginErrors> {
    LoginForm::new(username, password)
        .validate()
        .map_err(|errors| LoginErrors {
            username: first_failure(&errors, "username", &USERNAME_RULES),
            password: first_failure(&errors, "password", &PASSWORD_RULES),
        })
}

fn first_failure(errors: &ValidationErrors, field: &str, rules: &[&str]) -> Option<String> {
    let field_errors = errors.field_errors();
    let failed = field_errors.get(field)?;
    rules
        .iter()
        .find_map(|rule| failed.iter().find(|e| e.code == *rule))
        .or_else(|| failed.first())
        .map(|e| {
            e.message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| e.code.to_string())
        })
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn email_when_at_sign(value: &str) -> Result<(), ValidationError> {
    if value.contains('@') && !is_valid_email(value) {
        return Err(rule("email", "Formato de email inválido"));
    }
    Ok(())
}

fn has_uppercase(value: &str) -> Result<(), ValidationError> {
    if value.chars().any(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(rule("uppercase", "Debe incluir al menos una mayúscula"))
    }
}

fn has_digit(value: &str) -> Result<(), ValidationError> {
    if value.chars().any(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(rule("digit", "Debe incluir al menos un número"))
    }
}

/// `local@domain.tld`: a valid address with a dot that has text on both
/// sides somewhere in the domain.
pub fn is_valid_email(value: &str) -> bool {
    if !value.validate_email() {
        return false;
    }
    let Some((_, domain)) = value.rsplit_once('@') else {
        return false;
    };
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_credentials() {
        assert!(validate_login("1001", "Esumer2025").is_ok());
        assert!(validate_login("  ana@fundacion.org ", "Clave123").is_ok());
    }

    #[test]
    fn test_username_rules() {
        let errors = validate_login("ab", "Clave123").unwrap_err();
        assert!(errors.username.unwrap().contains("3 caracteres"));
        assert!(errors.password.is_none());

        let errors = validate_login("ana@fundacion", "Clave123").unwrap_err();
        assert_eq!(errors.username.as_deref(), Some("Formato de email inválido"));
    }

    #[test]
    fn test_short_username_wins_over_email_shape() {
        let errors = validate_login("a@", "Clave123").unwrap_err();
        assert!(errors.username.unwrap().contains("3 caracteres"));
    }

    #[test]
    fn test_username_is_trimmed_before_length_check() {
        let errors = validate_login("  ab  ", "Clave123").unwrap_err();
        assert!(errors.username.is_some());
    }

    #[test]
    fn test_password_rules_report_first_failure() {
        let check = |pw: &str| validate_login("admin", pw).unwrap_err().password.unwrap();

        assert!(check("Ab1").contains("6 caracteres"));
        assert!(check("abc").contains("6 caracteres"));
        assert!(check("clave123").contains("mayúscula"));
        assert!(check("clavesegura").contains("mayúscula"));
        assert!(check("ClaveSegura").contains("número"));
    }

    #[test]
    fn test_both_fields_reported() {
        let errors = validate_login("", "").unwrap_err();
        assert!(errors.username.is_some());
        assert!(errors.password.is_some());
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b."));
        assert!(!is_valid_email("a@.co"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.co"));
        assert!(!is_valid_email("a@b@c.co"));
        assert!(!is_valid_email("a@localhost"));
    }
}
