//! Security policy engine: password strength rules, input sanitization,
//! secure token generation, and the key namespaces used in the volatile
//! store.

use rand::RngCore;
use serde_json::Value;
use uuid::Uuid;

/// Special characters accepted by the password policy.
const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Minimum zxcvbn score (0-4) a password must reach.
const MIN_STRENGTH_SCORE: u8 = 3;

/// Outcome of a password strength check. All failing rules are reported
/// together so the client can render the full list.
#[derive(Debug, Clone)]
pub struct PasswordStrength {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub score: u8,
}

pub fn validate_password_strength(password: &str) -> PasswordStrength {
    let mut errors = Vec::new();
    let length = password.chars().count();

    if length < 8 {
        errors.push("Password must be at least 8 characters long".to_string());
    }
    if length > 128 {
        errors.push("Password must be less than 128 characters".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least one number".to_string());
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        errors.push("Password must contain at least one special character".to_string());
    }

    let score = zxcvbn::zxcvbn(password, &[])
        .map(|entropy| entropy.score())
        .unwrap_or(0);
    if score < MIN_STRENGTH_SCORE {
        errors.push(
            "Password is too weak - avoid common patterns and use a unique password".to_string(),
        );
    }

    PasswordStrength {
        is_valid: errors.is_empty(),
        errors,
        score,
    }
}

/// HTML-entity-encode characters that could carry injected markup.
pub fn sanitize_input(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}

/// Recursively sanitize every string leaf of a JSON value, preserving
/// structure.
pub fn sanitize_object(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_input(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_object).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, sanitize_object(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Generate a hex-encoded token from `byte_len` bytes of OS randomness.
pub fn generate_secure_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// Key namespaces. Per-user keys enforce a single outstanding entry per
// purpose; `…:token:` keys are the reverse index used for O(1) lookup of
// the owning user when a one-time token is presented.

pub fn login_attempts_key(identifier: &str) -> String {
    format!("login_attempts:{identifier}")
}

pub fn account_lockout_key(user_id: Uuid) -> String {
    format!("account_lockout:{user_id}")
}

pub fn email_verification_key(user_id: Uuid) -> String {
    format!("email_verification:{user_id}")
}

pub fn verification_token_key(token: &str) -> String {
    format!("email_verification:token:{token}")
}

pub fn password_reset_key(user_id: Uuid) -> String {
    format!("password_reset:{user_id}")
}

pub fn reset_token_key(token: &str) -> String {
    format!("password_reset:token:{token}")
}

pub fn account_unlock_key(user_id: Uuid) -> String {
    format!("account_unlock:{user_id}")
}

pub fn unlock_token_key(token: &str) -> String {
    format!("account_unlock:token:{token}")
}

pub fn refresh_token_key(user_id: Uuid) -> String {
    format!("refresh_token:{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_password_reports_every_failed_rule() {
        let result = validate_password_strength("short");
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("at least 8")));
        assert!(result.errors.iter().any(|e| e.contains("uppercase")));
        assert!(result.errors.iter().any(|e| e.contains("number")));
        assert!(result.errors.iter().any(|e| e.contains("special character")));
        assert!(result.errors.iter().any(|e| e.contains("too weak")));
    }

    #[test]
    fn common_pattern_fails_even_with_all_char_classes() {
        // Satisfies every character-class rule but is a dictionary pattern.
        let result = validate_password_strength("Password1!");
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("too weak")));
    }

    #[test]
    fn strong_password_passes() {
        let result = validate_password_strength("V3lvet!Quokka#2024");
        assert!(result.is_valid, "errors: {:?}", result.errors);
        assert!(result.score >= 3);
    }

    #[test]
    fn overlong_password_rejected() {
        let long = format!("Aa1!{}", "x".repeat(130));
        let result = validate_password_strength(&long);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("less than 128")));
    }

    #[test]
    fn sanitize_input_encodes_markup() {
        assert_eq!(
            sanitize_input(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;&#x2F;script&gt;"
        );
        assert_eq!(sanitize_input("a & b / c'"), "a &amp; b &#x2F; c&#039;");
    }

    #[test]
    fn sanitize_object_recurses_and_preserves_structure() {
        let input = json!({
            "title": "<b>hi</b>",
            "steps": ["click <here>", 2, {"note": "a & b"}],
            "count": 3
        });
        let expected = json!({
            "title": "&lt;b&gt;hi&lt;&#x2F;b&gt;",
            "steps": ["click &lt;here&gt;", 2, {"note": "a &amp; b"}],
            "count": 3
        });
        assert_eq!(sanitize_object(input), expected);
    }

    #[test]
    fn secure_tokens_are_hex_and_unique() {
        let a = generate_secure_token(32);
        let b = generate_secure_token(32);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn key_namespaces_do_not_collide() {
        let id = Uuid::new_v4();
        let keys = [
            login_attempts_key(&id.to_string()),
            account_lockout_key(id),
            email_verification_key(id),
            password_reset_key(id),
            account_unlock_key(id),
            refresh_token_key(id),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
