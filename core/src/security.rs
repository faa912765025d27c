//! Input checks and masking for values a front end shows or sends.

use crate::models::AiProvider;
use serde::Serialize;
use url::Url;

/// Show only the ends of an API key, e.g. `sk-a***...***wxyz`.
pub fn mask_api_key(key: &str, prefix_len: usize, suffix_len: usize) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= prefix_len + suffix_len {
        return "***".to_string();
    }
    let prefix: String = chars[..prefix_len].iter().collect();
    let suffix: String = chars[chars.len() - suffix_len..].iter().collect();
    format!("{prefix}***...***{suffix}")
}

pub fn validate_api_key(key: &str, provider: AiProvider) -> bool {
    if key.trim().is_empty() {
        return false;
    }
    let len = key.chars().count();
    match provider {
        AiProvider::OpenAi => key.starts_with("sk-") && len >= 20,
        AiProvider::DeepSeek => len >= 20,
        AiProvider::Custom => len >= 10,
    }
}

/// Only http and https URLs are accepted as API endpoints.
pub fn is_safe_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordCheck {
    pub strength: PasswordStrength,
    pub message: &'static str,
    pub is_valid: bool,
}

pub fn validate_password_strength(password: &str) -> PasswordCheck {
    let len = password.chars().count();
    if len < 8 {
        return PasswordCheck {
            strength: PasswordStrength::Weak,
            message: "Password must be at least 8 characters",
            is_valid: false,
        };
    }

    let checks = [
        len >= 12,
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ];
    let score = checks.iter().filter(|passed| **passed).count();

    match score {
        0..=2 => PasswordCheck {
            strength: PasswordStrength::Weak,
            message: "Password is weak. Add uppercase, numbers, or symbols",
            is_valid: false,
        },
        3 | 4 => PasswordCheck {
            strength: PasswordStrength::Medium,
            message: "Password strength is medium",
            is_valid: true,
        },
        _ => PasswordCheck {
            strength: PasswordStrength::Strong,
            message: "Password is strong",
            is_valid: true,
        },
    }
}
