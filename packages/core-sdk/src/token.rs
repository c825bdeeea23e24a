use once_cell::sync::Lazy;
use regex::Regex;

static ENV_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\$\{([A-Za-z0-9_]+)\}|\$([A-Za-z0-9_]+)|\{([A-Za-z0-9_]+)\}|env:([A-Za-z0-9_]+))$")
        .expect("env reference pattern is valid")
});

/**
 * \brief Name of the environment variable a token refers to, if it is a reference.
 * \details Recognized forms: `${NAME}`, `$NAME`, `{NAME}`, `env:NAME`.
 */
pub fn env_reference(raw: &str) -> Option<&str> {
    let caps = ENV_REFERENCE.captures(raw.trim())?;
    caps.iter()
        .skip(1)
        .flatten()
        .next()
        .map(|m| m.as_str())
}

/**
 * \brief Resolve a provider token against the process environment.
 * \return the variable's value for references (empty when unset), the trimmed literal otherwise.
 */
pub fn resolve_token(raw: &str) -> String {
    resolve_token_with(raw, |name| std::env::var(name).ok())
}

pub fn resolve_token_with<F>(raw: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match env_reference(raw) {
        Some(name) => lookup(name).unwrap_or_default(),
        None => raw.trim().to_string(),
    }
}
