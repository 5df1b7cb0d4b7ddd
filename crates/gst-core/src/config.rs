/// Trait for loading service configuration from environment variables.
///
/// Implementors derive `serde::Deserialize` (with `#[serde(default = ...)]` for
/// optional values) and call `Config::from_env()` once at startup.
///
/// # Panics
///
/// Panics if any required env var is missing or cannot be deserialized.
pub trait Config: Sized + serde::de::DeserializeOwned {
    fn from_env() -> Self {
        envy::from_env().expect("failed to load config from environment")
    }

    /// Load from an explicit list of `(KEY, value)` pairs instead of the process environment.
    fn from_pairs<I>(pairs: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(pairs)
    }
}
