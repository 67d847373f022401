use anyhow::{anyhow, Result};

pub fn infer<K, R>(key: K) -> Result<R>
where
    K: AsRef<str>,
    R: ::core::str::FromStr,
    <R as ::core::str::FromStr>::Err: 'static + Send + Sync + ::core::fmt::Display,
{
    let key = key.as_ref();

    infer_string(key).and_then(|e| parse(key, &e))
}

/// Parses the environment variable `key`, or returns `default` if it is unset.
///
/// A variable that is set but cannot be parsed is still an error.
pub fn infer_or<K, R>(key: K, default: R) -> Result<R>
where
    K: AsRef<str>,
    R: ::core::str::FromStr,
    <R as ::core::str::FromStr>::Err: 'static + Send + Sync + ::core::fmt::Display,
{
    let key = key.as_ref();

    match ::std::env::var(key) {
        Ok(value) => parse(key, &value),
        Err(_) => Ok(default),
    }
}

pub fn infer_string<K>(key: K) -> Result<String>
where
    K: AsRef<str>,
{
    let key = key.as_ref();

    ::std::env::var(key).map_err(|_| anyhow!("failed to find the environment variable: {key}"))
}

fn parse<R>(key: &str, value: &str) -> Result<R>
where
    R: ::core::str::FromStr,
    <R as ::core::str::FromStr>::Err: 'static + Send + Sync + ::core::fmt::Display,
{
    value
        .parse()
        .map_err(|error| anyhow!("failed to parse the environment variable ({key}): {error}"))
}
