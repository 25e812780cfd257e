use core::fmt;
use std::collections::HashMap;

/// Header mapping for a single request. Keys are kept case-sensitive exactly
/// as received; a duplicated key is last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct Headers(HashMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, k: &str, v: &str) -> Option<String> {
        self.0.insert(k.to_string(), v.to_string())
    }

    pub fn get(&self, k: &str) -> Option<&str> {
        self.0.get(k).map(String::as_str)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Splits a raw header line on the first ':', trimming whitespace around
    /// both key and value. A line with no colon is malformed and yields
    /// `None` rather than an error; the caller skips it.
    pub fn parse_line(line: &str) -> Option<(String, String)> {
        let (key, value) = line.split_once(':')?;
        Some((key.trim().to_string(), value.trim().to_string()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.0
                .iter()
                .map(|(k, v)| format!("{}: {}\r\n", k, v))
                .collect::<String>()
        )
    }
}
