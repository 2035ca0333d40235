//! Glob-style ignore patterns for repository files.
//!
//! Patterns use `*` (any run of characters, including `/`) and `?` (one
//! character). They are matched against the repository-relative file name,
//! e.g. `*.ckpt` excludes `v2-1_768-ema-pruned.ckpt` and
//! `unet/diffusion_pytorch_model.ckpt`.

use regex::Regex;

/// Redundant checkpoint formats skipped by default.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &["*.ckpt"];

#[derive(Debug, Clone)]
pub struct IgnorePatterns {
    patterns: Vec<String>,
    compiled: Vec<Regex>,
}

impl IgnorePatterns {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let compiled = patterns
            .iter()
            .map(|pattern| Regex::new(&glob_to_regex(pattern)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns, compiled })
    }

    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
            compiled: Vec::new(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_ignored(&self, relative_path: &str) -> bool {
        let normalized = relative_path.replace('\\', "/");
        self.compiled.iter().any(|re| re.is_match(&normalized))
    }
}

impl Default for IgnorePatterns {
    fn default() -> Self {
        // The default set is a compile-time constant of valid globs.
        Self::new(DEFAULT_IGNORE_PATTERNS.iter().copied()).unwrap_or_else(|_| Self::none())
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}
