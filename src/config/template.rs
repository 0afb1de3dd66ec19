//! Text expansion applied to every source before it is parsed.
//!
//! References:
//! - `${env:NAME}`: environment variable
//! - `${arg:NAME}`: value of `--NAME=value`, `--NAME value`, or the same with a single dash
//! - `${hasarg:NAME}`: `true` when the flag is present at all, `false` otherwise
//! - `${file:PATH}`: contents of a file
//!
//! Append `:-fallback` to use a fallback when the value is missing or empty.
//! Use `$$` to escape a literal `$` (e.g., `$${VAR}` becomes `${VAR}`).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TemplateError {
    #[error("undefined template variable: {0}")]
    UndefinedVariable(String),

    #[error("invalid template reference: {0}")]
    InvalidReference(String),

    #[error("unclosed reference (missing '}}')")]
    UnclosedReference,

    #[error("failed to read referenced file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Expander {
    args: Vec<String>,
}

impl Expander {
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }

    /// Uses the arguments of the running process, program name excluded.
    pub fn from_process() -> Self {
        Self::new(std::env::args().skip(1).collect())
    }

    /// Expands all `${...}` references in `text`.
    pub fn expand(&self, text: &str) -> Result<String, TemplateError> {
        let mut result = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch != '$' {
                result.push(ch);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                Some('{') => {
                    chars.next();
                    let reference =
                        consume_until(&mut chars, '}').ok_or(TemplateError::UnclosedReference)?;
                    result.push_str(&self.lookup(&reference)?);
                }
                _ => result.push('$'),
            }
        }

        Ok(result)
    }

    fn lookup(&self, reference: &str) -> Result<String, TemplateError> {
        let (variable, fallback) = match reference.split_once(":-") {
            Some((variable, fallback)) => (variable, Some(fallback)),
            None => (reference, None),
        };

        let value = match variable.split_once(':') {
            Some(("env", name)) if !name.is_empty() => std::env::var(name).ok(),
            Some(("arg", name)) if !name.is_empty() => self.arg(name).map(str::to_string),
            Some(("hasarg", name)) if !name.is_empty() => Some(self.has_arg(name).to_string()),
            Some(("file", path)) if !path.is_empty() => Some(read_file(path)?),
            _ => return Err(TemplateError::InvalidReference(reference.to_string())),
        };

        match (value, fallback) {
            (Some(value), _) if !value.is_empty() => Ok(value),
            (_, Some(fallback)) => Ok(fallback.to_string()),
            _ => Err(TemplateError::UndefinedVariable(variable.to_string())),
        }
    }

    fn arg(&self, name: &str) -> Option<&str> {
        let mut args = self.args.iter();
        while let Some(arg) = args.next() {
            let Some(flag) = flag(arg) else {
                continue;
            };
            match flag.split_once('=') {
                Some((key, value)) if key == name => return Some(value),
                None if flag == name => {
                    return args
                        .next()
                        .map(String::as_str)
                        .filter(|value| self::flag(value).is_none());
                }
                _ => {}
            }
        }
        None
    }

    fn has_arg(&self, name: &str) -> bool {
        self.args
            .iter()
            .filter_map(|arg| flag(arg))
            .any(|flag| flag.split_once('=').map_or(flag, |(key, _)| key) == name)
    }
}

/// Strips the leading `--` or `-` of a command-line flag.
fn flag(arg: &str) -> Option<&str> {
    arg.strip_prefix("--")
        .or_else(|| arg.strip_prefix('-'))
        .filter(|flag| !flag.is_empty())
}

fn read_file(path: &str) -> Result<String, TemplateError> {
    std::fs::read_to_string(path).map_err(|source| TemplateError::FileRead {
        path: PathBuf::from(path),
        source,
    })
}

/// Consumes characters until the delimiter, returning the collected string.
fn consume_until(chars: &mut std::iter::Peekable<std::str::Chars>, delim: char) -> Option<String> {
    let mut result = String::new();
    for ch in chars.by_ref() {
        if ch == delim {
            return Some(result);
        }
        result.push(ch);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Expander {
        Expander::new(list.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_plain_text_unchanged() {
        let text = "name = \"plain\"\nprice = \"5$\"";
        assert_eq!(Expander::default().expand(text).unwrap(), text);
    }

    #[test]
    fn test_env_reference() {
        std::env::set_var("CFG_OVERLAY_TEST_HOST", "db.internal");
        let out = Expander::default()
            .expand("host = \"${env:CFG_OVERLAY_TEST_HOST}\"")
            .unwrap();
        assert_eq!(out, "host = \"db.internal\"");
    }

    #[test]
    fn test_arg_reference() {
        let expander = args(&["--pass=bogus", "--user", "admin", "positional"]);
        assert_eq!(expander.expand("${arg:pass}").unwrap(), "bogus");
        assert_eq!(expander.expand("${arg:user}").unwrap(), "admin");
    }

    #[test]
    fn test_single_dash_flags() {
        let expander = args(&["-param0", "paramVal0", "-mode=fast"]);
        assert_eq!(expander.expand("${arg:param0}").unwrap(), "paramVal0");
        assert_eq!(expander.expand("${arg:mode}").unwrap(), "fast");
    }

    #[test]
    fn test_has_arg() {
        let expander = args(&["--param0", "-level=3"]);
        assert_eq!(expander.expand("${hasarg:param0}").unwrap(), "true");
        assert_eq!(expander.expand("${hasarg:level}").unwrap(), "true");
        assert_eq!(expander.expand("${hasarg:param1}").unwrap(), "false");
        assert_eq!(args(&["--param00"]).expand("${hasarg:param0}").unwrap(), "false");
    }

    #[test]
    fn test_bare_flag_value_is_required() {
        let result = args(&["--param0"]).expand("name = \"${arg:param0}\"");
        assert!(matches!(
            result,
            Err(TemplateError::UndefinedVariable(ref v)) if v == "arg:param0"
        ));
    }

    #[test]
    fn test_file_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db_password");
        std::fs::write(&path, "s3cr3t").unwrap();

        let text = format!("password = \"${{file:{}}}\"", path.display());
        assert_eq!(args(&[]).expand(&text).unwrap(), "password = \"s3cr3t\"");
    }

    #[test]
    fn test_missing_file_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        let result = args(&[]).expand(&format!("${{file:{}}}", path.display()));
        assert!(matches!(result, Err(TemplateError::FileRead { path: ref p, .. }) if *p == path));
    }

    #[test]
    fn test_missing_variable() {
        let result = args(&[]).expand("${arg:pass}");
        assert!(matches!(result, Err(TemplateError::UndefinedVariable(ref v)) if v == "arg:pass"));

        let result = Expander::default().expand("${env:CFG_OVERLAY_TEST_UNSET}");
        assert!(matches!(result, Err(TemplateError::UndefinedVariable(_))));
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let expander = args(&["--name="]);
        assert!(matches!(
            expander.expand("${arg:name}"),
            Err(TemplateError::UndefinedVariable(_))
        ));
        assert_eq!(expander.expand("${arg:name:-anon}").unwrap(), "anon");
    }

    #[test]
    fn test_flag_followed_by_flag_has_no_value() {
        let expander = args(&["--verbose", "--pass=x"]);
        assert!(expander.expand("${arg:verbose}").is_err());
    }

    #[test]
    fn test_fallback() {
        let out = args(&[])
            .expand("port = ${env:CFG_OVERLAY_TEST_NO_PORT:-8080}")
            .unwrap();
        assert_eq!(out, "port = 8080");
    }

    #[test]
    fn test_escape_sequence() {
        let out = args(&[]).expand("value = \"use $${VAR} for env vars\"").unwrap();
        assert_eq!(out, "value = \"use ${VAR} for env vars\"");
    }

    #[test]
    fn test_invalid_reference() {
        for text in ["${nope}", "${cmd:x}", "${env:}", "${file:}"] {
            assert!(matches!(
                args(&[]).expand(text),
                Err(TemplateError::InvalidReference(_))
            ));
        }
    }

    #[test]
    fn test_unclosed_reference() {
        let result = args(&[]).expand("name = ${arg:name");
        assert!(matches!(result, Err(TemplateError::UnclosedReference)));
    }
}
