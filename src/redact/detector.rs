//! Classification of mapping keys as secret or not.

use regex::Regex;

/// Substring pattern for secret-looking keys, for use with [`Regex`].
///
/// Unlike [`DefaultDetector`] it also matches inside longer words, e.g. `compass`.
pub const DEFAULT_SECRET_PATTERN: &str = "(?i)key|secret|pass(?:word)?|cert(?:ificate)?";

/// Words that mark a mapping key as secret, compared case-insensitively.
const SECRET_WORDS: &[&str] = &[
    "key",
    "secret",
    "pass",
    "password",
    "passwd",
    "passphrase",
    "pwd",
    "cert",
    "certificate",
    "token",
    "auth",
    "authorization",
    "credential",
];

/// Decides whether the value under a mapping key must be masked.
pub trait SecretDetector {
    fn is_secret(&self, key: &str) -> bool;
}

impl SecretDetector for Regex {
    fn is_secret(&self, key: &str) -> bool {
        self.is_match(key)
    }
}

impl<F> SecretDetector for F
where
    F: Fn(&str) -> bool,
{
    fn is_secret(&self, key: &str) -> bool {
        self(key)
    }
}

/// Qualifiers that form a secret compound with `key` when written without a
/// separator, e.g. `apikey` or `privatekey`.
const KEY_QUALIFIERS: &[&str] = &[
    "api",
    "access",
    "private",
    "secret",
    "signing",
    "encryption",
    "master",
    "ssh",
];

/// Secret words shorter than this only match as whole words.
const MIN_SUFFIX_WORD: usize = 5;

/// Word-aware detector used unless the caller supplies another one.
///
/// A key is split into words at non-alphanumeric characters and at camel-case
/// humps, including the end of an acronym (`APIKey` is `API` and `Key`). A word
/// is secret, ignoring case and a plural suffix, when it
/// - is a known secret word, or
/// - ends with a known secret word of at least five letters (`dbpassword`), or
/// - is a known qualifier followed by `key` (`apikey`).
///
/// `apiKey`, `APIKey`, `api_key`, `PASS` and `passWord` match; `past`,
/// `compass`, `passport` and `monkey` do not.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDetector;

impl SecretDetector for DefaultDetector {
    fn is_secret(&self, key: &str) -> bool {
        key.split(|c: char| !c.is_alphanumeric())
            .filter(|segment| !segment.is_empty())
            .any(|segment| {
                is_secret_word(segment) || camel_words(segment).into_iter().any(is_secret_word)
            })
    }
}

fn is_secret_word(word: &str) -> bool {
    let word = word.to_lowercase();
    let candidates = [
        Some(word.as_str()),
        word.strip_suffix('s'),
        word.strip_suffix("es"),
    ];
    let found = candidates.into_iter().flatten().any(|candidate| {
        SECRET_WORDS.iter().any(|&w| {
            candidate == w || (w.len() >= MIN_SUFFIX_WORD && candidate.ends_with(w))
        }) || candidate
            .strip_suffix("key")
            .is_some_and(|qualifier| KEY_QUALIFIERS.contains(&qualifier))
    });
    found
}

/// Splits at every lowercase-or-digit to uppercase transition, and before the
/// last capital of an acronym that is followed by a lowercase letter.
fn camel_words(segment: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = segment.char_indices().collect();
    let mut words = Vec::new();
    let mut start = 0;

    for (n, &(i, c)) in chars.iter().enumerate().skip(1) {
        let prev = chars[n - 1].1;
        let next_lower = chars.get(n + 1).is_some_and(|&(_, next)| next.is_lowercase());
        let hump = c.is_uppercase()
            && (prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_lower));
        if hump {
            words.push(&segment[start..i]);
            start = i;
        }
    }
    words.push(&segment[start..]);
    words
}
