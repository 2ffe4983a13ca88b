//! Command-line quoting for the three supported shell dialects.
//!
//! Windows quoting follows the MSVC argv parsing rules. It is not a complete
//! solution for arbitrary untrusted data.

use regex::Regex;
use std::sync::LazyLock;

static BACKSLASHES_THEN_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\\*)""#).expect("Invalid quote regex"));

static TRAILING_BACKSLASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\\+)$").expect("Invalid trailing backslash regex"));

static CMD_METACHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[()%!^"<>&|]"#).expect("Invalid cmd metachar regex"));

/// Quote one argument for the MSVC runtime's argv parser.
pub fn argv_quote(arg: &str) -> String {
    if arg.is_empty() {
        return "\"\"".to_string();
    }
    // Backslashes before a quote are doubled, then the quote is escaped.
    let escaped = BACKSLASHES_THEN_QUOTE.replace_all(arg, r#"$1$1\""#);
    if escaped.contains(' ') || escaped.contains('\t') {
        let escaped = TRAILING_BACKSLASHES.replace(&escaped, "$1$1");
        format!("\"{}\"", escaped)
    } else {
        escaped.into_owned()
    }
}

/// Quote one argument for cmd.exe.
pub fn escape_cmd(arg: &str) -> String {
    CMD_METACHARS
        .replace_all(&argv_quote(arg), "^$0")
        .into_owned()
}

/// Quote an argument list for PowerShell, using the stop-parsing token.
pub fn escape_powershell(args: &[String]) -> String {
    let quoted: Vec<String> = args.iter().map(|a| argv_quote(a)).collect();
    format!("--% {}", quoted.join(" "))
}

/// Quote one argument for a POSIX shell.
pub fn escape_posix(arg: &str) -> String {
    shell_words::quote(arg).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_quote_leaves_simple_args() {
        assert_eq!(argv_quote("--dry-run"), "--dry-run");
        assert_eq!(argv_quote(r"C:\templates"), r"C:\templates");
    }

    #[test]
    fn argv_quote_wraps_whitespace() {
        assert_eq!(argv_quote("my templates"), "\"my templates\"");
        assert_eq!(argv_quote(r"C:\my dir\"), r#""C:\my dir\\""#);
    }

    #[test]
    fn argv_quote_escapes_quotes_and_preceding_backslashes() {
        assert_eq!(argv_quote(r#"{"a":"B-1"}"#), r#"{\"a\":\"B-1\"}"#);
        assert_eq!(argv_quote(r#"x\"y"#), r#"x\\\"y"#);
    }

    #[test]
    fn argv_quote_keeps_empty_args() {
        assert_eq!(argv_quote(""), "\"\"");
    }

    #[test]
    fn cmd_escapes_metacharacters() {
        assert_eq!(escape_cmd(r#"{"a":"B"}"#), r#"{\^"a\^":\^"B\^"}"#);
        assert_eq!(escape_cmd("a&b|c"), "a^&b^|c");
        assert_eq!(escape_cmd("100%"), "100^%");
    }

    #[test]
    fn powershell_uses_stop_parsing_token() {
        let args = vec!["--update".to_string(), r#"{"a":"B"}"#.to_string()];
        assert_eq!(escape_powershell(&args), r#"--% --update {\"a\":\"B\"}"#);
    }

    #[test]
    fn posix_uses_single_quotes() {
        assert_eq!(escape_posix(r#"{"a":"B"}"#), r#"'{"a":"B"}'"#);
        assert_eq!(escape_posix("plain"), "plain");
    }
}
