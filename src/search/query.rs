//! Search query parser.
//!
//! Turns a compact, user-typed query into [`SearchCriteria`].
//!
//! # Supported syntax
//!
//! **Simple search**: `invoice` matches the text anywhere (`TEXT`).
//! Several bare words are joined into one phrase.
//!
//! **Field-specific**:
//! - `from:user@example.com`, `to:`, `cc:`, `bcc:`
//! - `subject:invoice`, `body:"important text"`, `text:report`
//! - `keyword:$Label1` / `-keyword:$Label1` (or `unkeyword:`)
//!
//! **Date filters** (`YYYY-MM-DD`):
//! - `since:2021-03-05`, `before:2021-04-01`, `on:2021-03-05`
//!
//! **Flags**:
//! - `all`, `answered`, `deleted`, `flagged`, `new`, `old`, `recent`,
//!   `seen`, `unseen`, `unanswered`, `undeleted`, `unflagged`
//! - `-answered`, `-deleted`, `-flagged`, `-seen`: the negated flag
//!
//! **Quoting**: `"exact phrase"` keeps spaces inside a single value.

use chrono::NaiveDate;

use crate::error::{FetchError, Result};

use super::criteria::{SearchCriteria, SearchCriteriaBuilder};

/// Parse a query string into validated [`SearchCriteria`].
///
/// An empty query yields criteria that match every message.
pub fn parse_query(input: &str, charset: &str) -> Result<SearchCriteria> {
    let mut builder = SearchCriteriaBuilder::new().charset(charset);
    let mut bare_words: Vec<String> = Vec::new();

    for token in tokenize(input.trim()) {
        let (negated, token) = match token.strip_prefix('-') {
            Some(stripped) if !stripped.is_empty() => (true, stripped.to_string()),
            _ => (false, token),
        };

        if let Some((field, value)) = split_field(&token) {
            builder = apply_field(builder, &field.to_lowercase(), &unquote(value), negated)?;
        } else if negated {
            builder = apply_negated_flag(builder, &token.to_lowercase())?;
        } else if let Some(next) = apply_flag(builder.clone(), &token.to_lowercase()) {
            builder = next;
        } else {
            bare_words.push(unquote(&token));
        }
    }

    if !bare_words.is_empty() {
        builder = builder.text(bare_words.join(" "));
    }

    builder.build()
}

fn apply_field(
    builder: SearchCriteriaBuilder,
    field: &str,
    value: &str,
    negated: bool,
) -> Result<SearchCriteriaBuilder> {
    if value.is_empty() {
        return Err(FetchError::InvalidQuery(format!(
            "missing value for '{field}:'"
        )));
    }
    if negated && field != "keyword" {
        return Err(FetchError::InvalidQuery(format!(
            "'{field}:' cannot be negated"
        )));
    }

    let builder = match field {
        "from" => builder.from(value),
        "to" => builder.to(value),
        "cc" => builder.cc(value),
        "bcc" => builder.bcc(value),
        "subject" => builder.subject(value),
        "body" => builder.body(value),
        "text" => builder.text(value),
        "keyword" if negated => builder.unkeyword(value),
        "keyword" => builder.keyword(value),
        "unkeyword" => builder.unkeyword(value),
        "since" => builder.since(parse_date(field, value)?),
        "before" => builder.before(parse_date(field, value)?),
        "on" => builder.on(parse_date(field, value)?),
        _ => {
            return Err(FetchError::InvalidQuery(format!(
                "unknown field '{field}:'"
            )))
        }
    };
    Ok(builder)
}

/// Apply a plain flag word. Returns `None` if the word is not a flag.
fn apply_flag(builder: SearchCriteriaBuilder, word: &str) -> Option<SearchCriteriaBuilder> {
    let builder = match word {
        "all" => builder.all(),
        "answered" => builder.answered(),
        "deleted" => builder.deleted(),
        "flagged" => builder.flagged(),
        "new" => builder.new_messages(),
        "old" => builder.old(),
        "recent" => builder.recent(),
        "seen" => builder.seen(),
        "unseen" => builder.unseen(),
        "unanswered" => builder.unanswered(),
        "undeleted" => builder.undeleted(),
        "unflagged" => builder.unflagged(),
        _ => return None,
    };
    Some(builder)
}

fn apply_negated_flag(
    builder: SearchCriteriaBuilder,
    word: &str,
) -> Result<SearchCriteriaBuilder> {
    match word {
        "answered" => Ok(builder.unanswered()),
        "deleted" => Ok(builder.undeleted()),
        "flagged" => Ok(builder.unflagged()),
        "seen" => Ok(builder.unseen()),
        _ => Err(FetchError::InvalidQuery(format!(
            "'-{word}' cannot be negated"
        ))),
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        FetchError::InvalidQuery(format!(
            "invalid date '{value}' for '{field}:' (expected YYYY-MM-DD): {e}"
        ))
    })
}

/// Split `field:value`. A colon inside a quoted phrase does not count.
fn split_field(token: &str) -> Option<(&str, &str)> {
    let colon = token.find(':')?;
    match token.find('"') {
        Some(quote) if quote < colon => None,
        _ => Some((&token[..colon], &token[colon + 1..])),
    }
}

/// Strip one pair of surrounding double quotes.
fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

/// Tokenize input respecting quoted strings.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
            current.push(ch);
        } else if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(query: &str) -> String {
        parse_query(query, "UTF-8").unwrap().to_string()
    }

    #[test]
    fn test_empty_query_is_all() {
        assert_eq!(render(""), "ALL");
        assert_eq!(render("   "), "ALL");
        assert_eq!(render("all"), "ALL");
    }

    #[test]
    fn test_parse_field_query() {
        assert_eq!(render("from:alice@example.com"), "FROM \"alice@example.com\"");
        assert_eq!(
            render("subject:\"Aplikace OMS - data file\""),
            "SUBJECT \"Aplikace OMS - data file\""
        );
        assert_eq!(render("SUBJECT:report"), "SUBJECT \"report\"");
    }

    #[test]
    fn test_parse_flags_and_dates() {
        assert_eq!(
            render("unseen since:2021-03-05 flagged"),
            "FLAGGED UNSEEN SINCE \"5 March 2021\""
        );
        assert_eq!(render("on:2016-04-22"), "ON \"22 April 2016\"");
    }

    #[test]
    fn test_negations() {
        assert_eq!(render("-seen -flagged"), "UNSEEN UNFLAGGED");
        assert_eq!(render("-keyword:Junk"), "UNKEYWORD \"Junk\"");
        assert_eq!(render("-answered -deleted"), "UNANSWERED UNDELETED");
    }

    #[test]
    fn test_bare_words_become_text() {
        assert_eq!(render("quarterly report"), "TEXT \"quarterly report\"");
        assert_eq!(render("\"exact phrase\" seen"), "SEEN TEXT \"exact phrase\"");
    }

    #[test]
    fn test_charset_is_kept() {
        let criteria = parse_query("subject:x", "ISO-8859-2").unwrap();
        assert_eq!(criteria.charset(), "ISO-8859-2");
    }

    #[test]
    fn test_invalid_queries() {
        assert!(matches!(
            parse_query("since:yesterday", "UTF-8"),
            Err(FetchError::InvalidQuery(_))
        ));
        assert!(matches!(
            parse_query("colour:red", "UTF-8"),
            Err(FetchError::InvalidQuery(_))
        ));
        assert!(matches!(
            parse_query("-recent", "UTF-8"),
            Err(FetchError::InvalidQuery(_))
        ));
        assert!(matches!(
            parse_query("from:", "UTF-8"),
            Err(FetchError::InvalidQuery(_))
        ));
        assert!(matches!(
            parse_query("-from:alice", "UTF-8"),
            Err(FetchError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_all_with_filters_is_rejected() {
        assert!(matches!(
            parse_query("all seen", "UTF-8"),
            Err(FetchError::InvalidFilterCombination(_))
        ));
    }

    #[test]
    fn test_quoted_phrase_with_colon_is_text() {
        assert_eq!(render("\"Re: invoice\""), "TEXT \"Re: invoice\"");
        assert_eq!(
            render("unseen \"Fwd: report\""),
            "UNSEEN TEXT \"Fwd: report\""
        );
        assert_eq!(render("subject:\"Re: invoice\""), "SUBJECT \"Re: invoice\"");
    }

    #[test]
    fn test_tokenize_respects_quotes() {
        let tokens = tokenize("from:a subject:\"two words\" seen");
        assert_eq!(tokens, vec!["from:a", "subject:\"two words\"", "seen"]);
    }
}
