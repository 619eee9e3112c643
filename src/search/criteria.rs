//! IMAP `SEARCH` criteria.
//!
//! A [`SearchCriteria`] is an immutable set of filters built through
//! [`SearchCriteriaBuilder`]. Its [`Display`](fmt::Display) implementation
//! renders the argument of an IMAP [`SEARCH`
//! command](https://tools.ietf.org/html/rfc3501#section-6.4.4). Keys are
//! always emitted in the same order, whatever order the filters were set in:
//!
//! ```text
//! ANSWERED BCC BEFORE BODY CC DELETED FLAGGED FROM KEYWORD UNKEYWORD NEW OLD
//! ON RECENT SEEN UNSEEN SINCE SUBJECT TEXT TO UNANSWERED UNDELETED UNFLAGGED
//! ```
//!
//! The charset travels next to the criteria and is handed to the search call
//! separately; it never appears in the rendered string.

use std::fmt;

use chrono::NaiveDate;

use crate::error::{FetchError, Result};

/// Charset used when none is given.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// A single search key, borrowed from a [`SearchCriteria`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKey<'c> {
    /// Messages with the `\Answered` flag set.
    Answered,
    /// Messages with the string in the Bcc: field.
    Bcc(&'c str),
    /// Messages whose internal date is earlier than the date.
    Before(NaiveDate),
    /// Messages with the string in the body.
    Body(&'c str),
    /// Messages with the string in the Cc: field.
    Cc(&'c str),
    /// Messages with the `\Deleted` flag set.
    Deleted,
    /// Messages with the `\Flagged` flag set (sometimes shown as Important or Urgent).
    Flagged,
    /// Messages with the string in the From: field.
    From(&'c str),
    /// Messages with the keyword flag set.
    Keyword(&'c str),
    /// Messages without the keyword flag.
    Unkeyword(&'c str),
    /// Messages that are recent and not yet seen.
    New,
    /// Messages that are not recent.
    Old,
    /// Messages whose internal date is within the date.
    On(NaiveDate),
    /// Messages with the `\Recent` flag set.
    Recent,
    /// Messages that have been read.
    Seen,
    /// Messages that have not been read yet.
    Unseen,
    /// Messages whose internal date is within or later than the date.
    Since(NaiveDate),
    /// Messages with the string in the Subject: field.
    Subject(&'c str),
    /// Messages with the string in the header or body.
    Text(&'c str),
    /// Messages with the string in the To: field.
    To(&'c str),
    /// Messages without the `\Answered` flag.
    Unanswered,
    /// Messages without the `\Deleted` flag.
    Undeleted,
    /// Messages without the `\Flagged` flag.
    Unflagged,
}

impl<'c> fmt::Display for SearchKey<'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SearchKey::*;

        match self {
            Answered => write!(f, "ANSWERED"),
            Bcc(s) => write!(f, "BCC {}", Quoted(s)),
            Before(d) => write!(f, "BEFORE \"{}\"", format_date(*d)),
            Body(s) => write!(f, "BODY {}", Quoted(s)),
            Cc(s) => write!(f, "CC {}", Quoted(s)),
            Deleted => write!(f, "DELETED"),
            Flagged => write!(f, "FLAGGED"),
            From(s) => write!(f, "FROM {}", Quoted(s)),
            Keyword(s) => write!(f, "KEYWORD {}", Quoted(s)),
            Unkeyword(s) => write!(f, "UNKEYWORD {}", Quoted(s)),
            New => write!(f, "NEW"),
            Old => write!(f, "OLD"),
            On(d) => write!(f, "ON \"{}\"", format_date(*d)),
            Recent => write!(f, "RECENT"),
            Seen => write!(f, "SEEN"),
            Unseen => write!(f, "UNSEEN"),
            Since(d) => write!(f, "SINCE \"{}\"", format_date(*d)),
            Subject(s) => write!(f, "SUBJECT {}", Quoted(s)),
            Text(s) => write!(f, "TEXT {}", Quoted(s)),
            To(s) => write!(f, "TO {}", Quoted(s)),
            Unanswered => write!(f, "UNANSWERED"),
            Undeleted => write!(f, "UNDELETED"),
            Unflagged => write!(f, "UNFLAGGED"),
        }
    }
}

/// An IMAP quoted string: `"` and `\` are escaped with a backslash.
///
/// Non-ASCII characters are written as-is, so with `CHARSET UTF-8` they reach
/// the server as 8-bit bytes inside the quotes. RFC 3501 quoted strings are
/// 7-bit; most servers accept UTF-8 there anyway, but a strict one may answer
/// `BAD`, which the fetcher reports as unknown search criteria. Sending
/// literals instead would need continuation support from the `imap` crate's
/// `search`, which takes a single command line.
struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        for ch in self.0.chars() {
            if ch == '"' || ch == '\\' {
                f.write_str("\\")?;
            }
            write!(f, "{ch}")?;
        }
        f.write_str("\"")
    }
}

/// Format a date the way SEARCH expects it here: `5 March 2021`.
///
/// Day without leading zero, full English month name, four-digit year.
/// chrono's month names do not depend on the host locale.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%-d %B %Y").to_string()
}

/// Validated, immutable IMAP search criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    charset: String,
    all: bool,
    answered: bool,
    bcc: Option<String>,
    before: Option<NaiveDate>,
    body: Option<String>,
    cc: Option<String>,
    deleted: bool,
    flagged: bool,
    from: Option<String>,
    keyword: Option<String>,
    unkeyword: Option<String>,
    new: bool,
    old: bool,
    on: Option<NaiveDate>,
    recent: bool,
    seen: bool,
    unseen: bool,
    since: Option<NaiveDate>,
    subject: Option<String>,
    text: Option<String>,
    to: Option<String>,
    unanswered: bool,
    undeleted: bool,
    unflagged: bool,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self::new(DEFAULT_CHARSET)
    }
}

impl SearchCriteria {
    /// Criteria without any filter; they match every message.
    pub fn new(charset: impl Into<String>) -> Self {
        Self {
            charset: charset.into(),
            all: false,
            answered: false,
            bcc: None,
            before: None,
            body: None,
            cc: None,
            deleted: false,
            flagged: false,
            from: None,
            keyword: None,
            unkeyword: None,
            new: false,
            old: false,
            on: None,
            recent: false,
            seen: false,
            unseen: false,
            since: None,
            subject: None,
            text: None,
            to: None,
            unanswered: false,
            undeleted: false,
            unflagged: false,
        }
    }

    /// Start building criteria with the default `UTF-8` charset.
    pub fn builder() -> SearchCriteriaBuilder {
        SearchCriteriaBuilder::new()
    }

    /// The charset to pass to the search call.
    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn is_all(&self) -> bool {
        self.all
    }

    pub fn is_answered(&self) -> bool {
        self.answered
    }

    pub fn bcc(&self) -> Option<&str> {
        self.bcc.as_deref()
    }

    pub fn before(&self) -> Option<NaiveDate> {
        self.before
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn cc(&self) -> Option<&str> {
        self.cc.as_deref()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_flagged(&self) -> bool {
        self.flagged
    }

    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    pub fn unkeyword(&self) -> Option<&str> {
        self.unkeyword.as_deref()
    }

    pub fn is_new(&self) -> bool {
        self.new
    }

    pub fn is_old(&self) -> bool {
        self.old
    }

    pub fn on(&self) -> Option<NaiveDate> {
        self.on
    }

    pub fn is_recent(&self) -> bool {
        self.recent
    }

    pub fn is_seen(&self) -> bool {
        self.seen
    }

    pub fn is_unseen(&self) -> bool {
        self.unseen
    }

    pub fn since(&self) -> Option<NaiveDate> {
        self.since
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn to(&self) -> Option<&str> {
        self.to.as_deref()
    }

    pub fn is_unanswered(&self) -> bool {
        self.unanswered
    }

    pub fn is_undeleted(&self) -> bool {
        self.undeleted
    }

    pub fn is_unflagged(&self) -> bool {
        self.unflagged
    }

    /// The set filters as search keys, in rendering order.
    ///
    /// "Match all" is not a key; it is reported by [`is_all`](Self::is_all).
    pub fn keys(&self) -> Vec<SearchKey<'_>> {
        let mut keys = Vec::new();
        if self.answered {
            keys.push(SearchKey::Answered);
        }
        if let Some(v) = &self.bcc {
            keys.push(SearchKey::Bcc(v));
        }
        if let Some(d) = self.before {
            keys.push(SearchKey::Before(d));
        }
        if let Some(v) = &self.body {
            keys.push(SearchKey::Body(v));
        }
        if let Some(v) = &self.cc {
            keys.push(SearchKey::Cc(v));
        }
        if self.deleted {
            keys.push(SearchKey::Deleted);
        }
        if self.flagged {
            keys.push(SearchKey::Flagged);
        }
        if let Some(v) = &self.from {
            keys.push(SearchKey::From(v));
        }
        if let Some(v) = &self.keyword {
            keys.push(SearchKey::Keyword(v));
        }
        if let Some(v) = &self.unkeyword {
            keys.push(SearchKey::Unkeyword(v));
        }
        if self.new {
            keys.push(SearchKey::New);
        }
        if self.old {
            keys.push(SearchKey::Old);
        }
        if let Some(d) = self.on {
            keys.push(SearchKey::On(d));
        }
        if self.recent {
            keys.push(SearchKey::Recent);
        }
        if self.seen {
            keys.push(SearchKey::Seen);
        }
        if self.unseen {
            keys.push(SearchKey::Unseen);
        }
        if let Some(d) = self.since {
            keys.push(SearchKey::Since(d));
        }
        if let Some(v) = &self.subject {
            keys.push(SearchKey::Subject(v));
        }
        if let Some(v) = &self.text {
            keys.push(SearchKey::Text(v));
        }
        if let Some(v) = &self.to {
            keys.push(SearchKey::To(v));
        }
        if self.unanswered {
            keys.push(SearchKey::Unanswered);
        }
        if self.undeleted {
            keys.push(SearchKey::Undeleted);
        }
        if self.unflagged {
            keys.push(SearchKey::Unflagged);
        }
        keys
    }

    fn string_filters(&self) -> [(&'static str, Option<&str>); 9] {
        [
            ("BCC", self.bcc()),
            ("BODY", self.body()),
            ("CC", self.cc()),
            ("FROM", self.from()),
            ("KEYWORD", self.keyword()),
            ("UNKEYWORD", self.unkeyword()),
            ("SUBJECT", self.subject()),
            ("TEXT", self.text()),
            ("TO", self.to()),
        ]
    }
}

impl fmt::Display for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all {
            return write!(f, "ALL");
        }
        let keys = self.keys();
        if keys.is_empty() {
            return write!(f, "ALL");
        }
        let rendered: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        write!(f, "{}", rendered.join(" "))
    }
}

/// Fluent builder for [`SearchCriteria`].
///
/// Every setter consumes the builder and returns the updated one. Setting a
/// string filter to `""` leaves it unset; setting a filter twice keeps the
/// last value. Validation happens in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct SearchCriteriaBuilder {
    criteria: SearchCriteria,
}

impl SearchCriteriaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another charset for the strings in the criteria.
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.criteria.charset = charset.into();
        self
    }

    /// Match every message. Cannot be combined with any other filter.
    pub fn all(mut self) -> Self {
        self.criteria.all = true;
        self
    }

    pub fn answered(mut self) -> Self {
        self.criteria.answered = true;
        self
    }

    /// Messages with the string in the Bcc: (blind carbon copy) field.
    pub fn bcc(mut self, value: impl Into<String>) -> Self {
        self.criteria.bcc = non_empty(value);
        self
    }

    pub fn before(mut self, date: NaiveDate) -> Self {
        self.criteria.before = Some(date);
        self
    }

    pub fn body(mut self, value: impl Into<String>) -> Self {
        self.criteria.body = non_empty(value);
        self
    }

    /// Messages with the string in the Cc: (carbon copy) field.
    pub fn cc(mut self, value: impl Into<String>) -> Self {
        self.criteria.cc = non_empty(value);
        self
    }

    pub fn deleted(mut self) -> Self {
        self.criteria.deleted = true;
        self
    }

    /// Messages flagged as important (sometimes called urgent).
    pub fn flagged(mut self) -> Self {
        self.criteria.flagged = true;
        self
    }

    pub fn from(mut self, value: impl Into<String>) -> Self {
        self.criteria.from = non_empty(value);
        self
    }

    pub fn keyword(mut self, value: impl Into<String>) -> Self {
        self.criteria.keyword = non_empty(value);
        self
    }

    pub fn unkeyword(mut self, value: impl Into<String>) -> Self {
        self.criteria.unkeyword = non_empty(value);
        self
    }

    pub fn new_messages(mut self) -> Self {
        self.criteria.new = true;
        self
    }

    pub fn old(mut self) -> Self {
        self.criteria.old = true;
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.criteria.on = Some(date);
        self
    }

    pub fn recent(mut self) -> Self {
        self.criteria.recent = true;
        self
    }

    pub fn seen(mut self) -> Self {
        self.criteria.seen = true;
        self
    }

    pub fn unseen(mut self) -> Self {
        self.criteria.unseen = true;
        self
    }

    pub fn since(mut self, date: NaiveDate) -> Self {
        self.criteria.since = Some(date);
        self
    }

    pub fn subject(mut self, value: impl Into<String>) -> Self {
        self.criteria.subject = non_empty(value);
        self
    }

    pub fn text(mut self, value: impl Into<String>) -> Self {
        self.criteria.text = non_empty(value);
        self
    }

    pub fn to(mut self, value: impl Into<String>) -> Self {
        self.criteria.to = non_empty(value);
        self
    }

    pub fn unanswered(mut self) -> Self {
        self.criteria.unanswered = true;
        self
    }

    pub fn undeleted(mut self) -> Self {
        self.criteria.undeleted = true;
        self
    }

    pub fn unflagged(mut self) -> Self {
        self.criteria.unflagged = true;
        self
    }

    /// Validate and return the criteria.
    ///
    /// Fails with [`FetchError::InvalidFilterCombination`] when "match all"
    /// was combined with another filter, and with
    /// [`FetchError::InvalidFilterValue`] when a string filter contains a
    /// line break.
    pub fn build(self) -> Result<SearchCriteria> {
        let criteria = self.criteria;

        for (filter, value) in criteria.string_filters() {
            if let Some(value) = value {
                if value.contains(['\r', '\n']) {
                    return Err(FetchError::InvalidFilterValue {
                        filter,
                        value: value.to_string(),
                    });
                }
            }
        }

        if criteria.all {
            let keys = criteria.keys();
            if !keys.is_empty() {
                let rendered: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
                return Err(FetchError::InvalidFilterCombination(rendered.join(" ")));
            }
        }

        Ok(criteria)
    }
}

fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
