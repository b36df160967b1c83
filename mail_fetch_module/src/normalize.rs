use chrono::{DateTime, Local, TimeZone, Utc};
use mailparse::{MailHeaderMap, ParsedMail};
use tracing::debug;

use crate::record::{EmailRecord, EmailStatus, RawMessage};

const SNIPPET_MAX_CHARS: usize = 160;
const DEFAULT_SUBJECT: &str = "No Subject";

/// Maps a raw fetched message into the canonical record shape. Pure and
/// total: an unparseable message still yields a usable record with the
/// derived fields absent.
pub fn normalize(raw: &RawMessage) -> EmailRecord {
    let parsed = match mailparse::parse_mail(&raw.payload) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!("message {} is not parseable MIME: {}", raw.remote_id, err);
            return EmailRecord {
                sender: String::new(),
                subject: DEFAULT_SUBJECT.to_string(),
                body_snippet: None,
                status: EmailStatus::LiveFetched,
                days_ago: None,
                received_at: None,
            };
        }
    };

    // get_first_value decodes RFC2047 encoded words to plain text.
    let sender = parsed.headers.get_first_value("From").unwrap_or_default();
    let subject = parsed
        .headers
        .get_first_value("Subject")
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());
    let received_at = parsed
        .headers
        .get_first_value("Date")
        .and_then(|value| parse_origination_date(&value));

    EmailRecord {
        sender,
        subject,
        body_snippet: extract_snippet(&parsed),
        status: EmailStatus::LiveFetched,
        days_ago: received_at.map(days_since),
        received_at,
    }
}

/// Parses the Date header; a date without a timezone is taken as UTC.
fn parse_origination_date(header: &str) -> Option<DateTime<Utc>> {
    let seconds = mailparse::dateparse(header).ok()?;
    Utc.timestamp_opt(seconds, 0).single()
}

/// Difference between the local calendar date "now" and the message's local
/// calendar date, clamped to zero for messages dated in the future.
fn days_since(received: DateTime<Utc>) -> i64 {
    let received_date = received.with_timezone(&Local).date_naive();
    let today = Local::now().date_naive();
    (today - received_date).num_days().max(0)
}

fn extract_snippet(parsed: &ParsedMail) -> Option<String> {
    let body = first_text_plain_body(parsed)?;
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(SNIPPET_MAX_CHARS).collect())
}

fn first_text_plain_body(part: &ParsedMail) -> Option<String> {
    if part.subparts.is_empty() {
        if part.ctype.mimetype.eq_ignore_ascii_case("text/plain") {
            return part.get_body().ok();
        }
        return None;
    }
    part.subparts.iter().find_map(first_text_plain_body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn message(headers: &str, body: &str) -> RawMessage {
        RawMessage {
            remote_id: "1".to_string(),
            payload: format!("{headers}\r\n\r\n{body}\r\n").into_bytes(),
        }
    }

    #[test]
    fn missing_subject_defaults() {
        let record = normalize(&message("From: a@x.com", "hi"));
        assert_eq!(record.subject, "No Subject");
        assert_eq!(record.sender, "a@x.com");
        assert_eq!(record.status, EmailStatus::LiveFetched);
    }

    #[test]
    fn encoded_subject_is_decoded() {
        let record = normalize(&message(
            "From: a@x.com\r\nSubject: =?UTF-8?B?SGVsbG8gV29ybGQ=?=",
            "",
        ));
        assert_eq!(record.subject, "Hello World");
    }

    #[test]
    fn missing_sender_is_empty_string() {
        let record = normalize(&message("Subject: hi", ""));
        assert_eq!(record.sender, "");
    }

    #[test]
    fn recent_date_yields_zero_days_ago() {
        let date = Utc::now().to_rfc2822();
        let record = normalize(&message(&format!("From: a@x.com\r\nDate: {date}"), ""));
        assert_eq!(record.days_ago, Some(0));
        assert!(record.received_at.is_some());
    }

    #[test]
    fn yesterday_yields_one_day_ago() {
        let date = (Utc::now() - Duration::days(1)).to_rfc2822();
        let record = normalize(&message(&format!("From: a@x.com\r\nDate: {date}"), ""));
        assert_eq!(record.days_ago, Some(1));
    }

    #[test]
    fn future_date_is_clamped_to_zero() {
        let date = (Utc::now() + Duration::days(3)).to_rfc2822();
        let record = normalize(&message(&format!("From: a@x.com\r\nDate: {date}"), ""));
        assert_eq!(record.days_ago, Some(0));
    }

    #[test]
    fn unparseable_date_leaves_age_absent() {
        let record = normalize(&message("From: a@x.com\r\nDate: not a date", "body"));
        assert_eq!(record.days_ago, None);
        assert_eq!(record.received_at, None);
        // The record is still usable.
        assert_eq!(record.sender, "a@x.com");
    }

    #[test]
    fn snippet_collapses_whitespace_and_truncates() {
        let body = "line one\r\nline   two\r\n".to_string() + &"x".repeat(500);
        let record = normalize(&message("From: a@x.com", &body));
        let snippet = record.body_snippet.expect("snippet");
        assert!(snippet.starts_with("line one line two"));
        assert_eq!(snippet.chars().count(), SNIPPET_MAX_CHARS);
    }

    #[test]
    fn empty_body_yields_no_snippet() {
        let record = normalize(&message("From: a@x.com", ""));
        assert_eq!(record.body_snippet, None);
    }

    #[test]
    fn garbage_payload_still_normalizes() {
        let raw = RawMessage {
            remote_id: "9".to_string(),
            payload: vec![0xff, 0xfe, 0x00],
        };
        let record = normalize(&raw);
        assert_eq!(record.subject, "No Subject");
        assert_eq!(record.days_ago, None);
    }
}
