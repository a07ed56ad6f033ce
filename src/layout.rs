//! Record layouts
//!
//! A [`Layout`] renders one slot into the consumer's output buffer:
//! header fields first, then the payload, allocation-free on the steady
//! path. [`TextLayout`] understands a small conversion-specifier subset of
//! the classic pattern syntax; a full pattern-layout engine is outside
//! this crate.

use std::fmt::{ self, Write as _ };
use std::sync::Arc;

use chrono::{ LocalResult, Locale, TimeZone };
use chrono_tz::Tz;

use crate::buffer::{ OutputBuf, Payload };
use crate::constants::{ DEFAULT_TIMESTAMP_FORMAT, TRUNCATION_MARKER };
use crate::error::{ FluxlogError, Result };
use crate::service::LoggerRegistry;
use crate::slot::RecordSlot;

/// Renders a slot's header and payload into the output buffer
pub trait Layout: Send {
    /// Append the rendered record to `out`
    fn format(&mut self, slot: &RecordSlot, out: &mut OutputBuf);
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Timestamp,
    Level,
    Logger,
    Thread,
    Message,
    Newline,
}

// Formatted text of the last-seen millisecond. Timestamps repeat heavily
// under load, so chrono only runs when the millisecond changes.
struct TimestampCache {
    millis: i64,
    buf: [u8; 64],
    len: usize,
}

impl TimestampCache {
    fn empty() -> Self {
        Self {
            millis: i64::MIN,
            buf: [0; 64],
            len: 0,
        }
    }
}

struct FixedWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl fmt::Write for FixedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        if bytes.len() > self.buf.len() - self.len {
            return Err(fmt::Error);
        }
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }
}

/// Text layout driven by a pattern string.
///
/// Recognized specifiers: `%d` timestamp, `%p` level, `%c` logger name,
/// `%t` thread name, `%m` payload, `%n` newline, `%%` literal percent.
pub struct TextLayout {
    tokens: Vec<Token>,
    time_zone: Tz,
    locale: Locale,
    timestamp_format: String,
    timestamp_cache: TimestampCache,
    registry: Arc<LoggerRegistry>,
}

impl TextLayout {
    /// Parse a pattern into a layout
    pub fn new(
        pattern: &str,
        time_zone: Tz,
        locale: Locale,
        registry: Arc<LoggerRegistry>,
    ) -> Result<Self> {
        Ok(Self {
            tokens: parse_pattern(pattern)?,
            time_zone,
            locale,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            timestamp_cache: TimestampCache::empty(),
            registry,
        })
    }

    /// Override the strftime format used by `%d`
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }
}

fn parse_pattern(pattern: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars();

    let mut flush_literal = |tokens: &mut Vec<Token>, literal: &mut String| {
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(literal)));
        }
    };

    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => literal.push('%'),
            Some('d') => {
                flush_literal(&mut tokens, &mut literal);
                tokens.push(Token::Timestamp);
            }
            Some('p') => {
                flush_literal(&mut tokens, &mut literal);
                tokens.push(Token::Level);
            }
            Some('c') => {
                flush_literal(&mut tokens, &mut literal);
                tokens.push(Token::Logger);
            }
            Some('t') => {
                flush_literal(&mut tokens, &mut literal);
                tokens.push(Token::Thread);
            }
            Some('m') => {
                flush_literal(&mut tokens, &mut literal);
                tokens.push(Token::Message);
            }
            Some('n') => {
                flush_literal(&mut tokens, &mut literal);
                tokens.push(Token::Newline);
            }
            Some(other) => {
                return Err(
                    FluxlogError::config(format!("Unknown layout specifier %{other}"))
                );
            }
            None => {
                return Err(FluxlogError::config("Dangling % at end of layout pattern"));
            }
        }
    }
    flush_literal(&mut tokens, &mut literal);

    Ok(tokens)
}

fn write_timestamp(
    cache: &mut TimestampCache,
    time_zone: Tz,
    locale: Locale,
    format: &str,
    millis: i64,
    out: &mut OutputBuf,
) {
    if millis != cache.millis || cache.len == 0 {
        let mut writer = FixedWriter {
            buf: &mut cache.buf,
            len: 0,
        };
        let rendered = match time_zone.timestamp_millis_opt(millis) {
            LocalResult::Single(dt) => {
                write!(writer, "{}", dt.format_localized(format, locale))
            }
            _ => write!(writer, "{millis}"),
        };
        if rendered.is_err() {
            // format longer than the cache; fall back to the raw millis
            writer.len = 0;
            let _ = write!(writer, "{millis}");
        }
        cache.len = writer.len;
        cache.millis = millis;
    }
    out.push_bytes(&cache.buf[..cache.len]);
}

fn write_payload(slot: &RecordSlot, out: &mut OutputBuf) {
    match slot.payload() {
        Payload::Bytes(buf) => out.push_bytes(buf.as_slice()),
        Payload::Chars(buf) => {
            for c in buf.as_slice() {
                out.push_char(*c);
            }
        }
    }
    if slot.truncated() {
        out.push_bytes(TRUNCATION_MARKER.as_bytes());
    }
}

impl Layout for TextLayout {
    fn format(&mut self, slot: &RecordSlot, out: &mut OutputBuf) {
        let TextLayout {
            tokens,
            time_zone,
            locale,
            timestamp_format,
            timestamp_cache,
            registry,
        } = self;

        for token in tokens.iter() {
            match token {
                Token::Literal(text) => out.push_bytes(text.as_bytes()),
                Token::Timestamp => write_timestamp(
                    timestamp_cache,
                    *time_zone,
                    *locale,
                    timestamp_format,
                    slot.timestamp_millis(),
                    out,
                ),
                Token::Level => out.push_bytes(slot.level().as_str().as_bytes()),
                Token::Logger => {
                    registry.with_name(slot.logger_id(), |name| {
                        out.push_bytes(name.as_bytes());
                    });
                }
                Token::Thread => out.push_bytes(slot.thread_name().as_bytes()),
                Token::Message => write_payload(slot, out),
                Token::Newline => out.push_bytes(b"\n"),
            }
        }
    }
}
