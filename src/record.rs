//! Producer-side record builders
//!
//! A builder owns one claimed slot between claim and publish. Appends are
//! chained by value and never fail the caller: an append that does not fit
//! truncates the record and marks it. A claimed sequence must always be
//! published or the ring would stall behind the gap, so dropping a builder
//! publishes whatever was written.

use crate::buffer::Payload;
use crate::disruptor::{ Ring, Sequence };
use crate::error::{ FluxlogError, Result };
use crate::formatter;
use crate::pattern::Template;

/// Fluent builder for one log record
pub struct RecordBuilder<'a> {
    ring: &'a Ring,
    slot: &'a mut crate::slot::RecordSlot,
    sequence: Sequence,
    published: bool,
}

impl<'a> RecordBuilder<'a> {
    pub(crate) fn new(
        ring: &'a Ring,
        slot: &'a mut crate::slot::RecordSlot,
        sequence: Sequence,
    ) -> Self {
        Self {
            ring,
            slot,
            sequence,
            published: false,
        }
    }

    /// The ring sequence this record was claimed at
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    fn note(&mut self, result: Result<()>) {
        if result.is_err() {
            self.slot.truncated = true;
        }
    }

    /// Append a string slice
    pub fn append_str(mut self, s: &str) -> Self {
        let r = formatter::append_str(&mut self.slot.payload, s);
        self.note(r);
        self
    }

    /// Append a signed 64-bit integer in decimal
    pub fn append_i64(mut self, v: i64) -> Self {
        let r = formatter::append_i64(&mut self.slot.payload, v);
        self.note(r);
        self
    }

    /// Append a signed 32-bit integer in decimal
    pub fn append_i32(mut self, v: i32) -> Self {
        let r = formatter::append_i32(&mut self.slot.payload, v);
        self.note(r);
        self
    }

    /// Append a byte-ranged value in signed decimal
    pub fn append_i8(mut self, v: i8) -> Self {
        let r = formatter::append_i8(&mut self.slot.payload, v);
        self.note(r);
        self
    }

    /// Append a double in plain decimal
    pub fn append_f64(mut self, v: f64) -> Self {
        let r = formatter::append_f64(&mut self.slot.payload, v);
        self.note(r);
        self
    }

    /// Append a double with a fixed number of fractional digits
    pub fn append_f64_digits(mut self, v: f64, digits: usize) -> Self {
        let r = formatter::append_f64_digits(&mut self.slot.payload, v, digits);
        self.note(r);
        self
    }

    /// Append a single character
    pub fn append_char(mut self, c: char) -> Self {
        let r = formatter::append_char(&mut self.slot.payload, c);
        self.note(r);
        self
    }

    /// Append `true` or `false`
    pub fn append_bool(mut self, v: bool) -> Self {
        let r = formatter::append_bool(&mut self.slot.payload, v);
        self.note(r);
        self
    }

    /// Publish the record
    pub fn commit(mut self) {
        self.publish_now();
    }

    fn publish_now(&mut self) {
        if !self.published {
            self.published = true;
            self.ring.sequencer.publish(self.sequence, self.sequence);
            self.ring.wait.signal_all_when_blocking();
        }
    }
}

impl Drop for RecordBuilder<'_> {
    fn drop(&mut self) {
        self.publish_now();
    }
}

/// A value bindable to a `%s` placeholder
pub trait TemplateValue {
    /// Append this value to the record payload
    fn append_to(&self, payload: &mut Payload) -> Result<()>;
}

impl TemplateValue for i64 {
    fn append_to(&self, payload: &mut Payload) -> Result<()> {
        formatter::append_i64(payload, *self)
    }
}

impl TemplateValue for i32 {
    fn append_to(&self, payload: &mut Payload) -> Result<()> {
        formatter::append_i32(payload, *self)
    }
}

impl TemplateValue for i8 {
    fn append_to(&self, payload: &mut Payload) -> Result<()> {
        formatter::append_i8(payload, *self)
    }
}

impl TemplateValue for f64 {
    fn append_to(&self, payload: &mut Payload) -> Result<()> {
        formatter::append_f64(payload, *self)
    }
}

impl TemplateValue for bool {
    fn append_to(&self, payload: &mut Payload) -> Result<()> {
        formatter::append_bool(payload, *self)
    }
}

impl TemplateValue for char {
    fn append_to(&self, payload: &mut Payload) -> Result<()> {
        formatter::append_char(payload, *self)
    }
}

impl TemplateValue for &str {
    fn append_to(&self, payload: &mut Payload) -> Result<()> {
        formatter::append_str(payload, self)
    }
}

/// Builder binding values to a parsed [`Template`]'s placeholders
pub struct TemplateBuilder<'a> {
    inner: RecordBuilder<'a>,
    template: &'a Template,
    next_placeholder: usize,
}

impl<'a> TemplateBuilder<'a> {
    pub(crate) fn new(mut inner: RecordBuilder<'a>, template: &'a Template) -> Self {
        let r = formatter::append_str(&mut inner.slot.payload, template.literal(0));
        inner.note(r);
        Self {
            inner,
            template,
            next_placeholder: 0,
        }
    }

    /// Bind the next `%s` placeholder, then append the literal run that
    /// follows it
    pub fn with<V: TemplateValue>(mut self, value: V) -> Result<Self> {
        if self.next_placeholder >= self.template.placeholder_count() {
            return Err(self.fail("more values than %s placeholders"));
        }
        let r = value.append_to(&mut self.inner.slot.payload);
        self.inner.note(r);
        self.next_placeholder += 1;
        let r = formatter::append_str(
            &mut self.inner.slot.payload,
            self.template.literal(self.next_placeholder),
        );
        self.inner.note(r);
        Ok(self)
    }

    /// Bind the final placeholder and publish; fails when placeholders
    /// remain unfilled
    pub fn with_last<V: TemplateValue>(self, value: V) -> Result<()> {
        self.with(value)?.commit()
    }

    /// Publish the record; fails when placeholders remain unfilled
    pub fn commit(mut self) -> Result<()> {
        if self.next_placeholder != self.template.placeholder_count() {
            return Err(self.fail("unfilled %s placeholders"));
        }
        self.inner.publish_now();
        Ok(())
    }

    // Replaces the payload with an error record describing the misuse; the
    // slot still publishes (on drop) so the sequence is never left as a
    // permanent gap.
    fn fail(&mut self, why: &str) -> FluxlogError {
        let payload = &mut self.inner.slot.payload;
        use crate::buffer::LogBuffer as _;
        payload.clear();
        self.inner.slot.truncated = false;
        let _ = formatter::append_str(payload, "pattern misuse: ");
        let _ = formatter::append_str(payload, why);
        let expected = self.template.placeholder_count();
        FluxlogError::pattern_misuse(
            format!("{why} ({} bound, {expected} expected)", self.next_placeholder)
        )
    }
}
