// Identifier schema - compiled form of an identifier template such as
// "{RV}{YYMM}-{0000}". Every component has a fixed width, so components are
// addressed by byte offset rather than by parsing.

use std::collections::BTreeMap;

use chrono::{Datelike, Local, NaiveDate};
use tally_config::date_mask;

use crate::error::SchemaError;

/// Component selector for [`IdentifierSchema::extract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    Date,
    Numeric,
    Param(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Component {
    Separator(String),
    Date { format: String },
    Numeric,
    Param { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    component: Component,
    start: usize,
    end: usize,
}

impl Slot {
    fn width(&self) -> usize {
        self.end - self.start
    }

    fn is(&self, kind: &ComponentKind) -> bool {
        match (&self.component, kind) {
            (Component::Date { .. }, ComponentKind::Date) => true,
            (Component::Numeric, ComponentKind::Numeric) => true,
            (Component::Param { name, .. }, ComponentKind::Param(wanted)) => name == wanted,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierSchema {
    template: String,
    slots: Vec<Slot>,
    year_offset: i32,
}

impl IdentifierSchema {
    pub fn compile(template: &str) -> Result<Self, SchemaError> {
        Self::compile_with_params(template, &BTreeMap::new())
    }

    /// Compile a template, binding `{Name}` placeholders to parameter values.
    pub fn compile_with_params(
        template: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Self, SchemaError> {
        if template.is_empty() {
            return Err(SchemaError::EmptyTemplate);
        }

        let mut components = Vec::new();
        let mut rest = template;
        let mut pos = 0;
        while !rest.is_empty() {
            match rest.find('{') {
                Some(0) => {
                    let close = rest.find('}').ok_or_else(|| SchemaError::Unterminated {
                        template: template.to_string(),
                        offset: pos,
                    })?;
                    components.push(classify(&rest[1..close], params)?);
                    pos += close + 1;
                    rest = &rest[close + 1..];
                }
                Some(open) => {
                    components.push((Component::Separator(rest[..open].to_string()), open));
                    pos += open;
                    rest = &rest[open..];
                }
                None => {
                    components.push((Component::Separator(rest.to_string()), rest.len()));
                    rest = "";
                }
            }
        }

        if !components.iter().any(|(c, _)| *c == Component::Numeric) {
            return Err(SchemaError::MissingNumeric { template: template.to_string() });
        }
        // Identifiers carry one date cycle
        if components.iter().filter(|(c, _)| matches!(c, Component::Date { .. })).count() > 1 {
            return Err(SchemaError::MultipleDates { template: template.to_string() });
        }

        let mut slots = Vec::with_capacity(components.len());
        let mut offset = 0;
        for (component, width) in components {
            slots.push(Slot { component, start: offset, end: offset + width });
            offset += width;
        }

        log::debug!("identifier template '{template}' compiled to {} components", slots.len());

        Ok(Self {
            template: template.to_string(),
            slots,
            year_offset: 0,
        })
    }

    /// Years added to the date before it is rendered into an identifier.
    pub fn with_year_offset(mut self, years: i32) -> Self {
        self.year_offset = years;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Length of every conforming identifier.
    pub fn width(&self) -> usize {
        self.slots.last().map(|s| s.end).unwrap_or(0)
    }

    pub fn has_date(&self) -> bool {
        self.slots.iter().any(|s| s.is(&ComponentKind::Date))
    }

    /// Date component for `date`, or an empty string when the template has
    /// no date placeholder.
    pub fn render_date(&self, date: NaiveDate) -> String {
        let date = shift_years(date, self.year_offset);
        self.slots
            .iter()
            .find_map(|s| match &s.component {
                Component::Date { format, .. } => Some(date.format(format).to_string()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Identifier for `number` on `date`. Without a date, today's date is used.
    pub fn format(&self, number: u64, date: Option<NaiveDate>) -> String {
        self.format_at(number, date, Local::now().date_naive())
    }

    /// Like [`format`](Self::format) with an explicit fallback date.
    pub fn format_at(&self, number: u64, date: Option<NaiveDate>, today: NaiveDate) -> String {
        let date = match date {
            Some(d) => d,
            None => {
                if self.has_date() {
                    log::warn!("no date provided for identifier number {number}; using {today}");
                }
                today
            }
        };
        self.format_raw(number, &self.render_date(date))
    }

    /// Largest number the numeric field can hold.
    pub fn max_number(&self) -> u64 {
        let width = self
            .slots
            .iter()
            .find(|s| s.is(&ComponentKind::Numeric))
            .map(Slot::width)
            .unwrap_or(0);
        u32::try_from(width)
            .ok()
            .and_then(|w| 10u64.checked_pow(w))
            .map_or(u64::MAX, |limit| limit - 1)
    }

    /// Identifier for `number` with an already-rendered date component.
    /// A number wider than the numeric field is written in full, so the
    /// result does not conform.
    pub fn format_raw(&self, number: u64, date_component: &str) -> String {
        if number > self.max_number() {
            log::warn!("number {number} does not fit the numeric field of '{}'", self.template);
        }
        let mut id = String::with_capacity(self.width());
        for slot in &self.slots {
            match &slot.component {
                Component::Separator(text) => id.push_str(text),
                Component::Date { .. } => id.push_str(date_component),
                Component::Numeric => id.push_str(&format!("{number:0width$}", width = slot.width())),
                Component::Param { value, .. } => id.push_str(value),
            }
        }
        id
    }

    fn slice<'a>(&self, identifier: &'a str, kind: &ComponentKind) -> Option<&'a str> {
        let slot = self.slots.iter().find(|s| s.is(kind))?;
        identifier.get(slot.start..slot.end)
    }

    /// Substring of the first component of `kind`. Empty (with a warning)
    /// when the template has no such component or the identifier is too short.
    pub fn extract(&self, identifier: &str, kind: &ComponentKind) -> String {
        match self.slice(identifier, kind) {
            Some(s) => s.to_string(),
            None => {
                log::warn!("component {kind:?} cannot be found in identifier '{identifier}'");
                String::new()
            }
        }
    }

    /// Numeric value and date component of a conforming identifier.
    ///
    /// An identifier conforms when re-formatting its own numeric and date
    /// components reproduces it exactly.
    pub fn decompose<'a>(&self, identifier: &'a str) -> Option<(u64, &'a str)> {
        let digits = self.slice(identifier, &ComponentKind::Numeric)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let number: u64 = digits.parse().ok()?;
        let date = if self.has_date() {
            self.slice(identifier, &ComponentKind::Date)?
        } else {
            ""
        };
        (self.format_raw(number, date) == identifier).then_some((number, date))
    }

    pub fn conforming_number(&self, identifier: &str) -> Option<u64> {
        self.decompose(identifier).map(|(n, _)| n)
    }

    /// Next free identifier in the date cycle of `date`: one past the largest
    /// conforming number sharing that date component, or 1. `None` once the
    /// numeric field of that cycle is exhausted.
    pub fn next_id<'a, I>(&self, existing: I, date: NaiveDate) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let cycle = self.render_date(date);
        let last = existing
            .into_iter()
            .filter_map(|id| self.decompose(id))
            .filter(|(_, d)| *d == cycle)
            .map(|(n, _)| n)
            .max()
            .unwrap_or(0);
        if last >= self.max_number() {
            log::warn!("identifier sequence '{cycle}' of '{}' is exhausted at {last}", self.template);
            return None;
        }
        Some(self.format_raw(last + 1, &cycle))
    }
}

fn classify(
    token: &str,
    params: &BTreeMap<String, String>,
) -> Result<(Component, usize), SchemaError> {
    if date_mask::is_id_date_mask(token) {
        let invalid = || SchemaError::InvalidDateMask { mask: token.to_string() };
        let width = date_mask::rendered_width(token).ok_or_else(invalid)?;
        let format = date_mask::to_chrono(token).map_err(|_| invalid())?;
        return Ok((Component::Date { format }, width));
    }
    if let Some(value) = params.get(token) {
        let component = Component::Param { name: token.to_string(), value: value.clone() };
        return Ok((component, value.len()));
    }
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        return Ok((Component::Numeric, token.len()));
    }
    Ok((Component::Separator(token.to_string()), token.len()))
}

fn shift_years(date: NaiveDate, years: i32) -> NaiveDate {
    if years == 0 {
        return date;
    }
    let year = date.year() + years;
    // Feb 29 lands on Feb 28 in a non-leap target year
    date.with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
        .unwrap_or(date)
}
