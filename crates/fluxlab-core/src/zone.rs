//! Zone file grammar and pure text transforms.
//!
//! A zone is parsed line by line into a [`Zone`]. Only three line shapes are
//! understood:
//!
//! ```text
//! $TTL 60                                   -> TTL directive
//!                  2024060101 ; Serial (dynamically generated)
//!                                           -> serial line
//! fluxy  IN A 172.60.0.5                    -> A record
//! ```
//!
//! Everything else (SOA header, NS records, blank lines, comments) is kept
//! verbatim. Rendering an untouched zone reproduces its input byte for byte.
//! Every content change bumps the serial first so the DNS server notices it.

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::LabError;
use crate::types::NetworkDefinition;

/// Literal comment that marks the serial line.
pub const SERIAL_MARKER: &str = "; Serial (dynamically generated)";

const SERIAL_INDENT: &str = "                 ";

#[derive(Debug, Clone, PartialEq, Eq)]
enum LineKind {
    Ttl,
    Serial { serial: u64, indent: String },
    A { label: String, addr: Ipv4Addr },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    kind: LineKind,
    raw: String,
}

impl Line {
    fn parse(raw: &str) -> Self {
        Self {
            kind: classify(raw),
            raw: raw.to_string(),
        }
    }

    fn ttl(ttl: u32) -> Self {
        Self::parse(&format!("$TTL {ttl}"))
    }

    fn a_record(label: &str, addr: Ipv4Addr) -> Self {
        Self {
            kind: LineKind::A {
                label: label.to_string(),
                addr,
            },
            raw: format!("{label}  IN A {addr}"),
        }
    }

    fn is_a_for(&self, wanted: &str) -> bool {
        matches!(&self.kind, LineKind::A { label, .. } if label == wanted)
    }
}

fn classify(raw: &str) -> LineKind {
    let trimmed = raw.trim();
    if trimmed.starts_with("$TTL") {
        return LineKind::Ttl;
    }
    if let Some(serial) = parse_serial(trimmed) {
        let indent_len = raw.len() - raw.trim_start().len();
        return LineKind::Serial {
            serial,
            indent: raw[..indent_len].to_string(),
        };
    }
    let mut tokens = trimmed.split_whitespace();
    if let (Some(label), Some("IN"), Some("A"), Some(addr)) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    {
        if let Ok(addr) = addr.parse() {
            return LineKind::A {
                label: label.to_string(),
                addr,
            };
        }
    }
    LineKind::Other
}

/// `<digits> ; Serial (dynamically generated)`, whitespace-tolerant around
/// the digits but exact on the marker.
fn parse_serial(trimmed: &str) -> Option<u64> {
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    if digits_end == 0 {
        return None;
    }
    let (digits, rest) = trimmed.split_at(digits_end);
    if rest.trim_start() != SERIAL_MARKER {
        return None;
    }
    digits.parse().ok()
}

/// Parsed zone file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    lines: Vec<Line>,
    trailing_newline: bool,
}

impl Zone {
    /// Parse zone text. Never fails: unknown lines are carried verbatim.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self {
                lines: Vec::new(),
                trailing_newline: false,
            };
        }
        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);
        Self {
            lines: body.split('\n').map(Line::parse).collect(),
            trailing_newline,
        }
    }

    /// Canonical initial zone for `net`: TTL, SOA header with `serial`, NS,
    /// the nameserver glue record and one placeholder A record.
    #[must_use]
    pub fn initial(net: &NetworkDefinition, domain: &str, serial: u64) -> Self {
        let text = format!(
            "$TTL {ttl}\n\
             $ORIGIN {domain}.\n\
             @       IN SOA  ns.{domain}. root.{domain}. (\n\
             {SERIAL_INDENT}{serial} {SERIAL_MARKER}\n\
             {SERIAL_INDENT}30M\n\
             {SERIAL_INDENT}15M\n\
             {SERIAL_INDENT}1W\n\
             {SERIAL_INDENT}1M )\n\
             @       IN NS   ns.{domain}.\n\
             ns      IN A {dns_ip}\n\
             \n\
             {label} IN A {placeholder}\n",
            ttl = net.ttl,
            dns_ip = net.dns_ip(),
            label = net.name,
            placeholder = net.placeholder_ip(),
        );
        Self::parse(&text)
    }

    /// Current serial, if the marker line is present
    #[must_use]
    pub fn serial(&self) -> Option<u64> {
        self.lines.iter().find_map(|l| match l.kind {
            LineKind::Serial { serial, .. } => Some(serial),
            _ => None,
        })
    }

    /// Value of the `$TTL` directive, if present and numeric
    #[must_use]
    pub fn ttl(&self) -> Option<u32> {
        self.lines
            .iter()
            .find(|l| l.kind == LineKind::Ttl)
            .and_then(|l| l.raw.trim().strip_prefix("$TTL"))
            .and_then(|v| v.trim().parse().ok())
    }

    /// Addresses of every A record for `label`, in file order
    #[must_use]
    pub fn a_records(&self, label: &str) -> Vec<Ipv4Addr> {
        self.lines
            .iter()
            .filter_map(|l| match &l.kind {
                LineKind::A { label: l_label, addr } if l_label == label => Some(*addr),
                _ => None,
            })
            .collect()
    }

    /// Increment the serial by exactly one.
    ///
    /// Returns false, leaving the zone untouched, when no serial line exists.
    pub fn bump_serial(&mut self) -> bool {
        let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| matches!(l.kind, LineKind::Serial { .. }))
        else {
            return false;
        };
        if let LineKind::Serial { serial, indent } = &mut line.kind {
            *serial += 1;
            line.raw = format!("{indent}{serial} {SERIAL_MARKER}");
        }
        true
    }

    /// Point `label` at `addr`.
    ///
    /// Rewrites the first A record for `label` in place, or appends one.
    /// Returns whether the serial was bumped.
    pub fn set_single_a(&mut self, label: &str, addr: Ipv4Addr) -> bool {
        let bumped = self.bump_serial();
        match self.lines.iter_mut().find(|l| l.is_a_for(label)) {
            Some(line) => *line = Line::a_record(label, addr),
            None => self.push(Line::a_record(label, addr)),
        }
        bumped
    }

    /// Replace every A record for `label` with one record per address.
    ///
    /// Addresses are appended in the given order; repeats are dropped.
    /// Returns whether the serial was bumped.
    pub fn set_multi_a(&mut self, label: &str, addrs: &[Ipv4Addr]) -> bool {
        let bumped = self.bump_serial();
        self.lines.retain(|l| !l.is_a_for(label));
        let mut seen = Vec::with_capacity(addrs.len());
        for addr in addrs {
            if !seen.contains(addr) {
                seen.push(*addr);
                self.push(Line::a_record(label, *addr));
            }
        }
        bumped
    }

    /// Rewrite the `$TTL` directive in place, inserting it at the top when
    /// missing. Returns whether the serial was bumped.
    pub fn set_ttl_directive(&mut self, ttl: u32) -> bool {
        match self.lines.iter_mut().find(|l| l.kind == LineKind::Ttl) {
            Some(line) => *line = Line::ttl(ttl),
            None => self.lines.insert(0, Line::ttl(ttl)),
        }
        self.trailing_newline = true;
        self.bump_serial()
    }

    /// Check the lines every served zone needs: TTL, serial and an NS record
    pub fn check_integrity(&self) -> Result<(), LabError> {
        let mut missing = Vec::new();
        if !self.lines.iter().any(|l| l.kind == LineKind::Ttl) {
            missing.push("$TTL directive");
        }
        if self.serial().is_none() {
            missing.push("serial marker");
        }
        let has_ns = self.lines.iter().any(|l| {
            let mut tokens = l.raw.split_whitespace();
            tokens.nth(1) == Some("IN") && tokens.next() == Some("NS")
        });
        if !has_ns {
            missing.push("NS record");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LabError::Integrity(format!(
                "zone is missing {}",
                missing.join(", ")
            )))
        }
    }

    fn push(&mut self, line: Line) {
        // A blank final line would otherwise end up between old and new records.
        if !self.trailing_newline && self.lines.last().is_some_and(|l| l.raw.is_empty()) {
            self.lines.pop();
        }
        self.lines.push(line);
        self.trailing_newline = true;
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, line) in self.lines.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            f.write_str(&line.raw)?;
        }
        if self.trailing_newline && !self.lines.is_empty() {
            f.write_str("\n")?;
        }
        Ok(())
    }
}

/// Render the canonical initial zone text for `net`
#[must_use]
pub fn render(net: &NetworkDefinition, domain: &str, serial: u64) -> String {
    Zone::initial(net, domain, serial).to_string()
}

/// Date-based starting serial: `YYYYMMDD01`
#[must_use]
pub fn initial_serial(date: chrono::NaiveDate) -> u64 {
    let stamp: u64 = date
        .format("%Y%m%d")
        .to_string()
        .parse()
        .unwrap_or_default();
    stamp * 100 + 1
}

/// Text form of [`Zone::bump_serial`]; returns the input unchanged when no
/// serial marker is present.
#[must_use]
pub fn bump_serial(text: &str) -> String {
    let mut zone = Zone::parse(text);
    if zone.bump_serial() {
        zone.to_string()
    } else {
        text.to_string()
    }
}

/// Text form of [`Zone::set_single_a`]
#[must_use]
pub fn set_single_a(text: &str, label: &str, addr: Ipv4Addr) -> String {
    let mut zone = Zone::parse(text);
    zone.set_single_a(label, addr);
    zone.to_string()
}

/// Text form of [`Zone::set_multi_a`]
#[must_use]
pub fn set_multi_a(text: &str, label: &str, addrs: &[Ipv4Addr]) -> String {
    let mut zone = Zone::parse(text);
    zone.set_multi_a(label, addrs);
    zone.to_string()
}

/// Text form of [`Zone::set_ttl_directive`]
#[must_use]
pub fn set_ttl_directive(text: &str, ttl: u32) -> String {
    let mut zone = Zone::parse(text);
    zone.set_ttl_directive(ttl);
    zone.to_string()
}
