//! The persisted checksum state and its two text encodings.
//!
//! ## File layout
//!
//! ```text
//! file:* com.acme.ReflectiveTest,com.acme.SpiTest     (optional)
//! INDEXED                                             (or PLAIN_TEXT)
//! 2                                                   (INDEXED only)
//! com.acme.T1                                         (INDEXED only)
//! com.acme.T2                                         (INDEXED only)
//! file:/build/classes/com/acme/A.class 3a7bd3e2... 0
//! file:/build/classes/com/acme/B.class 9f86d081... 0,1
//! file:/build/classes/com/acme/Orphan.class 60303ae2...
//! ```
//!
//! `PLAIN_TEXT` writes test names where `INDEXED` writes indices into the
//! table. Both decode to the same [`PersistedState`].
//!
//! Decoding is lenient: a file written by an older or interrupted run still
//! yields every record that can be understood, and anything dropped is
//! logged. The consequence of a dropped record is that its tests are not
//! selected by it, so the caller treats a state it cannot read at all as a
//! first run.

use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use fixedbitset::FixedBitSet;
use indexmap::IndexSet;
use tracing::warn;

/// Resource id of the wildcard header line.
pub const WILDCARD_RESOURCE: &str = "file:*";

/// Text encoding of a persisted state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    /// Records carry test names.
    #[default]
    PlainText,
    /// The test table is written once; records carry indices into it.
    Indexed,
}

impl Encoding {
    /// Returns the format tag written to the file.
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::PlainText => "PLAIN_TEXT",
            Encoding::Indexed => "INDEXED",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLAIN_TEXT" => Ok(Encoding::PlainText),
            "INDEXED" => Ok(Encoding::Indexed),
            other => Err(format!("unknown encoding tag: {other}")),
        }
    }
}

/// One tracked dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRecord {
    /// Resource id of the dependency.
    pub resource: String,
    /// Content checksum at write time.
    pub checksum: String,
    /// Bit `i` is set when test `i` of the table depends on this resource.
    pub tests: FixedBitSet,
}

/// Everything one run remembers for the next.
///
/// The test table order is the index contract of the indexed encoding; it
/// is preserved across a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
    /// Ordered test table.
    pub tests: IndexSet<String>,
    /// Tests that depend on everything, if any were declared.
    pub wildcard: Option<BTreeSet<String>>,
    /// Tracked dependencies.
    pub records: Vec<DependencyRecord>,
    /// Encoding the state was read with, and will be written with.
    pub encoding: Encoding,
}

impl PersistedState {
    /// Returns the test names selected by a bitset over the test table.
    pub fn test_names<'a>(
        &'a self,
        bits: &'a FixedBitSet,
    ) -> impl Iterator<Item = &'a str> + 'a {
        bits.ones()
            .filter_map(|index| self.tests.get_index(index).map(String::as_str))
    }

    /// Writes the state in its encoding.
    pub fn encode(&self, out: &mut impl Write) -> io::Result<()> {
        if let Some(wildcard) = self.wildcard.as_ref().filter(|w| !w.is_empty()) {
            let names: Vec<&str> = wildcard.iter().map(String::as_str).collect();
            writeln!(out, "{WILDCARD_RESOURCE} {}", names.join(","))?;
        }
        writeln!(out, "{}", self.encoding)?;
        if self.encoding == Encoding::Indexed {
            writeln!(out, "{}", self.tests.len())?;
            for test in &self.tests {
                writeln!(out, "{test}")?;
            }
        }
        for record in &self.records {
            write!(out, "{} {}", record.resource, record.checksum)?;
            let tests: Vec<String> = match self.encoding {
                Encoding::PlainText => {
                    self.test_names(&record.tests).map(str::to_string).collect()
                }
                Encoding::Indexed => {
                    record.tests.ones().map(|i| i.to_string()).collect()
                }
            };
            if !tests.is_empty() {
                write!(out, " {}", tests.join(","))?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Returns the encoded state as a string.
    pub fn encode_to_string(&self) -> String {
        let mut out = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.encode(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Parses a persisted state, skipping what it cannot understand.
    pub fn decode(text: &str) -> Self {
        let mut state = PersistedState::default();
        let mut lines = text.lines().peekable();

        if let Some(line) = lines.next_if(|l| l.starts_with(WILDCARD_RESOURCE)) {
            state.wildcard = Some(parse_wildcard(line));
        }

        match lines.peek().map(|l| l.trim().parse::<Encoding>()) {
            Some(Ok(encoding)) => {
                state.encoding = encoding;
                lines.next();
            }
            Some(Err(_)) => warn!("Persisted state has no format tag; assuming PLAIN_TEXT"),
            None => {}
        }

        if state.encoding == Encoding::Indexed {
            let count = lines.next().map_or(0, |line| {
                line.trim().parse::<usize>().unwrap_or_else(|_| {
                    warn!(line, "Unparsable test count; assuming no tests");
                    0
                })
            });
            for _ in 0..count {
                let Some(test) = lines.next() else {
                    warn!(count, "Test table shorter than its count");
                    break;
                };
                state.tests.insert(test.trim().to_string());
            }
        }

        let mut skipped = 0usize;
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            match state.parse_record(line) {
                Some(record) => state.records.push(record),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(skipped, "Skipped malformed records in persisted state");
        }
        state
    }

    fn parse_record(&mut self, line: &str) -> Option<DependencyRecord> {
        let mut fields = line.split_whitespace();
        let resource = fields.next()?.to_string();
        let checksum = fields.next()?.to_string();

        let mut tests = FixedBitSet::with_capacity(self.tests.len());
        for token in fields.flat_map(|f| f.split(',')).filter(|t| !t.is_empty()) {
            let index = match self.encoding {
                Encoding::PlainText => self.tests.insert_full(token.to_string()).0,
                Encoding::Indexed => match token.parse::<usize>() {
                    Ok(index) if index < self.tests.len() => index,
                    _ => {
                        warn!(%resource, token, "Ignoring invalid test index");
                        continue;
                    }
                },
            };
            tests.grow(index + 1);
            tests.insert(index);
        }
        Some(DependencyRecord {
            resource,
            checksum,
            tests,
        })
    }
}

fn parse_wildcard(line: &str) -> BTreeSet<String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [_, names] | [_, _, names] => names
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect(),
        _ => BTreeSet::new(),
    }
}
