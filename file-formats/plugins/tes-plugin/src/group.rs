//! Groups and their nested entries

use crate::header::{GroupHeader, GroupType, HEADER_SIZE, RecordHeader};
use crate::limits::{DecodeLimits, EncodeOptions};
use crate::record::RawRecord;
use crate::signature::{Signature, sigs};
use crate::{Error, Result};
use std::io::{Cursor, Write};

/// An item inside a group
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// A record
    Record(RawRecord),
    /// A nested group
    Group(Group),
}

/// A group of records and sub-groups
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Header; `group_size` is recomputed on write
    pub header: GroupHeader,
    /// Entries in file order
    pub entries: Vec<Entry>,
}

impl Group {
    /// Create an empty top group for a record category
    pub fn top(signature: Signature) -> Self {
        Self {
            header: GroupHeader::top(signature),
            entries: Vec::new(),
        }
    }

    /// Kind of group
    pub fn group_type(&self) -> GroupType {
        self.header.group_type
    }

    /// Label as a record signature
    pub fn label(&self) -> Signature {
        self.header.label_signature()
    }

    /// Decode a group body
    ///
    /// `body` is everything after the 24-byte header, exactly
    /// `group_size - 24` bytes.
    pub fn decode(
        header: GroupHeader,
        body: &[u8],
        depth: usize,
        limits: &DecodeLimits,
    ) -> Result<Self> {
        limits.check_depth(depth)?;
        let mut entries = Vec::new();
        let mut rest = body;
        while !rest.is_empty() {
            let (entry, tail) = decode_entry(rest, depth + 1, limits)?;
            entries.push(entry);
            rest = tail;
        }
        Ok(Self { header, entries })
    }

    /// All records in this group and its sub-groups, depth first
    pub fn records(&self) -> Records<'_> {
        Records {
            stack: vec![self.entries.iter()],
        }
    }

    /// Number of records and groups below this group, itself included
    pub fn count(&self) -> usize {
        1 + self
            .entries
            .iter()
            .map(|entry| match entry {
                Entry::Record(_) => 1,
                Entry::Group(group) => group.count(),
            })
            .sum::<usize>()
    }

    /// Serialize the group
    pub fn write<W: Write>(&self, writer: &mut W, options: &EncodeOptions) -> Result<()> {
        let mut body = Vec::new();
        for entry in &self.entries {
            match entry {
                Entry::Record(record) => record.write(&mut body, options)?,
                Entry::Group(group) => group.write(&mut body, options)?,
            }
        }
        let mut header = self.header;
        header.group_size = u32::try_from(body.len() + HEADER_SIZE)
            .map_err(|_| Error::malformed(format!("group {} exceeds 4GB", self.label())))?;
        header.write(writer)?;
        writer.write_all(&body)?;
        Ok(())
    }
}

/// Decode the record or group at the start of `data`, returning the rest
pub(crate) fn decode_entry<'a>(
    data: &'a [u8],
    depth: usize,
    limits: &DecodeLimits,
) -> Result<(Entry, &'a [u8])> {
    if data.len() < HEADER_SIZE {
        return Err(Error::malformed(format!(
            "{} trailing bytes are too short for a header",
            data.len()
        )));
    }
    let (head, rest) = data.split_at(HEADER_SIZE);
    let signature = Signature::new([head[0], head[1], head[2], head[3]]);
    let mut cursor = Cursor::new(&head[4..]);

    if signature == sigs::GRUP {
        let header = GroupHeader::read_after_signature(&mut cursor)?;
        let size = header.group_size as usize;
        if size < HEADER_SIZE || size - HEADER_SIZE > rest.len() {
            return Err(Error::malformed(format!(
                "group {} declares {size} bytes, {} available",
                header.label_signature(),
                rest.len() + HEADER_SIZE
            )));
        }
        let (body, tail) = rest.split_at(size - HEADER_SIZE);
        let group = Group::decode(header, body, depth, limits)?;
        Ok((Entry::Group(group), tail))
    } else {
        let header = RecordHeader::read_after_signature(&mut cursor, signature)?;
        let size = header.data_size as usize;
        if size > rest.len() {
            return Err(Error::malformed(format!(
                "{signature} record {} declares {size} bytes, {} available",
                header.form_id,
                rest.len()
            )));
        }
        let (payload, tail) = rest.split_at(size);
        let record = RawRecord::decode(header, payload, limits)?;
        Ok((Entry::Record(record), tail))
    }
}

/// Depth-first iterator over the records of a group
#[derive(Debug)]
pub struct Records<'a> {
    stack: Vec<std::slice::Iter<'a, Entry>>,
}

impl<'a> Iterator for Records<'a> {
    type Item = &'a RawRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let iter = self.stack.last_mut()?;
            match iter.next() {
                Some(Entry::Record(record)) => return Some(record),
                Some(Entry::Group(group)) => self.stack.push(group.entries.iter()),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}
