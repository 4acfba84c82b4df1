//! Message element codec
//!
//! A message is an ordered tree of named elements: plain key/value pairs,
//! lists of values and nested sections. On the wire every element starts
//! with a one byte type tag:
//!
//! | tag | element       | body                                   |
//! |-----|---------------|----------------------------------------|
//! | 1   | section start | name                                   |
//! | 2   | section end   |                                        |
//! | 3   | key/value     | name, u16 BE value length, value       |
//! | 4   | list start    | name                                   |
//! | 5   | list item     | u16 BE value length, value             |
//! | 6   | list end      |                                        |
//!
//! Names are prefixed with a single length byte.

use crate::error::{Result, WireError};

const SECTION_START: u8 = 1;
const SECTION_END: u8 = 2;
const KEY_VALUE: u8 = 3;
const LIST_START: u8 = 4;
const LIST_ITEM: u8 = 5;
const LIST_END: u8 = 6;

/// A single named entry of a [`Message`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// Raw value bytes
    Value(Vec<u8>),
    /// Ordered list of raw values
    List(Vec<Vec<u8>>),
    /// Nested message
    Section(Message),
}

/// Ordered collection of named elements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    entries: Vec<(String, Element)>,
}

impl Message {
    /// Creates an empty message
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `element`, replacing an existing entry in place
    pub fn insert<K: Into<String>>(&mut self, key: K, element: Element) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = element,
            None => self.entries.push((key, element)),
        }
    }

    /// Sets a key/value entry
    pub fn set_value<K: Into<String>, V: AsRef<[u8]>>(&mut self, key: K, value: V) {
        self.insert(key, Element::Value(value.as_ref().to_vec()));
    }

    /// Sets a list entry
    pub fn set_list<K, I, V>(&mut self, key: K, items: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = V>,
        V: AsRef<[u8]>,
    {
        let items = items.into_iter().map(|v| v.as_ref().to_vec()).collect();
        self.insert(key, Element::List(items));
    }

    /// Sets a nested section
    pub fn set_section<K: Into<String>>(&mut self, key: K, section: Message) {
        self.insert(key, Element::Section(section));
    }

    /// Builder form of [`Message::set_value`]
    pub fn with_value<K: Into<String>, V: AsRef<[u8]>>(mut self, key: K, value: V) -> Self {
        self.set_value(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Element> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, element)| element)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns a key/value entry as text, if it exists and is valid UTF-8
    pub fn value_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            Element::Value(raw) => std::str::from_utf8(raw).ok(),
            _ => None,
        }
    }

    /// Returns a list entry as text items, if it exists and every item is
    /// valid UTF-8
    pub fn list_strs(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key)? {
            Element::List(items) => items
                .iter()
                .map(|item| String::from_utf8(item.clone()).ok())
                .collect(),
            _ => None,
        }
    }

    pub fn section(&self, key: &str) -> Option<&Message> {
        match self.get(key)? {
            Element::Section(section) => Some(section),
            _ => None,
        }
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Element)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes the message into its wire form
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        for (name, element) in &self.entries {
            match element {
                Element::Value(value) => {
                    buf.push(KEY_VALUE);
                    put_name(buf, name)?;
                    put_value(buf, name, value)?;
                }
                Element::List(items) => {
                    buf.push(LIST_START);
                    put_name(buf, name)?;
                    for item in items {
                        buf.push(LIST_ITEM);
                        put_value(buf, name, item)?;
                    }
                    buf.push(LIST_END);
                }
                Element::Section(section) => {
                    buf.push(SECTION_START);
                    put_name(buf, name)?;
                    section.encode_into(buf)?;
                    buf.push(SECTION_END);
                }
            }
        }
        Ok(())
    }

    /// Parses a complete message; trailing bytes are an error
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = Reader { data, pos: 0 };
        let message = Self::decode_body(&mut reader, false)?;
        Ok(message)
    }

    fn decode_body(reader: &mut Reader<'_>, nested: bool) -> Result<Self> {
        let mut message = Message::new();

        while let Some(tag) = reader.next_tag() {
            match tag {
                KEY_VALUE => {
                    let name = reader.name()?;
                    let value = reader.value()?;
                    message.entries.push((name, Element::Value(value)));
                }
                LIST_START => {
                    let name = reader.name()?;
                    let mut items = Vec::new();
                    loop {
                        match reader.next_tag() {
                            Some(LIST_ITEM) => items.push(reader.value()?),
                            Some(LIST_END) => break,
                            Some(other) => {
                                return Err(WireError::Malformed(format!(
                                    "element type {other} inside list '{name}'"
                                )))
                            }
                            None => return Err(WireError::Truncated("list")),
                        }
                    }
                    message.entries.push((name, Element::List(items)));
                }
                SECTION_START => {
                    let name = reader.name()?;
                    let section = Self::decode_body(reader, true)?;
                    message.entries.push((name, Element::Section(section)));
                }
                SECTION_END if nested => return Ok(message),
                SECTION_END => {
                    return Err(WireError::Malformed("unbalanced section end".to_string()))
                }
                LIST_ITEM | LIST_END => {
                    return Err(WireError::Malformed(format!(
                        "element type {tag} outside of a list"
                    )))
                }
                other => return Err(WireError::UnknownElement(other)),
            }
        }

        if nested {
            return Err(WireError::Truncated("section"));
        }
        Ok(message)
    }
}

fn put_name(buf: &mut Vec<u8>, name: &str) -> Result<()> {
    if name.is_empty() || name.len() > u8::MAX as usize {
        return Err(WireError::InvalidName(name.to_string()));
    }
    buf.push(name.len() as u8);
    buf.extend_from_slice(name.as_bytes());
    Ok(())
}

fn put_value(buf: &mut Vec<u8>, name: &str, value: &[u8]) -> Result<()> {
    if value.len() > u16::MAX as usize {
        return Err(WireError::ValueTooLong {
            name: name.to_string(),
            len:  value.len(),
        });
    }
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value);
    Ok(())
}

/// Cursor over an encoded message
pub(crate) struct Reader<'a> {
    pub(crate) data: &'a [u8],
    pub(crate) pos:  usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn next_tag(&mut self) -> Option<u8> {
        let tag = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(tag)
    }

    pub(crate) fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(WireError::Truncated(what))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn name(&mut self) -> Result<String> {
        let len = self.take(1, "name length")?[0] as usize;
        let raw = self.take(len, "name")?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| WireError::InvalidName(String::from_utf8_lossy(raw).into_owned()))
    }

    fn value(&mut self) -> Result<Vec<u8>> {
        let len_bytes = self.take(2, "value length")?;
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        Ok(self.take(len, "value")?.to_vec())
    }

    pub(crate) fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}
