//! Compact attribute mutation
//!
//! Compact attributes live as messages inside the object header, so
//! modification is a read-modify-write of the header image at its
//! original address: equal-size replacements overwrite the message body
//! in place, anything else removes the old message and appends the new
//! one.

use h5f_core::constants::msg;
use h5f_core::message::Attribute;
use h5f_core::{FormatError, ObjectHeader, Superblock};

use crate::backend::{ByteSink, ByteSource};
use crate::error::{Error, Result};
use crate::object::read_object_header;

/// Replace the compact attribute named `new_attr.name` on the object at
/// `address`.
pub fn modify_compact_attribute<B: ByteSource + ByteSink>(
    backend: &mut B,
    sb: &Superblock,
    address: u64,
    new_attr: &Attribute,
) -> Result<()> {
    let mut header = read_writable_header(backend, sb, address)?;
    let position = find_attribute_message(&header, &new_attr.name)
        .ok_or_else(|| Error::AttributeNotFound(new_attr.name.clone()))?;

    let new_body = new_attr.encode()?;
    if new_body.len() == header.messages[position].body.len() {
        header.messages[position].body = new_body;
    } else {
        let flags = header.messages[position].flags;
        header.messages.remove(position);
        let mut message = h5f_core::HeaderMessage::new(msg::ATTRIBUTE, new_body);
        message.flags = flags;
        header.append_message(message)?;
    }
    backend.write_at(address, &header.encode()?)
}

/// Remove the compact attribute named `name` from the object at
/// `address`.
pub fn delete_compact_attribute<B: ByteSource + ByteSink>(
    backend: &mut B,
    sb: &Superblock,
    address: u64,
    name: &str,
) -> Result<()> {
    let mut header = read_writable_header(backend, sb, address)?;
    let position = find_attribute_message(&header, name)
        .ok_or_else(|| Error::AttributeNotFound(name.to_string()))?;
    header.messages.remove(position);
    backend.write_at(address, &header.encode()?)
}

fn read_writable_header<B: ByteSource>(
    backend: &mut B,
    sb: &Superblock,
    address: u64,
) -> Result<ObjectHeader> {
    let header = read_object_header(backend, sb, address)?;
    // A rewrite only re-serializes chunk 0; headers that spilled into
    // continuation blocks cannot be rewritten in place.
    if header
        .messages_of_type(msg::CONTINUATION)
        .next()
        .is_some()
    {
        return Err(FormatError::Unsupported(
            "rewriting object headers with continuation blocks",
        )
        .into());
    }
    Ok(header)
}

/// Index of the Attribute message whose parsed name matches, skipping
/// message bodies that fail to parse (best-effort iteration).
fn find_attribute_message(header: &ObjectHeader, name: &str) -> Option<usize> {
    header
        .messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.type_id == msg::ATTRIBUTE)
        .find_map(|(i, m)| match Attribute::parse(&m.body) {
            Ok(attr) if attr.name == name => Some(i),
            Ok(_) => None,
            Err(err) => {
                log::warn!("skipping unparseable attribute message: {err}");
                None
            }
        })
}
