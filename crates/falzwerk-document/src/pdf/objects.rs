// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Small lopdf object helpers shared by the page editor and the redactor.

use lopdf::{Dictionary, Document, Object, ObjectId};

/// Follow a chain of references to the underlying object.
pub(crate) fn resolve<'a>(doc: &'a Document, mut object: &'a Object) -> &'a Object {
    // Bounded so a reference cycle cannot spin forever.
    for _ in 0..32 {
        match object {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => object = target,
                Err(_) => return &Object::Null,
            },
            _ => return object,
        }
    }
    &Object::Null
}

/// Dictionary behind `object`, whether direct, referenced, or a stream dict.
pub(crate) fn as_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, object) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Look up `key` in `dict` and resolve it to a dictionary.
pub(crate) fn dict_entry<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    dict.get(key).ok().and_then(|value| as_dict(doc, value))
}

/// Numeric value of an integer or real object.
pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

pub(crate) fn resolved_number(doc: &Document, object: &Object) -> Option<f32> {
    number(resolve(doc, object))
}

pub(crate) fn name(object: &Object) -> Option<&[u8]> {
    match object {
        Object::Name(n) => Some(n.as_slice()),
        _ => None,
    }
}

/// Parse a `[x0 y0 x1 y1]` rectangle array, normalizing corner order.
pub(crate) fn rect_array(doc: &Document, object: &Object) -> Option<[f32; 4]> {
    let Object::Array(items) = resolve(doc, object) else {
        return None;
    };
    if items.len() != 4 {
        return None;
    }
    let mut values = [0.0f32; 4];
    for (slot, item) in values.iter_mut().zip(items) {
        *slot = resolved_number(doc, item)?;
    }
    Some([
        values[0].min(values[2]),
        values[1].min(values[3]),
        values[0].max(values[2]),
        values[1].max(values[3]),
    ])
}

pub(crate) fn rect_object(rect: [f32; 4]) -> Object {
    Object::Array(rect.iter().map(|v| Object::Real(*v)).collect())
}

/// Whether `id` names a dictionary whose `/Type` is `type_name`.
pub(crate) fn has_type(doc: &Document, id: ObjectId, type_name: &[u8]) -> bool {
    doc.get_object(id)
        .ok()
        .and_then(|object| as_dict(doc, object))
        .and_then(|dict| dict.get(b"Type").ok())
        .and_then(name)
        == Some(type_name)
}
