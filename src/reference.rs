//! Dotted-reference resolution against the namespace tree.
//!
//! A reference string `a.b.c…` is resolved by walking child namespaces for
//! as long as components match; the remainder is interpreted as
//! `EntityName[.member[.member…]]`. The resolver is pure and caches
//! nothing.

use std::collections::BTreeMap;

use crate::field::Field;
use crate::frame::Frame;
use crate::interface::Interface;
use crate::message::Message;
use crate::namespace::Namespace;

/// Walks the namespace tree, consuming leading components that name child
/// namespaces. Returns the deepest matched namespace and the unconsumed
/// remainder (possibly empty when the path itself names a namespace).
pub(crate) fn namespace_scope<'p, 's>(
    roots: &'p BTreeMap<String, Namespace>,
    path: &'s str,
) -> Option<(&'p Namespace, &'s str)> {
    let mut current: Option<&Namespace> = None;
    let mut rest = path;

    loop {
        let (first, remaining) = match rest.split_once('.') {
            Some((first, remaining)) => (first, remaining),
            None => (rest, ""),
        };

        let children = match current {
            None => roots,
            Some(ns) => &ns.namespaces,
        };

        if let Some(child) = children.get(first) {
            current = Some(child);
            rest = remaining;
            if rest.is_empty() {
                return Some((child, ""));
            }
            continue;
        }
        break;
    }

    match current {
        Some(ns) => Some((ns, rest)),
        None => roots.get("").map(|ns| (ns, rest)),
    }
}

/// Splits the remainder into the entity name and the member path.
fn entity_split(rest: &str) -> (&str, &str) {
    match rest.split_once('.') {
        Some((name, member)) => (name, member),
        None => (rest, ""),
    }
}

/// Resolves a reference to a globally defined field; the whole remainder
/// must be the field name.
pub(crate) fn find_field<'p>(
    roots: &'p BTreeMap<String, Namespace>,
    path: &str,
) -> Option<&'p Field> {
    let (ns, rest) = namespace_scope(roots, path)?;
    if rest.is_empty() || rest.contains('.') {
        return None;
    }
    ns.find_field(rest)
}

pub(crate) fn find_message<'p>(
    roots: &'p BTreeMap<String, Namespace>,
    path: &str,
) -> Option<&'p Message> {
    let (ns, rest) = namespace_scope(roots, path)?;
    if rest.is_empty() || rest.contains('.') {
        return None;
    }
    ns.find_message(rest)
}

pub(crate) fn find_interface<'p>(
    roots: &'p BTreeMap<String, Namespace>,
    path: &str,
) -> Option<&'p Interface> {
    let (ns, rest) = namespace_scope(roots, path)?;
    if rest.is_empty() || rest.contains('.') {
        return None;
    }
    ns.find_interface(rest)
}

pub(crate) fn find_frame<'p>(
    roots: &'p BTreeMap<String, Namespace>,
    path: &str,
) -> Option<&'p Frame> {
    let (ns, rest) = namespace_scope(roots, path)?;
    if rest.is_empty() || rest.contains('.') {
        return None;
    }
    ns.find_frame(rest)
}

/// Resolves a value reference: the remainder is a field name followed by an
/// optional member path handed to the field for interpretation.
pub(crate) fn find_field_value<'p, 's>(
    roots: &'p BTreeMap<String, Namespace>,
    path: &'s str,
) -> Option<(&'p Field, &'s str)> {
    let (ns, rest) = namespace_scope(roots, path)?;
    if rest.is_empty() {
        return None;
    }
    let (name, member) = entity_split(rest);
    ns.find_field(name).map(|field| (field, member))
}
