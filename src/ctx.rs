//! Explicit parse context threaded through entity construction.
//!
//! The original-language notion of "parent object" is replaced by a small
//! value carrying the parent's kind and version bounds; entities never hold
//! back-pointers.

use crate::error::{Error, ErrorKind};
use crate::logger::Logger;
use crate::protocol::Protocol;
use crate::schema::SchemaHeader;
use crate::version::NOT_YET_DEPRECATED;
use crate::xml::XmlNode;

/// What kind of entity owns the one being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    Namespace,
    Bitfield,
    Bundle,
    Variant,
    OtherField,
    Message,
    Interface,
    Layer,
}

/// Parent identity and version bounds for inheritance.
#[derive(Debug, Clone, Copy)]
pub struct ParentInfo {
    pub kind: ParentKind,
    pub since: u32,
    pub deprecated: u32,
}

impl ParentInfo {
    pub fn namespace() -> Self {
        ParentInfo {
            kind: ParentKind::Namespace,
            since: 0,
            deprecated: NOT_YET_DEPRECATED,
        }
    }

    /// Does the parent pass its version bounds down to members?
    pub fn versioned(&self) -> bool {
        !matches!(
            self.kind,
            ParentKind::Namespace | ParentKind::Interface | ParentKind::Layer
        )
    }
}

pub struct ParseCtx<'a> {
    pub protocol: &'a Protocol,
    pub logger: &'a Logger,
    pub parent: ParentInfo,
}

impl<'a> ParseCtx<'a> {
    pub fn new(protocol: &'a Protocol, logger: &'a Logger) -> Self {
        ParseCtx {
            protocol,
            logger,
            parent: ParentInfo::namespace(),
        }
    }

    /// Context for parsing a child of another entity.
    pub fn child(&self, parent: ParentInfo) -> ParseCtx<'a> {
        ParseCtx {
            protocol: self.protocol,
            logger: self.logger,
            parent,
        }
    }

    pub fn schema(&self) -> &SchemaHeader {
        self.protocol.schema()
    }

    /// Reports an error prefixed with the node's location and returns it for
    /// propagation.
    pub fn err(&self, kind: ErrorKind, node: &XmlNode, msg: impl AsRef<str>) -> Error {
        let msg = format!("{}{}", node.log_prefix(), msg.as_ref());
        self.logger.error(&msg);
        Error::new(kind, msg)
    }

    pub fn warn(&self, node: &XmlNode, msg: impl AsRef<str>) {
        self.logger
            .warning(format!("{}{}", node.log_prefix(), msg.as_ref()));
    }
}
