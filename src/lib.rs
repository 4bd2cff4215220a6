#![doc(html_root_url = "https://docs.rs/wiredsl/0.4.0")]

//! `wiredsl` parses and validates schema files of an XML-based
//! binary-protocol description language.
//!
//! A protocol is described by one or more `<schema>` documents defining
//! fields, messages, interfaces and framing layers. [`Protocol`] loads the
//! documents, builds a fully validated, read-only intermediate
//! representation and exposes queries over it; code generators (such as the
//! companion `wiredsl-build` crate) walk that representation to emit
//! protocol definition sources.
//!
//! ## Example
//!
//! ```
//! use wiredsl::Protocol;
//!
//! let schema = r#"
//!     <schema name="demo" id="1" version="2" dslVersion="2" endian="big">
//!         <fields>
//!             <int name="MsgSize" type="uint16" />
//!         </fields>
//!         <message name="Hello" id="1" />
//!     </schema>
//! "#;
//!
//! let mut protocol = Protocol::new();
//! protocol.parse_str("demo.xml", schema).unwrap();
//! protocol.validate().unwrap();
//!
//! assert_eq!("demo", protocol.schema().name);
//! assert_eq!(1, protocol.all_messages().len());
//! ```
//!
//! Diagnostics are reported through a [`Logger`] with `file:line` prefixes;
//! by default they are forwarded to the `log` facade. All rule violations
//! carry an [`ErrorKind`] describing the failure class.

mod alias;
mod cond;
mod ctx;
mod error;
mod field;
mod frame;
mod interface;
mod layer;
mod logger;
mod message;
mod namespace;
mod protocol;
mod reference;
mod schema;
mod text;
mod version;
mod xml;

pub use alias::Alias;
pub use cond::{CondExpr, OptCond};
pub use error::{Error, ErrorKind, Result};
pub use field::{
    BitfieldField, BundleField, DataField, EnumField, EnumValue, Field, FieldBase, FieldKind,
    FloatField, IntField, IntType, ListField, OptMode, OptionalField, Prefix, RefField, SemanticType,
    SetBit, SetField, SpecialValue, StringField, ValidRange, VariantField,
};
pub use frame::Frame;
pub use interface::Interface;
pub use layer::{ChecksumAlg, ChecksumLayer, CustomLayer, Layer, LayerKind, ValueLayer};
pub use logger::{Level, Logger, ReportFn};
pub use message::{Message, Sender};
pub use namespace::Namespace;
pub use protocol::Protocol;
pub use schema::{Endian, SchemaHeader};
pub use version::NOT_YET_DEPRECATED;
pub use xml::Location;

pub use text::access_key;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_example_round_trips() {
        let schema = r#"
            <schema name="demo" id="1" version="2" dslVersion="2" endian="big">
                <fields>
                    <int name="MsgSize" type="uint16" />
                </fields>
                <message name="Hello" id="1" />
            </schema>
        "#;

        let mut protocol = Protocol::new();
        protocol.parse_str("demo.xml", schema).unwrap();
        protocol.validate().unwrap();
        assert_eq!("demo", protocol.schema().name);
        assert_eq!(1, protocol.all_messages().len());
    }
}
