//! Field entities of the IR.
//!
//! Every `<int>`, `<enum>`, `<bundle>`, … element becomes a [`Field`]: the
//! shared state lives in [`FieldBase`], the per-kind state in the
//! [`FieldKind`] sum type. Hooks the original models with virtual methods
//! are expressed as matches over the kind.

use crate::ctx::{ParentKind, ParseCtx};
use crate::error::{ErrorKind, Result};
use crate::text;
use crate::version::{self, NOT_YET_DEPRECATED};
use crate::xml::{self, Location, PropsMap, XmlNode};

pub mod bitfield;
pub mod bundle;
pub mod data;
pub mod enumeration;
pub mod float;
pub mod int;
pub mod list;
pub mod optional;
pub mod reference;
pub mod set;
pub mod string;
pub mod variant;

pub use bitfield::BitfieldField;
pub use bundle::BundleField;
pub use data::DataField;
pub use enumeration::{EnumField, EnumValue};
pub use float::FloatField;
pub use int::{IntField, IntType, SpecialValue, ValidRange};
pub use list::ListField;
pub use optional::{OptMode, OptionalField};
pub use reference::RefField;
pub use set::{SetBit, SetField};
pub use string::StringField;
pub use variant::VariantField;

/// Protocol-level meaning attached to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SemanticType {
    #[default]
    None,
    Version,
    MessageId,
    Length,
}

/// Field element names recognised by the DSL.
pub const SUPPORTED_TYPES: &[&str] = &[
    "int", "float", "enum", "set", "bitfield", "bundle", "string", "data", "list", "ref",
    "optional", "variant",
];

const COMMON_PROPS: &[&str] = &[
    "name",
    "displayName",
    "description",
    "sinceVersion",
    "deprecated",
    "removed",
    "reuse",
    "semanticType",
    "pseudo",
    "displayReadOnly",
    "displayHidden",
    "customizable",
    "failOnInvalid",
    "forceGen",
];

const COMMON_CHILDREN: &[&str] = &["meta"];

/// State shared by all field kinds. Deep-copied as a whole by `reuse=`.
#[derive(Debug, Clone)]
pub struct FieldBase {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub semantic_type: SemanticType,
    pub pseudo: bool,
    pub display_read_only: bool,
    pub display_hidden: bool,
    pub customizable: bool,
    pub fail_on_invalid: bool,
    pub force_gen: bool,
    pub since_version: u32,
    pub deprecated_since: u32,
    pub deprecated_removed: bool,
    pub extra_attrs: Vec<(String, String)>,
    pub extra_children: Vec<String>,
}

impl Default for FieldBase {
    fn default() -> Self {
        FieldBase {
            name: String::new(),
            display_name: String::new(),
            description: String::new(),
            semantic_type: SemanticType::None,
            pseudo: false,
            display_read_only: false,
            display_hidden: false,
            customizable: false,
            fail_on_invalid: false,
            force_gen: false,
            since_version: 0,
            deprecated_since: NOT_YET_DEPRECATED,
            deprecated_removed: false,
            extra_attrs: Vec::new(),
            extra_children: Vec::new(),
        }
    }
}

/// Kind-specific field state.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Int(IntField),
    Float(FloatField),
    Enum(EnumField),
    Set(SetField),
    Bitfield(BitfieldField),
    Bundle(BundleField),
    Str(StringField),
    Data(DataField),
    List(ListField),
    Ref(RefField),
    Optional(OptionalField),
    Variant(VariantField),
}

impl FieldKind {
    /// The DSL element name of this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            FieldKind::Int(_) => "int",
            FieldKind::Float(_) => "float",
            FieldKind::Enum(_) => "enum",
            FieldKind::Set(_) => "set",
            FieldKind::Bitfield(_) => "bitfield",
            FieldKind::Bundle(_) => "bundle",
            FieldKind::Str(_) => "string",
            FieldKind::Data(_) => "data",
            FieldKind::List(_) => "list",
            FieldKind::Ref(_) => "ref",
            FieldKind::Optional(_) => "optional",
            FieldKind::Variant(_) => "variant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    loc: Location,
    pub base: FieldBase,
    pub kind: FieldKind,
}

fn extra_props(tag: &str) -> &'static [&'static str] {
    match tag {
        "int" => &[
            "type",
            "defaultValue",
            "units",
            "endian",
            "length",
            "bitLength",
            "serOffset",
            "scaling",
            "validRange",
            "validValue",
            "validMin",
            "validMax",
            "validCheckVersion",
            "nonUniqueSpecialsAllowed",
            "displayDecimals",
            "displayOffset",
            "signExt",
        ],
        "float" => &[
            "type",
            "defaultValue",
            "endian",
            "units",
            "validRange",
            "validValue",
            "validMin",
            "validMax",
            "validCheckVersion",
            "displayDecimals",
        ],
        "enum" => &[
            "type",
            "defaultValue",
            "endian",
            "length",
            "bitLength",
            "nonUniqueAllowed",
            "validCheckVersion",
            "hexAssign",
        ],
        "set" => &[
            "type",
            "defaultValue",
            "endian",
            "length",
            "bitLength",
            "reservedValue",
            "nonUniqueAllowed",
            "validCheckVersion",
        ],
        "bitfield" => &["endian"],
        "string" => &["defaultValue", "encoding", "length", "zeroTermSuffix"],
        "data" => &["defaultValue", "length"],
        "list" => &["count", "elemFixedLength"],
        "ref" => &["field", "bitLength"],
        "optional" => &["defaultMode", "cond", "missingOnReadFail", "missingOnInvalid"],
        "variant" => &["defaultMember", "displayIdxReadOnlyHidden"],
        _ => &[],
    }
}

/// Properties whose child-element form may hold a nested field definition
/// instead of a plain value, so a missing value is not an error.
fn possible_props(tag: &str) -> &'static [&'static str] {
    match tag {
        "string" | "data" => &["lengthPrefix"],
        "list" => &[
            "element",
            "countPrefix",
            "lengthPrefix",
            "elemLengthPrefix",
            "termSuffix",
        ],
        "optional" => &["field"],
        _ => &[],
    }
}

fn extra_children(tag: &str) -> Vec<&'static str> {
    match tag {
        "int" | "float" => vec!["special"],
        "enum" => vec!["validValue"],
        "set" => vec!["bit"],
        "bitfield" => {
            let mut names = bitfield::MEMBER_TYPES.to_vec();
            names.push("members");
            names
        }
        "bundle" => {
            let mut names = SUPPORTED_TYPES.to_vec();
            names.push("members");
            names.push("alias");
            names
        }
        "string" | "data" => vec!["lengthPrefix", "validValue"],
        "list" => vec![
            "element",
            "countPrefix",
            "lengthPrefix",
            "elemLengthPrefix",
            "termSuffix",
        ],
        "optional" => {
            let mut names = SUPPORTED_TYPES.to_vec();
            names.push("field");
            names.push("and");
            names.push("or");
            names
        }
        "variant" => {
            let mut names = SUPPORTED_TYPES.to_vec();
            names.push("members");
            names
        }
        _ => Vec::new(),
    }
}

impl Field {
    /// Parses a field element, `reuse=` resolution included.
    pub(crate) fn parse(node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<Field> {
        let tag = node.name.as_str();
        if !SUPPORTED_TYPES.contains(&tag) {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                format!("Unknown field type \"{}\".", tag),
            ));
        }

        let mut props = node.props();
        xml::parse_children_as_props(node, COMMON_PROPS, ctx.logger, &mut props, true)?;
        let extra = extra_props(tag);
        if !extra.is_empty() {
            xml::parse_children_as_props(node, extra, ctx.logger, &mut props, true)?;
        }
        let possible = possible_props(tag);
        if !possible.is_empty() {
            xml::parse_children_as_props(node, possible, ctx.logger, &mut props, false)?;
        }

        let reused = Self::check_reuse(node, &props, tag, ctx)?;
        let (mut base, prev_kind) = match reused {
            Some(field) => (field.base, Some(field.kind)),
            None => (FieldBase::default(), None),
        };

        update_string_prop(node, &props, "name", &mut base.name, false, ctx)?;
        update_string_prop(node, &props, "displayName", &mut base.display_name, true, ctx)?;
        update_string_prop(node, &props, "description", &mut base.description, true, ctx)?;
        Self::update_versions(node, &props, &mut base, ctx)?;
        Self::update_semantic_type(node, &props, &mut base, ctx)?;

        for (prop, slot) in [
            ("pseudo", &mut base.pseudo),
            ("displayReadOnly", &mut base.display_read_only),
            ("displayHidden", &mut base.display_hidden),
            ("customizable", &mut base.customizable),
            ("failOnInvalid", &mut base.fail_on_invalid),
            ("forceGen", &mut base.force_gen),
        ] {
            update_bool_prop(node, &props, prop, slot, ctx)?;
        }

        let kind = Self::parse_kind(tag, node, &props, &base, prev_kind, ctx)?;

        let mut field = Field {
            loc: node.location().clone(),
            base,
            kind,
        };

        field.verify_semantic_type(node, ctx)?;
        field.verify_name(node, ctx)?;

        let mut known: Vec<&str> = COMMON_PROPS.to_vec();
        known.extend(extra);
        known.extend(possible);
        let prefixes = ctx.protocol.extra_element_prefixes();
        field
            .base
            .extra_attrs
            .extend(xml::extra_attrs(node, &known, prefixes, ctx.logger));

        known.extend(COMMON_CHILDREN);
        known.extend(extra_children(tag));
        field
            .base
            .extra_children
            .extend(xml::extra_children(node, &known, prefixes, ctx.logger));

        Ok(field)
    }

    fn check_reuse(
        node: &XmlNode,
        props: &PropsMap,
        tag: &str,
        ctx: &ParseCtx<'_>,
    ) -> Result<Option<Field>> {
        xml::validate_single_prop(node, props, "reuse", ctx.logger, false)?;
        let Some(ref_str) = props.get("reuse") else {
            return Ok(None);
        };

        let Some(other) = ctx.protocol.find_field(ref_str) else {
            return Err(ctx.err(
                ErrorKind::UnresolvedReference,
                node,
                format!("The field \"{}\" hasn't been recorded yet.", ref_str),
            ));
        };

        if other.kind.tag() != tag {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                format!("Cannot reuse field of different kind (\"{}\").", ref_str),
            ));
        }

        Ok(Some(other.clone()))
    }

    fn update_versions(
        node: &XmlNode,
        props: &PropsMap,
        base: &mut FieldBase,
        ctx: &ParseCtx<'_>,
    ) -> Result<()> {
        for prop in ["sinceVersion", "deprecated", "removed"] {
            xml::validate_single_prop(node, props, prop, ctx.logger, false)?;
        }

        let versioned = ctx.parent.versioned();
        let mut since = if versioned { ctx.parent.since } else { 0 };
        let mut deprecated = if versioned {
            ctx.parent.deprecated
        } else {
            NOT_YET_DEPRECATED
        };

        version::get_and_check_versions(
            node,
            &base.name,
            props,
            &mut since,
            &mut deprecated,
            ctx.schema().version,
            ctx.logger,
        )?;

        if !versioned {
            if since != 0 {
                ctx.warn(
                    node,
                    "Property \"sinceVersion\" is not applicable to this field, \
                     ignoring provided value",
                );
                since = 0;
            }
            if deprecated != NOT_YET_DEPRECATED {
                ctx.warn(
                    node,
                    "Property \"deprecated\" is not applicable to this field, \
                     ignoring provided value",
                );
                deprecated = NOT_YET_DEPRECATED;
            }
        }

        let mut removed = false;
        if let Some(value) = props.get("removed") {
            removed = text::parse_bool(value)
                .ok_or_else(|| xml::unexpected_prop_value(node, &base.name, "removed", value, ctx.logger))?;
            if removed && deprecated == NOT_YET_DEPRECATED {
                ctx.warn(
                    node,
                    "Property \"removed\" is not applicable to non deprecated fields",
                );
            }
        }

        base.since_version = since;
        base.deprecated_since = deprecated;
        base.deprecated_removed = removed;
        Ok(())
    }

    fn update_semantic_type(
        node: &XmlNode,
        props: &PropsMap,
        base: &mut FieldBase,
        ctx: &ParseCtx<'_>,
    ) -> Result<()> {
        xml::validate_single_prop(node, props, "semanticType", ctx.logger, false)?;
        let Some(value) = props.get("semanticType") else {
            return Ok(());
        };

        if value.is_empty() {
            base.semantic_type = SemanticType::None;
            return Ok(());
        }

        base.semantic_type = match value.to_ascii_lowercase().as_str() {
            "none" => SemanticType::None,
            "version" => SemanticType::Version,
            "messageid" => SemanticType::MessageId,
            "length" => SemanticType::Length,
            _ => {
                return Err(xml::unexpected_prop_value(
                    node,
                    &base.name,
                    "semanticType",
                    value,
                    ctx.logger,
                ))
            }
        };
        Ok(())
    }

    fn parse_kind(
        tag: &str,
        node: &XmlNode,
        props: &PropsMap,
        base: &FieldBase,
        prev: Option<FieldKind>,
        ctx: &ParseCtx<'_>,
    ) -> Result<FieldKind> {
        macro_rules! prev_as {
            ($variant:ident) => {
                match prev {
                    Some(FieldKind::$variant(state)) => Some(state),
                    _ => None,
                }
            };
        }

        let kind = match tag {
            "int" => FieldKind::Int(IntField::parse(node, props, base, prev_as!(Int), ctx)?),
            "float" => FieldKind::Float(FloatField::parse(node, props, base, prev_as!(Float), ctx)?),
            "enum" => FieldKind::Enum(EnumField::parse(node, props, base, prev_as!(Enum), ctx)?),
            "set" => FieldKind::Set(SetField::parse(node, props, base, prev_as!(Set), ctx)?),
            "bitfield" => {
                FieldKind::Bitfield(BitfieldField::parse(node, props, base, prev_as!(Bitfield), ctx)?)
            }
            "bundle" => FieldKind::Bundle(BundleField::parse(node, props, base, prev_as!(Bundle), ctx)?),
            "string" => FieldKind::Str(StringField::parse(node, props, base, prev_as!(Str), ctx)?),
            "data" => FieldKind::Data(DataField::parse(node, props, base, prev_as!(Data), ctx)?),
            "list" => FieldKind::List(ListField::parse(node, props, base, prev_as!(List), ctx)?),
            "ref" => FieldKind::Ref(RefField::parse(node, props, base, prev_as!(Ref), ctx)?),
            "optional" => {
                FieldKind::Optional(OptionalField::parse(node, props, base, prev_as!(Optional), ctx)?)
            }
            "variant" => {
                FieldKind::Variant(VariantField::parse(node, props, base, prev_as!(Variant), ctx)?)
            }
            _ => unreachable!("kind tag checked by the caller"),
        };
        Ok(kind)
    }

    fn verify_name(&self, node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<()> {
        if self.base.name.is_empty() {
            return Err(ctx.err(
                ErrorKind::BadXml,
                node,
                format!(
                    "Missing value for mandatory property \"name\" for \"{}\" element.",
                    node.name
                ),
            ));
        }

        if !text::is_valid_name(&self.base.name) {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                format!("Invalid value for name property \"{}\".", self.base.name),
            ));
        }
        Ok(())
    }

    fn verify_semantic_type(&self, node: &XmlNode, ctx: &ParseCtx<'_>) -> Result<()> {
        let target = if ctx.protocol.ref_inheritance_supported() {
            self.non_ref()
        } else {
            self
        };

        match self.base.semantic_type {
            SemanticType::None => Ok(()),
            SemanticType::Version => {
                if matches!(target.kind, FieldKind::Int(_)) {
                    return Ok(());
                }
                Err(ctx.err(
                    ErrorKind::SchemaRule,
                    node,
                    "Semantic type \"version\" is applicable only to \"int\" fields \
                     or \"ref\" to them.",
                ))
            }
            SemanticType::MessageId => {
                if matches!(target.kind, FieldKind::Enum(_)) {
                    return Ok(());
                }
                Err(ctx.err(
                    ErrorKind::SchemaRule,
                    node,
                    "Semantic type \"messageId\" is applicable only to \"enum\" fields.",
                ))
            }
            SemanticType::Length => {
                if !ctx.protocol.length_semantic_supported() {
                    return Err(ctx.err(
                        ErrorKind::SchemaRule,
                        node,
                        "Semantic type \"length\" supported only since DSL v2, please \
                         update \"dslVersion\" property of your schema.",
                    ));
                }

                let member_of_composite =
                    matches!(ctx.parent.kind, ParentKind::Bundle | ParentKind::Message);
                if matches!(target.kind, FieldKind::Int(_)) && member_of_composite {
                    return Ok(());
                }
                Err(ctx.err(
                    ErrorKind::SchemaRule,
                    node,
                    "Semantic type \"length\" is applicable only to \"int\" fields, and \
                     should be used only with members of \"bundle\" fields or messages.",
                ))
            }
        }
    }

    /// Post-parse verification against the already-parsed siblings of the
    /// containing bundle/message (detached prefixes, optional conditions).
    pub(crate) fn verify_siblings(&self, siblings: &[Field], ctx: &ParseCtx<'_>) -> Result<()> {
        match &self.kind {
            FieldKind::Optional(opt) => opt.verify_siblings(&self.loc, siblings, ctx),
            FieldKind::List(list) => list.verify_siblings(&self.loc, siblings, ctx),
            FieldKind::Str(s) => s.verify_siblings(&self.loc, siblings, ctx),
            FieldKind::Data(d) => d.verify_siblings(&self.loc, siblings, ctx),
            _ => Ok(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn location(&self) -> &Location {
        &self.loc
    }

    /// Resolves a dotted member path for alias verification.
    pub fn aliased_member(&self, path: &str) -> Option<&Field> {
        let (first, rest) = match path.split_once('.') {
            Some((first, rest)) => (first, rest),
            None => (path, ""),
        };

        let members = match &self.kind {
            FieldKind::Bundle(f) => &f.members,
            FieldKind::Bitfield(f) => &f.members,
            FieldKind::Ref(f) => return f.field.aliased_member(path),
            FieldKind::Optional(f) => return f.field.aliased_member(path),
            _ => return None,
        };

        let member = members.iter().find(|m| m.name() == first)?;
        if rest.is_empty() {
            Some(member)
        } else {
            member.aliased_member(rest)
        }
    }

    /// Follows `ref` indirections to the effective field.
    pub fn non_ref(&self) -> &Field {
        let mut current = self;
        while let FieldKind::Ref(r) = &current.kind {
            current = &r.field;
        }
        current
    }

    /// Minimal serialized length in bytes.
    pub fn min_length(&self) -> usize {
        match &self.kind {
            FieldKind::Int(f) => f.min_length(),
            FieldKind::Float(f) => f.length as usize,
            FieldKind::Enum(f) => f.min_length(),
            FieldKind::Set(f) => f.length as usize,
            FieldKind::Bitfield(f) => f.min_length(),
            FieldKind::Bundle(f) => f.members.iter().map(Field::min_length).sum(),
            FieldKind::Str(f) => f.min_length(),
            FieldKind::Data(f) => f.min_length(),
            FieldKind::List(f) => f.min_length(),
            FieldKind::Ref(f) => f.field.min_length(),
            FieldKind::Optional(_) => 0,
            FieldKind::Variant(_) => 0,
        }
    }

    /// Maximal serialized length in bytes, saturating.
    pub fn max_length(&self) -> usize {
        match &self.kind {
            FieldKind::Int(f) => f.length as usize,
            FieldKind::Float(f) => f.length as usize,
            FieldKind::Enum(f) => f.length as usize,
            FieldKind::Set(f) => f.length as usize,
            FieldKind::Bitfield(f) => f.min_length(),
            FieldKind::Bundle(f) => sum_max_lengths(&f.members),
            FieldKind::Str(f) => f.max_length(),
            FieldKind::Data(f) => f.max_length(),
            FieldKind::List(f) => f.max_length(),
            FieldKind::Ref(f) => f.field.max_length(),
            FieldKind::Optional(f) => f.field.max_length(),
            FieldKind::Variant(f) => f
                .members
                .iter()
                .map(Field::max_length)
                .max()
                .unwrap_or(0),
        }
    }

    /// Length in bits when used as a bitfield member.
    pub fn bit_length(&self) -> u32 {
        match &self.kind {
            FieldKind::Int(f) if f.bit_length != 0 => f.bit_length,
            FieldKind::Enum(f) if f.bit_length != 0 => f.bit_length,
            FieldKind::Set(f) if f.bit_length != 0 => f.bit_length,
            FieldKind::Ref(f) => {
                if f.bit_length != 0 {
                    f.bit_length
                } else {
                    f.field.bit_length()
                }
            }
            _ => (self.max_length() as u32) * 8,
        }
    }

    /// Can this field be compared against the literal `val` inside an
    /// optional-field condition?
    pub fn is_comparable_to_value(&self, val: &str, ctx: &ParseCtx<'_>) -> bool {
        match &self.kind {
            FieldKind::Int(f) => f.value_of(val, ctx).is_some(),
            FieldKind::Enum(f) => f.value_of(val, ctx).is_some(),
            FieldKind::Float(f) => f.value_of(val).is_some(),
            FieldKind::Set(_) => text::parse_bool(val).is_some(),
            FieldKind::Str(_) => true,
            FieldKind::Data(_) => text::parse_hex_bytes(val).is_some(),
            FieldKind::Ref(f) => f.field.is_comparable_to_value(val, ctx),
            _ => false,
        }
    }

    /// Can two dereferenced fields be compared against each other?
    pub fn is_comparable_to_field(&self, other: &Field) -> bool {
        let other = other.non_ref();
        let this = self.non_ref();
        if this.kind.tag() == other.kind.tag() {
            return true;
        }

        // Ints and enums share an integral value domain.
        matches!(
            (&this.kind, &other.kind),
            (FieldKind::Int(_), FieldKind::Enum(_)) | (FieldKind::Enum(_), FieldKind::Int(_))
        )
    }

    /// Does `name` dereference a checkable bit of this field?
    pub fn is_bit_checkable(&self, name: &str) -> bool {
        match &self.kind {
            FieldKind::Set(f) => f.bits.contains_key(name),
            FieldKind::Ref(f) => f.field.is_bit_checkable(name),
            _ => false,
        }
    }

    /// Resolves a member reference (`rest` relative to this field) to an
    /// integral value: specials of ints, values of enums, members of
    /// composites. An empty `rest` yields the field's default value.
    pub fn str_to_numeric(&self, rest: &str, ctx: &ParseCtx<'_>) -> Option<(i64, bool)> {
        match &self.kind {
            FieldKind::Int(f) => f.str_to_numeric(rest),
            FieldKind::Enum(f) => f.str_to_numeric(rest),
            FieldKind::Bitfield(f) => str_to_numeric_on_members(&f.members, rest, ctx),
            FieldKind::Bundle(f) => str_to_numeric_on_members(&f.members, rest, ctx),
            FieldKind::Ref(f) => f.field.str_to_numeric(rest, ctx),
            _ => None,
        }
    }

    pub fn str_to_fp(&self, rest: &str, ctx: &ParseCtx<'_>) -> Option<f64> {
        match &self.kind {
            FieldKind::Float(f) => f.str_to_fp(rest),
            FieldKind::Ref(f) => f.field.str_to_fp(rest, ctx),
            _ => self.str_to_numeric(rest, ctx).map(|(v, big)| {
                if big {
                    (v as u64) as f64
                } else {
                    v as f64
                }
            }),
        }
    }

    pub fn str_to_bool(&self, rest: &str, _ctx: &ParseCtx<'_>) -> Option<bool> {
        match &self.kind {
            FieldKind::Set(f) => f.str_to_bool(rest),
            FieldKind::Ref(f) => f.field.str_to_bool(rest, _ctx),
            _ => None,
        }
    }

    pub fn str_to_string(&self, rest: &str) -> Option<String> {
        match &self.kind {
            FieldKind::Str(f) if rest.is_empty() => Some(f.default_value.clone()),
            FieldKind::Ref(f) => f.field.str_to_string(rest),
            _ => None,
        }
    }

    pub fn str_to_data(&self, rest: &str) -> Option<Vec<u8>> {
        match &self.kind {
            FieldKind::Data(f) if rest.is_empty() => Some(f.default_value.clone()),
            FieldKind::Ref(f) => f.field.str_to_data(rest),
            _ => None,
        }
    }
}

fn str_to_numeric_on_members(
    members: &[Field],
    rest: &str,
    ctx: &ParseCtx<'_>,
) -> Option<(i64, bool)> {
    if rest.is_empty() {
        return None;
    }
    let (first, remaining) = match rest.split_once('.') {
        Some((first, remaining)) => (first, remaining),
        None => (rest, ""),
    };
    members
        .iter()
        .find(|m| m.name() == first)
        .and_then(|m| m.str_to_numeric(remaining, ctx))
}

pub(crate) fn sum_max_lengths(fields: &[Field]) -> usize {
    fields
        .iter()
        .fold(0usize, |acc, f| acc.saturating_add(f.max_length()))
}

/// Updates a string property if present; `allow_deref` additionally resolves
/// `^Field` references to another field's string default.
pub(crate) fn update_string_prop(
    node: &XmlNode,
    props: &PropsMap,
    name: &str,
    value: &mut String,
    allow_deref: bool,
    ctx: &ParseCtx<'_>,
) -> Result<()> {
    xml::validate_single_prop(node, props, name, ctx.logger, false)?;
    let Some(raw) = props.get(name) else {
        return Ok(());
    };

    if !allow_deref {
        *value = raw.clone();
        return Ok(());
    }

    match ctx.protocol.str_to_string_value(raw) {
        Some(resolved) => {
            *value = resolved;
            Ok(())
        }
        None => Err(xml::unexpected_prop_value(node, &node.name, name, raw, ctx.logger)),
    }
}

pub(crate) fn update_bool_prop(
    node: &XmlNode,
    props: &PropsMap,
    name: &str,
    value: &mut bool,
    ctx: &ParseCtx<'_>,
) -> Result<()> {
    xml::validate_single_prop(node, props, name, ctx.logger, false)?;
    let Some(raw) = props.get(name) else {
        return Ok(());
    };

    *value = text::parse_bool(raw)
        .ok_or_else(|| xml::unexpected_prop_value(node, &node.name, name, raw, ctx.logger))?;
    Ok(())
}

/// Ensures member field names are unique within one container.
pub(crate) fn validate_members_names(fields: &[Field], ctx: &ParseCtx<'_>) -> Result<()> {
    let mut used = std::collections::HashSet::new();
    for field in fields {
        if !used.insert(field.name()) {
            let msg = format!(
                "{}: Member field with name \"{}\" has already been defined.",
                field.location(),
                field.name()
            );
            ctx.logger.error(&msg);
            return Err(crate::error::Error::new(ErrorKind::DuplicateName, msg));
        }
    }
    Ok(())
}

/// Collects the member field nodes of a composite: either stand-alone
/// children of the allowed types, or a single `<wrapper>` child containing
/// only such types.
pub(crate) fn collect_member_nodes<'n>(
    node: &'n XmlNode,
    owner_tag: &str,
    wrapper: &str,
    allowed: &[&str],
    ctx: &ParseCtx<'_>,
) -> Result<Vec<&'n XmlNode>> {
    let wrappers = node.children_named(&[wrapper]);
    if wrappers.len() > 1 {
        return Err(ctx.err(
            ErrorKind::SchemaRule,
            node,
            format!(
                "Only single \"{}\" child element is supported for \"{}\".",
                wrapper, owner_tag
            ),
        ));
    }

    let standalone = node.children_named(allowed);
    if !wrappers.is_empty() && !standalone.is_empty() {
        return Err(ctx.err(
            ErrorKind::SchemaRule,
            node,
            format!(
                "The \"{}\" element does not support list of stand alone member fields as child \
                 elements together with \"{}\" child element.",
                owner_tag, wrapper
            ),
        ));
    }

    if wrappers.is_empty() && standalone.is_empty() {
        return Ok(Vec::new());
    }

    if !standalone.is_empty() {
        if node.child_count() != standalone.len() {
            return Err(ctx.err(
                ErrorKind::SchemaRule,
                node,
                format!(
                    "The member types of \"{}\" must be defined inside \"<{}>\" child element \
                     when there are other property describing children.",
                    owner_tag, wrapper
                ),
            ));
        }
        return Ok(standalone);
    }

    let wrapper_node = wrappers[0];
    let members = wrapper_node.children_named(allowed);
    if members.len() != wrapper_node.child_count() {
        return Err(ctx.err(
            ErrorKind::SchemaRule,
            wrapper_node,
            format!(
                "The \"{}\" child node of \"{}\" element must contain only supported types.",
                wrapper, owner_tag
            ),
        ));
    }
    Ok(members)
}

/// Extracts the single nested field definition from a `<wrapper>` child
/// element (`<lengthPrefix><int …/></lengthPrefix>` and friends).
pub(crate) fn single_field_in_wrapper<'n>(
    node: &'n XmlNode,
    wrapper: &str,
    ctx: &ParseCtx<'_>,
) -> Result<Option<&'n XmlNode>> {
    let wrappers = node.children_named(&[wrapper]);
    if wrappers.len() > 1 {
        return Err(ctx.err(
            ErrorKind::SchemaRule,
            node,
            format!("There must be only one occurrence of \"{}\" child element.", wrapper),
        ));
    }

    let Some(wrapper_node) = wrappers.first() else {
        return Ok(None);
    };

    let inner = wrapper_node.children_named(SUPPORTED_TYPES);
    if inner.len() != 1 || wrapper_node.child_count() != 1 {
        return Err(ctx.err(
            ErrorKind::SchemaRule,
            wrapper_node,
            format!(
                "The \"{}\" element is expected to define only single field.",
                wrapper
            ),
        ));
    }

    Ok(Some(inner[0]))
}

/// Count/length prefix attached to a string/data/list field.
#[derive(Debug, Clone)]
pub enum Prefix {
    /// Inline definition or deep copy of a referenced global field.
    Field(Box<Field>),
    /// Name of a sibling within the containing bundle/message.
    Detached(String),
}

/// Parses a prefix property (`lengthPrefix`, `countPrefix`,
/// `elemLengthPrefix`): a `$sibling` detached reference, a reference to a
/// recorded field, or an inline definition inside a same-named child
/// element.
pub(crate) fn parse_prefix(
    node: &XmlNode,
    props: &PropsMap,
    prop: &str,
    base: &FieldBase,
    ctx: &ParseCtx<'_>,
) -> Result<Option<Prefix>> {
    xml::validate_single_prop(node, props, prop, ctx.logger, false)?;

    let mut from_ref: Option<Prefix> = None;
    if let Some(value) = props.get(prop) {
        if let Some(detached) = value.strip_prefix('$') {
            check_detached_prefix_allowed(node, ctx)?;
            if !text::is_valid_name(detached) {
                return Err(xml::unexpected_prop_value(node, &node.name, prop, value, ctx.logger));
            }
            from_ref = Some(Prefix::Detached(detached.to_string()));
        } else {
            let Some(target) = ctx.protocol.find_field(value) else {
                return Err(ctx.err(
                    ErrorKind::UnresolvedReference,
                    node,
                    format!(
                        "Cannot find field referenced by \"{}\" property ({}).",
                        prop, value
                    ),
                ));
            };
            verify_prefix_field(node, prop, target, ctx)?;
            from_ref = Some(Prefix::Field(Box::new(target.clone())));
        }
    }

    let inline_node = single_field_in_wrapper(node, prop, ctx)?;
    match (from_ref, inline_node) {
        (Some(_), Some(_)) => Err(ctx.err(
            ErrorKind::SchemaRule,
            node,
            format!("There must be only one occurrence of \"{}\" definition.", prop),
        )),
        (Some(prefix), None) => Ok(Some(prefix)),
        (None, Some(field_node)) => {
            let member_ctx = ctx.child(crate::ctx::ParentInfo {
                kind: ParentKind::OtherField,
                since: base.since_version,
                deprecated: base.deprecated_since,
            });
            let field = Field::parse(field_node, &member_ctx)?;
            verify_prefix_field(field_node, prop, &field, ctx)?;
            Ok(Some(Prefix::Field(Box::new(field))))
        }
        (None, None) => Ok(None),
    }
}

pub(crate) fn verify_prefix_field(
    node: &XmlNode,
    prop: &str,
    field: &Field,
    ctx: &ParseCtx<'_>,
) -> Result<()> {
    match &field.non_ref().kind {
        FieldKind::Int(int) => {
            if !int.type_.is_unsigned() {
                ctx.warn(
                    node,
                    format!(
                        "Using signed \"int\" field as \"{}\" is not recommended.",
                        prop
                    ),
                );
            }
            Ok(())
        }
        _ => Err(ctx.err(
            ErrorKind::SchemaRule,
            node,
            format!("The \"{}\" field must be of \"int\" kind.", prop),
        )),
    }
}

/// Finds a named sibling for detached-prefix verification.
pub(crate) fn find_sibling<'f>(
    loc: &Location,
    siblings: &'f [Field],
    name: &str,
    ctx: &ParseCtx<'_>,
) -> Result<&'f Field> {
    siblings.iter().find(|f| f.name() == name).ok_or_else(|| {
        let msg = format!(
            "{}: The holding bundle/message does not contain field named \"{}\".",
            loc, name
        );
        ctx.logger.error(&msg);
        crate::error::Error::new(ErrorKind::UnresolvedReference, msg)
    })
}

/// Detached prefixes may only appear on members of bundles and messages.
pub(crate) fn check_detached_prefix_allowed(
    node: &XmlNode,
    ctx: &ParseCtx<'_>,
) -> Result<()> {
    if matches!(ctx.parent.kind, ParentKind::Bundle | ParentKind::Message) {
        return Ok(());
    }
    Err(ctx.err(
        ErrorKind::SchemaRule,
        node,
        "Detached prefixes are allowed only for members of \"bundle\" field or \"message\" object.",
    ))
}
