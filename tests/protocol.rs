//! End-to-end schema parsing and validation tests driving [`Protocol`]
//! from inline schema text.

use pretty_assertions::assert_eq;
use wiredsl::{
    CondExpr, ErrorKind, Field, FieldKind, Level, Logger, OptCond, Protocol, SemanticType,
};

fn parse_all(schemas: &[&str]) -> Result<Protocol, wiredsl::Error> {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut protocol = Protocol::new();
    protocol.set_min_level(Level::Error);
    for (idx, schema) in schemas.iter().enumerate() {
        protocol.parse_str(&format!("schema{}.xml", idx), schema)?;
    }
    protocol.validate()?;
    Ok(protocol)
}

fn parse(schema: &str) -> Protocol {
    parse_all(&[schema]).expect("schema expected to validate")
}

fn parse_err(schema: &str) -> wiredsl::Error {
    parse_all(&[schema]).expect_err("schema expected to fail")
}

fn global_field<'p>(protocol: &'p Protocol, name: &str) -> &'p Field {
    protocol
        .namespaces()
        .get("")
        .expect("global namespace")
        .find_field(name)
        .expect("field")
}

#[test]
fn empty_schema_parses_cleanly() {
    let protocol = parse(r#"<schema name="X" id="1" version="0" dslVersion="1" endian="little"/>"#);
    assert_eq!("X", protocol.schema().name);
    assert_eq!(0, protocol.schema().version);
    assert!(protocol.all_messages().is_empty());
    assert!(protocol.logger().error_count() == 0);
}

#[test]
fn single_message_with_single_int_field() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="0">
               <fields>
                   <int name="F1" type="uint16" defaultValue="0"/>
               </fields>
               <message name="M1" id="1">
                   <ref name="F1" field="F1"/>
               </message>
           </schema>"#,
    );

    let ns = protocol.namespaces().get("").unwrap();
    assert!(ns.find_field("F1").is_some());
    let msg = ns.find_message("M1").unwrap();
    assert_eq!(1, msg.id);
    assert_eq!(2, msg.min_length());
    assert_eq!(2, msg.max_length());

    let all = protocol.all_messages();
    assert_eq!(vec!["M1"], all.iter().map(|m| m.name.as_str()).collect::<Vec<_>>());
}

#[test]
fn field_lookup_folds_first_character_case() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="0">
               <fields><int name="SomeField" type="uint8"/></fields>
           </schema>"#,
    );
    assert!(protocol.find_field("someField").is_some());
    assert!(protocol.find_field("SomeField").is_some());
    assert!(protocol.find_field("somefield").is_none());
}

#[test]
fn bitfield_members_must_align_to_byte_boundary() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0">
               <fields>
                   <bitfield name="B">
                       <int name="m1" type="uint8" bitLength="3"/>
                       <int name="m2" type="uint8" bitLength="4"/>
                   </bitfield>
               </fields>
           </schema>"#,
    );
    assert_eq!(ErrorKind::SchemaRule, err.kind());
    assert!(err.to_string().contains("bit lengths (7)"));
}

#[test]
fn bitfield_of_full_byte_parses() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="0">
               <fields>
                   <bitfield name="B">
                       <int name="m1" type="uint8" bitLength="3"/>
                       <int name="m2" type="uint8" bitLength="5"/>
                   </bitfield>
               </fields>
           </schema>"#,
    );
    let field = global_field(&protocol, "B");
    assert_eq!(1, field.min_length());
    assert_eq!(8, field.bit_length());
}

#[test]
fn optional_with_sibling_bit_condition() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="0">
               <fields>
                   <bundle name="B">
                       <set name="Flags" length="1">
                           <bit name="HasName" idx="0"/>
                       </set>
                       <optional name="Name" cond="$Flags.HasName">
                           <string name="NameStr" length="8"/>
                       </optional>
                   </bundle>
               </fields>
           </schema>"#,
    );

    let bundle = match &global_field(&protocol, "B").kind {
        FieldKind::Bundle(bundle) => bundle,
        other => panic!("expected bundle, got {:?}", other.tag()),
    };

    let optional = match &bundle.members[1].kind {
        FieldKind::Optional(optional) => optional,
        other => panic!("expected optional, got {:?}", other.tag()),
    };

    assert_eq!(
        Some(OptCond::Expr(CondExpr {
            left: String::new(),
            op: String::new(),
            right: "$Flags.HasName".to_string(),
        })),
        optional.cond
    );
}

#[test]
fn optional_condition_referencing_missing_sibling_fails() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0">
               <fields>
                   <bundle name="B">
                       <set name="Flags" length="1">
                           <bit name="HasName" idx="0"/>
                       </set>
                       <optional name="Name" cond="$Missing.X">
                           <string name="NameStr" length="8"/>
                       </optional>
                   </bundle>
               </fields>
           </schema>"#,
    );
    assert_eq!(ErrorKind::UnresolvedReference, err.kind());
}

#[test]
fn optional_condition_incompatible_comparison_fails() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0">
               <fields>
                   <bundle name="B">
                       <int name="I" type="uint8"/>
                       <optional name="O" cond="$I = abc">
                           <int name="Inner" type="uint8"/>
                       </optional>
                   </bundle>
               </fields>
           </schema>"#,
    );
    assert_eq!(ErrorKind::ConditionError, err.kind());
}

#[test]
fn duplicate_message_id_is_rejected() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0">
               <message name="M1" id="7"/>
               <message name="M2" id="7"/>
           </schema>"#,
    );
    assert_eq!(ErrorKind::DuplicateName, err.kind());
    assert!(err.to_string().contains("M1"));
    assert!(err.to_string().contains("M2"));
}

#[test]
fn duplicate_message_id_allowed_with_distinct_order() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="0" nonUniqueMsgIdAllowed="true">
               <message name="M1" id="7"/>
               <message name="M2" id="7" order="1"/>
           </schema>"#,
    );
    let all = protocol.all_messages();
    assert_eq!(2, all.len());
    assert_eq!("M1", all[0].name);
    assert_eq!("M2", all[1].name);
}

#[test]
fn frame_checksum_after_payload_is_rejected() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0">
               <frame name="F">
                   <sync name="Sync"><int name="SyncField" type="uint16" defaultValue="0x1ACF"/></sync>
                   <size name="Size"><int name="SizeField" type="uint16"/></size>
                   <id name="Id"><int name="IdField" type="uint8"/></id>
                   <payload name="Data"/>
                   <checksum name="Checksum" alg="crc-16" from="Size">
                       <int name="ChecksumField" type="uint16"/>
                   </checksum>
               </frame>
           </schema>"#,
    );
    assert_eq!(ErrorKind::SchemaRule, err.kind());
}

#[test]
fn frame_checksum_until_unknown_layer_is_unresolved() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0">
               <frame name="F">
                   <sync name="Sync"><int name="SyncField" type="uint16" defaultValue="0x1ACF"/></sync>
                   <checksum name="Checksum" alg="crc-16" until="NoSuch">
                       <int name="ChecksumField" type="uint16"/>
                   </checksum>
                   <payload name="Data"/>
               </frame>
           </schema>"#,
    );
    assert_eq!(ErrorKind::UnresolvedReference, err.kind());
}

#[test]
fn frame_with_orderly_layers_parses() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="0">
               <frame name="F">
                   <sync name="Sync"><int name="SyncField" type="uint16" defaultValue="0x1ACF"/></sync>
                   <size name="Size"><int name="SizeField" type="uint16"/></size>
                   <id name="Id"><int name="IdField" type="uint8"/></id>
                   <checksum name="Checksum" alg="sum" from="Size" until="Data">
                       <int name="ChecksumField" type="uint16"/>
                   </checksum>
                   <payload name="Data"/>
               </frame>
           </schema>"#,
    );
    let frame = protocol.namespaces().get("").unwrap().find_frame("F").unwrap();
    assert_eq!(5, frame.layers.len());
    assert_eq!("Data", frame.layers.last().unwrap().name);
}

#[test]
fn reuse_copies_validated_state() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="0">
               <fields>
                   <int name="A" type="uint16" defaultValue="5" units="mm"/>
                   <int name="B" reuse="A" serOffset="2"/>
               </fields>
           </schema>"#,
    );

    let field = global_field(&protocol, "B");
    match &field.kind {
        FieldKind::Int(int) => {
            assert_eq!(5, int.default_value);
            assert_eq!("mm", int.units);
            assert_eq!(2, int.ser_offset);
        }
        other => panic!("expected int, got {:?}", other.tag()),
    }
}

#[test]
fn reuse_of_unknown_field_is_unresolved() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0">
               <fields><int name="B" reuse="NoSuch" type="uint8"/></fields>
           </schema>"#,
    );
    assert_eq!(ErrorKind::UnresolvedReference, err.kind());
}

#[test]
fn reuse_cannot_change_field_kind() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0">
               <fields>
                   <int name="A" type="uint16"/>
                   <string name="B" reuse="A"/>
               </fields>
           </schema>"#,
    );
    assert_eq!(ErrorKind::SchemaRule, err.kind());
}

#[test]
fn copy_fields_from_drops_removed_fields() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="3">
               <message name="M1" id="1">
                   <int name="f1" type="uint8" sinceVersion="1" deprecated="2" removed="true"/>
                   <int name="f2" type="uint8"/>
               </message>
               <message name="M2" id="2" sinceVersion="2" copyFieldsFrom="M1"/>
           </schema>"#,
    );

    let ns = protocol.namespaces().get("").unwrap();
    assert_eq!(2, ns.find_message("M1").unwrap().fields.len());

    let m2 = ns.find_message("M2").unwrap();
    assert_eq!(1, m2.fields.len());
    assert_eq!("f2", m2.fields[0].name());
    assert_eq!(2, m2.fields[0].base.since_version);
}

#[test]
fn since_version_beyond_schema_version_fails() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="2">
               <message name="M1" id="1" sinceVersion="3"/>
           </schema>"#,
    );
    assert_eq!(ErrorKind::VersionError, err.kind());
}

#[test]
fn namespaces_reopen_across_files() {
    let protocol = parse_all(&[
        r#"<schema name="X" id="1" version="0">
               <ns name="n1" description="First">
                   <fields><int name="A" type="uint8"/></fields>
               </ns>
           </schema>"#,
        r#"<schema name="X">
               <ns name="n1">
                   <message name="M1" id="1"><ref name="A" field="n1.A"/></message>
               </ns>
           </schema>"#,
    ])
    .unwrap();

    let ns = protocol.namespaces().get("n1").unwrap();
    assert_eq!("First", ns.description);
    assert!(ns.find_field("A").is_some());
    assert!(ns.find_message("M1").is_some());
    assert_eq!("n1.M1", protocol.all_messages()[0].external_ref);
}

#[test]
fn schema_redeclaration_must_agree() {
    let err = parse_all(&[
        r#"<schema name="X" id="1" version="0"/>"#,
        r#"<schema name="X" id="2"/>"#,
    ])
    .expect_err("id mismatch");
    assert_eq!(ErrorKind::SchemaRule, err.kind());
}

#[test]
fn message_platform_must_be_declared() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0">
               <platforms><platform name="p1"/></platforms>
               <message name="M1" id="1" platforms="+p2"/>
           </schema>"#,
    );
    assert_eq!(ErrorKind::UnresolvedReference, err.kind());
}

#[test]
fn message_platform_exclusion_list() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="0">
               <platforms>
                   <platform name="p1"/>
                   <platform name="p2"/>
               </platforms>
               <message name="M1" id="1" platforms="-p1"/>
           </schema>"#,
    );
    assert_eq!(vec!["p2".to_string()], protocol.all_messages()[0].platforms);
}

#[test]
fn message_id_can_reference_enum_value() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="0" dslVersion="2">
               <fields>
                   <enum name="MsgType" type="uint8" semanticType="messageId">
                       <validValue name="M1" val="5"/>
                   </enum>
               </fields>
               <message name="M1" id="MsgType.M1"/>
           </schema>"#,
    );
    assert_eq!(5, protocol.all_messages()[0].id);
}

#[test]
fn only_single_message_id_field_allowed() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0">
               <fields>
                   <enum name="E1" type="uint8" semanticType="messageId">
                       <validValue name="V" val="0"/>
                   </enum>
                   <enum name="E2" type="uint8" semanticType="messageId">
                       <validValue name="V" val="0"/>
                   </enum>
               </fields>
           </schema>"#,
    );
    assert_eq!(ErrorKind::SchemaRule, err.kind());
}

#[test]
fn message_id_semantic_only_on_enums() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0">
               <fields><string name="S" semanticType="messageId" length="4"/></fields>
           </schema>"#,
    );
    assert_eq!(ErrorKind::SchemaRule, err.kind());
}

#[test]
fn enum_value_outside_type_range_is_rejected() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0">
               <fields>
                   <enum name="E" type="uint8">
                       <validValue name="V" val="300"/>
                   </enum>
               </fields>
           </schema>"#,
    );
    assert_eq!(ErrorKind::SchemaRule, err.kind());
}

#[test]
fn enum_value_outside_serialization_bits_warns_only() {
    let warnings = std::rc::Rc::new(std::cell::Cell::new(0usize));
    let warnings2 = std::rc::Rc::clone(&warnings);
    let logger = Logger::new(Box::new(move |level, _| {
        if level == Level::Warning {
            warnings2.set(warnings2.get() + 1);
        }
    }));

    let mut protocol = Protocol::with_logger(logger);
    protocol
        .parse_str(
            "s.xml",
            r#"<schema name="X" id="1" version="0">
                   <fields>
                       <enum name="E" type="uint16" length="1">
                           <validValue name="V" val="300"/>
                       </enum>
                   </fields>
               </schema>"#,
        )
        .unwrap();
    protocol.validate().unwrap();
    assert_eq!(1, warnings.get());
}

#[test]
fn list_with_count_and_length_prefix_is_rejected() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0">
               <fields>
                   <list name="L">
                       <element><int name="Elem" type="uint8"/></element>
                       <countPrefix><int name="Count" type="uint8"/></countPrefix>
                       <lengthPrefix><int name="Length" type="uint8"/></lengthPrefix>
                   </list>
               </fields>
           </schema>"#,
    );
    assert_eq!(ErrorKind::SchemaRule, err.kind());
}

#[test]
fn uint64_ser_offset_underflow_is_rejected() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0">
               <fields><int name="F" type="uint64" serOffset="-1"/></fields>
           </schema>"#,
    );
    assert_eq!(ErrorKind::SchemaRule, err.kind());
}

#[test]
fn small_negative_ser_offset_shifts_raw_bounds() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="0">
               <fields>
                   <int name="Signed" type="int32" serOffset="-10"/>
                   <int name="Unsigned" type="uint16" serOffset="-5"/>
               </fields>
           </schema>"#,
    );

    match &global_field(&protocol, "Signed").kind {
        FieldKind::Int(int) => {
            assert_eq!(-10, int.ser_offset);
            // The raw minimum rises so that raw + offset still fits int32.
            assert_eq!(i64::from(i32::MIN) + 10, int.min_value);
            assert_eq!(i64::from(i32::MAX), int.max_value);
        }
        other => panic!("expected int, got {:?}", other.tag()),
    }

    match &global_field(&protocol, "Unsigned").kind {
        FieldKind::Int(int) => {
            assert_eq!(5, int.min_value);
            assert_eq!(i64::from(u16::MAX), int.max_value);
        }
        other => panic!("expected int, got {:?}", other.tag()),
    }
}

#[test]
fn detached_prefix_binds_to_int_sibling() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="0">
               <message name="M1" id="1">
                   <int name="len" type="uint8"/>
                   <string name="S" lengthPrefix="$len"/>
               </message>
           </schema>"#,
    );
    let msg = protocol.namespaces().get("").unwrap().find_message("M1").unwrap();
    assert_eq!(2, msg.fields.len());
}

#[test]
fn detached_prefix_missing_sibling_is_unresolved() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0">
               <message name="M1" id="1">
                   <int name="len" type="uint8"/>
                   <string name="S" lengthPrefix="$nosuch"/>
               </message>
           </schema>"#,
    );
    assert_eq!(ErrorKind::UnresolvedReference, err.kind());
}

#[test]
fn string_default_dereferences_other_field() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="0" dslVersion="2">
               <fields>
                   <string name="A" defaultValue="hello" length="8"/>
                   <string name="B" defaultValue="^A" length="8"/>
               </fields>
           </schema>"#,
    );

    match &global_field(&protocol, "B").kind {
        FieldKind::Str(s) => assert_eq!("hello", s.default_value),
        other => panic!("expected string, got {:?}", other.tag()),
    }
}

#[test]
fn parsed_entity_names_round_trip() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="0">
               <fields>
                   <int name="F1" type="uint8"/>
                   <enum name="E1" type="uint8"><validValue name="V" val="0"/></enum>
               </fields>
               <ns name="n1">
                   <fields><int name="F2" type="uint8"/></fields>
                   <message name="M1" id="1"/>
               </ns>
               <message name="M2" id="2"/>
           </schema>"#,
    );

    let global = protocol.namespaces().get("").unwrap();
    let mut global_fields: Vec<_> = global.fields().map(|f| f.name()).collect();
    global_fields.sort();
    assert_eq!(vec!["E1", "F1"], global_fields);

    let n1 = protocol.namespaces().get("n1").unwrap();
    assert_eq!(vec!["F2"], n1.fields().map(|f| f.name()).collect::<Vec<_>>());
    assert_eq!(vec!["M1"], n1.messages().map(|m| m.name.as_str()).collect::<Vec<_>>());
    assert_eq!(
        vec!["M1", "M2"],
        protocol.all_messages().iter().map(|m| m.name.as_str()).collect::<Vec<_>>()
    );
}

#[test]
fn semantic_length_requires_measurable_sibling() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="0" dslVersion="2">
               <fields>
                   <bundle name="B">
                       <int name="len" type="uint8" semanticType="length"/>
                       <string name="S" lengthPrefix="$len"/>
                   </bundle>
               </fields>
           </schema>"#,
    );
    match &global_field(&protocol, "B").kind {
        FieldKind::Bundle(bundle) => {
            assert_eq!(
                SemanticType::Length,
                bundle.members[0].base.semantic_type
            );
        }
        other => panic!("expected bundle, got {:?}", other.tag()),
    }
}

#[test]
fn two_length_members_in_bundle_are_rejected() {
    let err = parse_err(
        r#"<schema name="X" id="1" version="0" dslVersion="2">
               <fields>
                   <bundle name="B">
                       <int name="len1" type="uint8" semanticType="length"/>
                       <int name="len2" type="uint8" semanticType="length"/>
                       <string name="S" lengthPrefix="$len1"/>
                   </bundle>
               </fields>
           </schema>"#,
    );
    assert_eq!(ErrorKind::SchemaRule, err.kind());
}

#[test]
fn variant_members_and_default_index() {
    let protocol = parse(
        r#"<schema name="X" id="1" version="0">
               <fields>
                   <variant name="V" defaultMember="P2">
                       <bundle name="P1"><int name="key" type="uint8" defaultValue="1"/></bundle>
                       <bundle name="P2"><int name="key" type="uint8" defaultValue="2"/></bundle>
                   </variant>
               </fields>
           </schema>"#,
    );

    match &global_field(&protocol, "V").kind {
        FieldKind::Variant(variant) => {
            assert_eq!(2, variant.members.len());
            assert_eq!(Some(1), variant.default_member);
        }
        other => panic!("expected variant, got {:?}", other.tag()),
    }
}
