//! End-to-end generation tests: build a protocol from inline schema text
//! and drive the full emitter set into a temporary output directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use wiredsl::Protocol;
use wiredsl_build::Config;

const SCHEMA: &str = r#"
<schema name="Demo" id="1" version="2" dslVersion="2" endian="big">
    <fields>
        <enum name="MsgType" type="uint8" semanticType="messageId">
            <validValue name="Hello" val="1"/>
            <validValue name="Status" val="2"/>
        </enum>
        <set name="Flags" length="1">
            <bit name="HasName" idx="0"/>
        </set>
        <int name="Counter" type="uint16" defaultValue="5" customizable="true"/>
    </fields>
    <interface name="Common">
        <int name="version" type="uint8" semanticType="version"/>
    </interface>
    <message name="Hello" id="MsgType.Hello" sender="client">
        <ref name="flags" field="Flags"/>
        <optional name="name" cond="$flags.HasName">
            <string name="value" length="16"/>
        </optional>
    </message>
    <message name="Status" id="MsgType.Status" sender="server">
        <ref name="counter" field="Counter"/>
    </message>
    <frame name="Frame">
        <sync name="Sync"><int name="SyncField" type="uint16" defaultValue="0xCAFE"/></sync>
        <size name="Size"><int name="SizeField" type="uint16"/></size>
        <id name="Id"><ref name="IdField" field="MsgType"/></id>
        <payload name="Data"/>
    </frame>
</schema>
"#;

fn validated_protocol() -> Protocol {
    let mut protocol = Protocol::new();
    protocol.parse_str("demo.xml", SCHEMA).unwrap();
    protocol.validate().unwrap();
    protocol
}

fn read_tree(root: &Path) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    fn walk(dir: &Path, root: &Path, out: &mut BTreeMap<String, String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().to_string();
                out.insert(rel, fs::read_to_string(&path).unwrap());
            }
        }
    }
    walk(root, root, &mut files);
    files
}

#[test]
fn generates_full_output_tree() {
    let protocol = validated_protocol();
    let dir = tempfile::tempdir().unwrap();

    Config::new()
        .output_dir(dir.path())
        .protocol_version("1.2.3")
        .generate(&protocol)
        .unwrap();

    let files = read_tree(dir.path());

    // Build manifest names the project and the runtime dependency.
    let cmake = files.get("CMakeLists.txt").expect("build manifest");
    assert!(cmake.contains("project (\"demo\")"));
    assert!(cmake.contains("find_package(LibWirekit 2.2 REQUIRED)"));

    // Per-entity definition headers.
    assert!(files.contains_key("include/demo/field/MsgType.h"));
    assert!(files.contains_key("include/demo/field/MsgTypeCommon.h"));
    assert!(files.contains_key("include/demo/field/Flags.h"));
    assert!(files.contains_key("include/demo/field/Counter.h"));
    assert!(files.contains_key("include/demo/Common.h"));
    assert!(files.contains_key("include/demo/message/Hello.h"));
    assert!(files.contains_key("include/demo/message/Status.h"));
    assert!(files.contains_key("include/plugin/demo/message/Hello.h"));
    assert!(files.contains_key("include/demo/frame/Frame.h"));

    // Project-level artifacts.
    let msg_id = files.get("include/demo/MsgId.h").expect("MsgId.h");
    assert!(msg_id.contains("MsgId_Hello = 1,"));
    assert!(msg_id.contains("MsgId_Status = 2,"));

    let all_messages = files.get("include/demo/AllMessages.h").expect("AllMessages.h");
    assert!(all_messages.contains("demo::message::Hello<TBase, TOpt>"));
    assert!(all_messages.contains("demo::message::Status<TBase, TOpt>"));

    let server_input = files
        .get("include/demo/ServerInputMessages.h")
        .expect("ServerInputMessages.h");
    assert!(server_input.contains("demo::message::Hello<TBase, TOpt>"));
    assert!(!server_input.contains("demo::message::Status<TBase, TOpt>"));

    let version = files.get("include/demo/Version.h").expect("Version.h");
    assert!(version.contains("#define DEMO_SPEC_VERSION (2)"));
    assert!(version.contains("#define DEMO_MAJOR_VERSION (1U)"));

    let options = files.get("include/demo/DefaultOptions.h").expect("DefaultOptions.h");
    assert!(options.contains("using Counter = wirekit::option::EmptyOption;"));

    assert!(files.contains_key("include/demo/dispatch/DispatchMessage.h"));
    assert!(files.contains_key("include/demo/factory/MsgFactory.h"));

    // The optional field documents its existence condition.
    let hello = files.get("include/demo/message/Hello.h").unwrap();
    assert!(hello.contains("$flags.HasName"));
}

#[test]
fn generation_is_idempotent() {
    let protocol = validated_protocol();
    let dir = tempfile::tempdir().unwrap();

    let config = {
        let mut config = Config::new();
        config.output_dir(dir.path());
        config
    };

    config.generate(&protocol).unwrap();
    let first = read_tree(dir.path());
    config.generate(&protocol).unwrap();
    let second = read_tree(dir.path());

    assert_eq!(first, second);
}

#[test]
fn empty_schema_emits_only_project_artifacts() {
    let mut protocol = Protocol::new();
    protocol
        .parse_str(
            "x.xml",
            r#"<schema name="X" id="1" version="0" dslVersion="1" endian="little"/>"#,
        )
        .unwrap();
    protocol.validate().unwrap();

    let dir = tempfile::tempdir().unwrap();
    Config::new().output_dir(dir.path()).generate(&protocol).unwrap();

    let files = read_tree(dir.path());
    assert!(files.contains_key("CMakeLists.txt"));
    assert!(files.contains_key("include/x/AllMessages.h"));
    assert!(files.contains_key("include/x/MsgId.h"));
    assert!(!files.keys().any(|k| k.contains("/field/")));
    assert!(!files.keys().any(|k| k.contains("/message/")));

    let cmake = files.get("CMakeLists.txt").unwrap();
    assert!(cmake.contains("project (\"x\")"));
}

#[test]
fn custom_code_replaces_generated_file() {
    let protocol = validated_protocol();
    let out_dir = tempfile::tempdir().unwrap();
    let input_dir = tempfile::tempdir().unwrap();

    let custom_dir = input_dir.path().join("demo/field");
    fs::create_dir_all(&custom_dir).unwrap();
    fs::write(custom_dir.join("Counter.h_replace"), "// handcrafted\n").unwrap();

    Config::new()
        .output_dir(out_dir.path())
        .input_dir(input_dir.path())
        .generate(&protocol)
        .unwrap();

    let written = fs::read_to_string(out_dir.path().join("include/demo/field/Counter.h")).unwrap();
    assert_eq!("// handcrafted\n", written);
}

#[test]
fn namespace_override_renames_the_tree() {
    let protocol = validated_protocol();
    let dir = tempfile::tempdir().unwrap();

    Config::new()
        .output_dir(dir.path())
        .namespace_override("proto")
        .generate(&protocol)
        .unwrap();

    let files = read_tree(dir.path());
    assert!(files.contains_key("include/proto/AllMessages.h"));
    assert!(files.get("CMakeLists.txt").unwrap().contains("project (\"proto\")"));
}

#[test]
fn extra_input_bundle_gets_its_aggregate() {
    let protocol = validated_protocol();
    let dir = tempfile::tempdir().unwrap();

    Config::new()
        .output_dir(dir.path())
        .extra_input_bundle("Startup=Hello")
        .generate(&protocol)
        .unwrap();

    let files = read_tree(dir.path());
    let bundle = files
        .get("include/demo/StartupMessages.h")
        .expect("StartupMessages.h");
    assert!(bundle.contains("demo::message::Hello<TBase, TOpt>"));
    assert!(!bundle.contains("demo::message::Status<TBase, TOpt>"));
}
