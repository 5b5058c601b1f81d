//! End-to-end scenarios: Go source in, schema out.

use std::rc::Rc;

use indoc::indoc;

use crate::error::Error;
use crate::go::parse::parse_file;
use crate::go::Package;
use crate::schema::{Schema, TypeKind, VarKind};

use super::{Parser, Target, parse_package};

fn load(src: &str) -> Package {
    let file = parse_file("api.go", src).unwrap();
    Package::check("test".to_owned(), vec![file]).unwrap()
}

fn targets(src: &str) -> Vec<Target> {
    parse_package(&load(src)).unwrap()
}

fn schema(src: &str) -> Rc<Schema> {
    let mut targets = targets(src);
    assert!(!targets.is_empty(), "no targets discovered");
    targets.remove(0).schema.unwrap()
}

// MARK: Struct field table

const FIELD_TEMPLATE: &str = r#"package test

import (
	"context"
	"time"

	"github.com/google/uuid"
)

type TestStruct struct {
	//FIELD
}

//go:webrpc json -out=/dev/null
type TestAPI interface {
	Test(ctx context.Context) (tst *TestStruct, err error)
}

type Number int

type Locale string

func (l Locale) MarshalText() ([]byte, error)     { return []byte(l), nil }
func (l *Locale) UnmarshalText(data []byte) error { return nil }

type Tag struct {
	ID   int64
	Name string
}
"#;

struct Want {
    name: &'static str,
    expr: &'static str,
    optional: bool,
    go_name: &'static str,
    go_type: &'static str,
    go_import: Option<&'static str>,
    json_tag: Option<&'static str>,
}

fn test_struct_field(field: &str, want: Option<Want>) {
    let src = FIELD_TEMPLATE.replace("//FIELD", field);
    let schema = schema(&src);
    let def = schema.get_type("TestStruct").expect("TestStruct registered");
    let def = def.borrow();
    let Some(want) = want else {
        assert!(
            def.fields.is_empty(),
            "expected no fields for {field:?}, got {:?}",
            def.fields.iter().map(|f| &f.name).collect::<Vec<_>>()
        );
        return;
    };

    assert_eq!(def.fields.len(), 1, "field {field:?}");
    let got = &def.fields[0];
    assert_eq!(got.name, want.name, "field {field:?}");
    assert_eq!(
        got.ty.as_ref().unwrap().borrow().expr,
        want.expr,
        "field {field:?}"
    );
    assert_eq!(got.optional, want.optional, "field {field:?}");

    let mut meta = vec![
        ("go.field.name", want.go_name.to_owned()),
        ("go.field.type", want.go_type.to_owned()),
    ];
    if let Some(import) = want.go_import {
        meta.push(("go.type.import", import.to_owned()));
    }
    if let Some(tag) = want.json_tag {
        meta.push(("go.tag.json", tag.to_owned()));
    }
    let got_meta: Vec<(&str, String)> = got
        .meta
        .iter()
        .map(|m| (m.key.as_str(), m.value.clone()))
        .collect();
    assert_eq!(got_meta, meta, "field {field:?}");
}

#[test]
fn struct_field_json_tags() {
    test_struct_field(
        "ID int64",
        Some(Want {
            name: "ID",
            expr: "int64",
            optional: false,
            go_name: "ID",
            go_type: "int64",
            go_import: None,
            json_tag: None,
        }),
    );
    // Unexported fields are skipped entirely.
    test_struct_field("id int64", None);
    // `json:"-"` never reaches the schema.
    test_struct_field(r#"ID int64 `json:"-"`"#, None);
    test_struct_field(
        "ID *int64",
        Some(Want {
            name: "ID",
            expr: "int64",
            optional: true,
            go_name: "ID",
            go_type: "*int64",
            go_import: None,
            json_tag: None,
        }),
    );
    test_struct_field(
        r#"ID int64 `json:"renamed_id"`"#,
        Some(Want {
            name: "renamed_id",
            expr: "int64",
            optional: false,
            go_name: "ID",
            go_type: "int64",
            go_import: None,
            json_tag: Some("renamed_id"),
        }),
    );
    test_struct_field(
        r#"ID int64 `json:",string"`"#,
        Some(Want {
            name: "ID",
            expr: "string",
            optional: false,
            go_name: "ID",
            go_type: "int64",
            go_import: None,
            json_tag: Some(",string"),
        }),
    );
    test_struct_field(
        r#"ID int64 `json:"id,string,omitempty"`"#,
        Some(Want {
            name: "id",
            expr: "string",
            optional: true,
            go_name: "ID",
            go_type: "*int64",
            go_import: None,
            json_tag: Some("id,string,omitempty"),
        }),
    );
}

#[test]
fn struct_field_timestamps() {
    test_struct_field(
        "CreatedAt time.Time",
        Some(Want {
            name: "CreatedAt",
            expr: "timestamp",
            optional: false,
            go_name: "CreatedAt",
            go_type: "time.Time",
            go_import: None,
            json_tag: None,
        }),
    );
    test_struct_field(
        "DeletedAt *time.Time",
        Some(Want {
            name: "DeletedAt",
            expr: "timestamp",
            optional: true,
            go_name: "DeletedAt",
            go_type: "*time.Time",
            go_import: None,
            json_tag: None,
        }),
    );
}

#[test]
fn struct_field_named_and_marshaler_types() {
    // A named basic renders as its underlying kind.
    test_struct_field(
        "Number Number",
        Some(Want {
            name: "Number",
            expr: "int",
            optional: false,
            go_name: "Number",
            go_type: "Number",
            go_import: None,
            json_tag: None,
        }),
    );
    // TextMarshaler types serialize as strings.
    test_struct_field(
        "LocaleString Locale",
        Some(Want {
            name: "LocaleString",
            expr: "string",
            optional: false,
            go_name: "LocaleString",
            go_type: "Locale",
            go_import: None,
            json_tag: None,
        }),
    );
    test_struct_field(
        "ID uuid.UUID",
        Some(Want {
            name: "ID",
            expr: "string",
            optional: false,
            go_name: "ID",
            go_type: "uuid.UUID",
            go_import: Some("github.com/google/uuid"),
            json_tag: None,
        }),
    );
}

#[test]
fn struct_field_composites() {
    test_struct_field(
        "Tags []Tag",
        Some(Want {
            name: "Tags",
            expr: "[]Tag",
            optional: false,
            go_name: "Tags",
            go_type: "[]Tag",
            go_import: None,
            json_tag: None,
        }),
    );
    test_struct_field(
        "Counts map[string]int64",
        Some(Want {
            name: "Counts",
            expr: "map<string,int64>",
            optional: false,
            go_name: "Counts",
            go_type: "map[string]int64",
            go_import: None,
            json_tag: None,
        }),
    );
}

// MARK: Scenarios

#[test]
fn simple_crud_interface() {
    let schema = schema(indoc! {r#"
        package test

        import "context"

        //go:webrpc json -out=./petstore.gen.json
        type PetStore interface {
            GetPet(ctx context.Context, ID int64) (pet *Pet, err error)
            ListPets(ctx context.Context) (pets []*Pet, err error)
            DeletePet(ctx context.Context, ID int64) error
        }

        type Pet struct {
            ID   int64
            Name string
        }
    "#});

    assert_eq!(schema.schema_name, "PetStore");
    assert_eq!(schema.services.len(), 1);
    let service = &schema.services[0];
    assert_eq!(service.name, "PetStore");
    let names: Vec<_> = service.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["GetPet", "ListPets", "DeletePet"]);

    let get_pet = &service.methods[0];
    assert_eq!(get_pet.inputs.len(), 1);
    assert_eq!(get_pet.inputs[0].name, "ID");
    assert_eq!(get_pet.inputs[0].ty.borrow().expr, "int64");
    assert_eq!(get_pet.outputs.len(), 1);
    assert_eq!(get_pet.outputs[0].name, "pet");
    assert_eq!(get_pet.outputs[0].ty.borrow().expr, "Pet");

    let list_pets = &service.methods[1];
    assert_eq!(list_pets.outputs[0].name, "pets");
    assert_eq!(list_pets.outputs[0].ty.borrow().expr, "[]Pet");

    assert!(service.methods[2].outputs.is_empty());

    // `Pet` is registered exactly once despite three references.
    let pets: Vec<_> = schema
        .types
        .iter()
        .filter(|t| t.borrow().name == "Pet")
        .collect();
    assert_eq!(pets.len(), 1);
    assert_eq!(pets[0].borrow().fields.len(), 2);
}

#[test]
fn unnamed_arguments_are_synthesized() {
    let schema = schema(indoc! {r#"
        package test

        import "context"

        //go:webrpc json -out=/dev/null
        type API interface {
            Get(context.Context, int64) (*Pet, error)
        }

        type Pet struct {
            Name string
        }
    "#});

    let method = &schema.services[0].methods[0];
    assert_eq!(method.inputs.len(), 1);
    assert_eq!(method.inputs[0].name, "arg1");
    assert_eq!(method.outputs.len(), 1);
    assert_eq!(method.outputs[0].name, "ret1");
    assert_eq!(method.outputs[0].ty.borrow().expr, "Pet");
}

#[test]
fn embedded_field_override() {
    let schema = schema(indoc! {r#"
        package test

        import "context"

        //go:webrpc json -out=/dev/null
        type API interface {
            Get(ctx context.Context) (a *A, err error)
        }

        type Base struct {
            Name string
            ID   int64
        }

        type A struct {
            Base
            Name Locale
        }

        type Locale string

        func (l Locale) MarshalText() ([]byte, error)     { return []byte(l), nil }
        func (l *Locale) UnmarshalText(data []byte) error { return nil }
    "#});

    let a = schema.get_type("A").unwrap();
    let a = a.borrow();
    let order: Vec<_> = a.fields.iter().map(|f| f.name.as_str()).collect();
    // The directly declared `Name` shadows the embedded one and lands
    // at the end.
    assert_eq!(order, ["ID", "Name"]);
    let name = &a.fields[1];
    assert_eq!(name.ty.as_ref().unwrap().borrow().expr, "string");
    assert!(
        name.meta
            .iter()
            .any(|m| m.key == "go.field.type" && m.value == "Locale"),
        "Name must carry the outer declaration's metadata"
    );
    // The embedded struct itself is registered too, unshadowed.
    let base = schema.get_type("Base").unwrap();
    assert_eq!(base.borrow().fields.len(), 2);
}

#[test]
fn self_referential_struct_terminates() {
    let schema = schema(indoc! {r#"
        package test

        import "context"

        //go:webrpc json -out=/dev/null
        type API interface {
            GetNode(ctx context.Context) (node *Node, err error)
        }

        type Node struct {
            Next  *Node
            Value int
        }
    "#});

    let nodes: Vec<_> = schema
        .types
        .iter()
        .filter(|t| t.borrow().name == "Node")
        .collect();
    assert_eq!(nodes.len(), 1, "exactly one Node entry");

    let node = nodes[0].borrow();
    let next = &node.fields[0];
    assert_eq!(next.name, "Next");
    assert!(next.optional, "pointer fields are optional");
    let next_ty = next.ty.as_ref().unwrap().borrow();
    assert_eq!(next_ty.expr, "Node");
    let VarKind::Struct { def, .. } = &next_ty.kind else {
        panic!("Next must resolve to a struct reference");
    };
    // The cycle closes onto the registered Node itself.
    assert!(Rc::ptr_eq(def, nodes[0]));
}

#[test]
fn mutually_recursive_structs_terminate() {
    let schema = schema(indoc! {r#"
        package test

        import "context"

        //go:webrpc json -out=/dev/null
        type API interface {
            Get(ctx context.Context) (a *A, err error)
        }

        type A struct{ B *B }
        type B struct{ A *A }
    "#});

    let names: Vec<_> = schema.types.iter().map(|t| t.borrow().name.clone()).collect();
    assert_eq!(names, ["B", "A"]);
}

#[test]
fn enum_wiring() {
    let schema = schema(indoc! {r#"
        package test

        import "context"

        //go:webrpc json -out=/dev/null
        type API interface {
            Get(ctx context.Context) (order *Order, err error)
        }

        // Order status.
        //gospeak:enum
        type Status uint8

        const (
            StatusActive Status = iota // "active"
            StatusClosed               // "closed"
        )

        type Order struct {
            Status Status
        }
    "#});

    let status = schema.get_type("Status").expect("enum registered in types");
    let status = status.borrow();
    assert_eq!(status.kind, TypeKind::Enum);
    assert_eq!(
        status.inner.as_ref().unwrap().borrow().expr,
        "uint8",
        "enum keeps its declared backing primitive"
    );
    assert_eq!(status.comments, ["Order status."]);
    let values: Vec<_> = status
        .fields
        .iter()
        .map(|f| (f.name.as_str(), f.value.as_str()))
        .collect();
    assert_eq!(
        values,
        [("StatusActive", "active"), ("StatusClosed", "closed")]
    );

    // The struct field references the enum entry by name.
    let order = schema.get_type("Order").unwrap();
    let order = order.borrow();
    let field_ty = order.fields[0].ty.as_ref().unwrap().borrow();
    assert_eq!(field_ty.expr, "Status");
    let VarKind::Struct { def, .. } = &field_ty.kind else {
        panic!("enum field must reference the enum type");
    };
    assert_eq!(def.borrow().kind, TypeKind::Enum);

    // The enum registered before the struct that references it.
    let names: Vec<_> = schema.types.iter().map(|t| t.borrow().name.clone()).collect();
    assert_eq!(names, ["Status", "Order"]);
}

#[test]
fn enum_constant_without_value_comment_is_fatal() {
    let err = parse_package(&load(indoc! {r#"
        package test

        import "context"

        //go:webrpc json -out=/dev/null
        type API interface {
            Get(ctx context.Context) (s Status, err error)
        }

        //gospeak:enum
        type Status int

        const (
            StatusBroken Status = iota
        )
    "#}))
    .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("StatusBroken"), "got: {message}");
}

#[test]
fn json_marshaler_coercions() {
    let schema = schema(indoc! {r#"
        package test

        import "context"

        //go:webrpc json -out=/dev/null
        type API interface {
            Get(ctx context.Context) (d *Doc, err error)
        }

        type Payload struct {
            Inner string
        }

        func (p Payload) MarshalJSON() ([]byte, error)     { return nil, nil }
        func (p *Payload) UnmarshalJSON(data []byte) error { return nil }

        type Items []Payload

        func (i Items) MarshalJSON() ([]byte, error)      { return nil, nil }
        func (i *Items) UnmarshalJSON(data []byte) error  { return nil }

        type IDs []int64

        type Doc struct {
            Data  Payload
            Items Items
            IDs   IDs
        }
    "#});

    let doc = schema.get_type("Doc").unwrap();
    let doc = doc.borrow();
    let exprs: Vec<_> = doc
        .fields
        .iter()
        .map(|f| f.ty.as_ref().unwrap().borrow().expr.clone())
        .collect();
    assert_eq!(exprs, ["any", "[]any", "[]int64"]);
    // A JSON-marshaled struct is opaque; it never registers a struct type.
    assert!(schema.get_type("Payload").is_none());
}

#[test]
fn map_keys_must_be_basic() {
    let pkg = load(indoc! {r#"
        package test

        type Pet struct{ Name string }
        type Index map[Pet]string
    "#});
    let mut parser = Parser::new(&pkg, "Test");
    let err = parser.parse_type(&pkg.lookup("Index").unwrap()).unwrap_err();
    assert!(err.to_string().contains("map key"), "got: {err}");
}

#[test]
fn unsupported_constructs_name_the_field() {
    let err = parse_package(&load(indoc! {r#"
        package test

        import "context"

        //go:webrpc json -out=/dev/null
        type API interface {
            Get(ctx context.Context) (s *Stream, err error)
        }

        type Stream struct {
            Events chan int
        }
    "#}))
    .unwrap_err();
    let message = format!("{err}: {}", source_chain(&err));
    assert!(message.contains("Events"), "got: {message}");
    assert!(message.contains("chan"), "got: {message}");
}

fn source_chain(err: &Error) -> String {
    let mut out = String::new();
    let mut cur: Option<&dyn std::error::Error> = std::error::Error::source(err);
    while let Some(err) = cur {
        out.push_str(&err.to_string());
        out.push_str(": ");
        cur = err.source();
    }
    out
}

#[test]
fn multiple_directives_share_one_schema() {
    let targets = targets(indoc! {r#"
        package test

        import "context"

        //go:webrpc json -out=./api.gen.json
        //go:webrpc golang -server -out=./server/server.gen.go
        //go:disabled typescript -out=./api.gen.ts
        type API interface {
            Ping(ctx context.Context) (ok bool, err error)
        }
    "#});

    assert_eq!(targets.len(), 2, "unknown prefixes are ignored");
    assert_eq!(targets[0].generator, "json");
    assert_eq!(targets[1].generator, "golang");
    assert_eq!(targets[1].opts.get("server").map(String::as_str), Some(""));
    assert!(Rc::ptr_eq(
        targets[0].schema.as_ref().unwrap(),
        targets[1].schema.as_ref().unwrap()
    ));
}

#[test]
fn services_without_exported_methods_are_omitted() {
    let schema = schema(indoc! {r#"
        package test

        import "context"

        //go:webrpc json -out=/dev/null
        type API interface {
            internal(ctx context.Context) error
        }
    "#});
    assert!(schema.services.is_empty());
}

#[test]
fn first_argument_must_be_context() {
    let err = parse_package(&load(indoc! {r#"
        package test

        //go:webrpc json -out=/dev/null
        type API interface {
            Get(id int64) (name string, err error)
        }
    "#}))
    .unwrap_err();
    let message = format!("{err}: {}", source_chain(&err));
    assert!(message.contains("context.Context"), "got: {message}");
}

#[test]
fn last_result_must_be_error() {
    let err = parse_package(&load(indoc! {r#"
        package test

        import "context"

        //go:webrpc json -out=/dev/null
        type API interface {
            Get(ctx context.Context) (name string)
        }
    "#}))
    .unwrap_err();
    let message = format!("{err}: {}", source_chain(&err));
    assert!(message.contains("error"), "got: {message}");
}

#[test]
fn anonymous_struct_fields_get_synthesized_names() {
    let schema = schema(indoc! {r#"
        package test

        import "context"

        //go:webrpc json -out=/dev/null
        type API interface {
            Get(ctx context.Context) (s *Settings, err error)
        }

        type Settings struct {
            Limits struct {
                Max int64
            }
        }
    "#});

    let limits = schema
        .get_type("SettingsLimits")
        .expect("anonymous struct registered under synthesized name");
    assert_eq!(limits.borrow().fields[0].name, "Max");

    let settings = schema.get_type("Settings").unwrap();
    let settings = settings.borrow();
    assert_eq!(
        settings.fields[0].ty.as_ref().unwrap().borrow().expr,
        "SettingsLimits"
    );
}

#[test]
fn generic_instantiations_are_walked() {
    let schema = schema(indoc! {r#"
        package test

        import "context"

        //go:webrpc json -out=/dev/null
        type API interface {
            List(ctx context.Context) (page *PetPage, err error)
        }

        type Pet struct{ Name string }

        type Page[T any] struct {
            Items []T
        }

        type PetPage Page[Pet]
    "#});

    let page = schema.get_type("PetPage").expect("named instantiation registered");
    let page = page.borrow();
    assert_eq!(
        page.fields[0].ty.as_ref().unwrap().borrow().expr,
        "[]Pet"
    );
    let names: Vec<_> = schema.types.iter().map(|t| t.borrow().name.clone()).collect();
    assert_eq!(names, ["Pet", "PetPage"]);
}

#[test]
fn canonical_json_shape() {
    let schema = schema(indoc! {r#"
        package test

        import "context"

        //go:webrpc json -out=/dev/null
        type PetStore interface {
            GetPet(ctx context.Context, id int64) (pet *Pet, err error)
        }

        type Pet struct {
            ID   int64  `json:"id"`
            Name string `json:"name,omitempty"`
        }
    "#});

    let json: serde_json::Value =
        serde_json::from_str(&schema.to_json(false).unwrap()).unwrap();
    assert_eq!(json["webrpcVersion"], "v1");
    assert_eq!(json["schemaName"], "PetStore");
    assert_eq!(json["schemaVersion"], "");

    let pet = &json["types"][0];
    assert_eq!(pet["kind"], "struct");
    assert_eq!(pet["name"], "Pet");
    assert_eq!(pet["fields"][0]["name"], "id");
    assert_eq!(pet["fields"][0]["type"], "int64");
    assert_eq!(pet["fields"][0]["optional"], false);
    assert_eq!(pet["fields"][1]["optional"], true);
    assert_eq!(
        pet["fields"][0]["meta"][0]["go.field.name"],
        "ID"
    );

    let method = &json["services"][0]["methods"][0];
    assert_eq!(method["name"], "GetPet");
    assert_eq!(method["inputs"][0]["name"], "id");
    assert_eq!(method["inputs"][0]["type"], "int64");
    assert_eq!(method["outputs"][0]["type"], "Pet");
}

// MARK: Loader round trips

mod loader {
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    use indoc::indoc;

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    /// Creates `<tmp>/goschema-<pid>-<n>/proto` with the given files.
    fn temp_pkg(files: &[(&str, &str)]) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "goschema-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let dir = root.join("proto");
        fs::create_dir_all(&dir).unwrap();
        for (name, contents) in files {
            fs::write(dir.join(name), contents).unwrap();
        }
        dir
    }

    #[test]
    fn previously_generated_files_are_overlaid() {
        let dir = temp_pkg(&[
            (
                "api.go",
                indoc! {r#"
                    package proto

                    import "context"

                    //go:webrpc json -out=./api.gen.json
                    type API interface {
                        Ping(ctx context.Context) (ok bool, err error)
                    }
                "#},
            ),
            // Broken output from a previous run; must not wedge the load.
            ("client.gen.go", "this is not valid Go at all {{{"),
        ]);

        let targets = crate::parse(&dir).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].interface_name, "API");

        fs::remove_dir_all(dir.parent().unwrap()).ok();
    }

    #[test]
    fn shared_error_definitions_are_available_before_generation() {
        let dir = temp_pkg(&[(
            "api.go",
            indoc! {r#"
                package proto

                import "context"

                //go:webrpc json -out=./api.gen.json
                type API interface {
                    Fail(ctx context.Context) (failure *WebRPCError, err error)
                }
            "#},
        )]);

        let targets = crate::parse(&dir).unwrap();
        let schema = targets[0].schema.as_ref().unwrap();
        let def = schema.get_type("WebRPCError").expect("overlay provides WebRPCError");
        let names: Vec<_> = def
            .borrow()
            .fields
            .iter()
            .map(|f| f.name.clone())
            .collect();
        // Tag renames apply; the unexported cause field is dropped.
        assert_eq!(names, ["error", "code", "msg", "cause", "status"]);

        fs::remove_dir_all(dir.parent().unwrap()).ok();
    }

    #[test]
    fn a_file_path_loads_its_parent_directory() {
        let dir = temp_pkg(&[
            (
                "api.go",
                indoc! {r#"
                    package proto

                    import "context"

                    //go:webrpc json -out=./api.gen.json
                    type API interface {
                        GetPet(ctx context.Context) (pet *Pet, err error)
                    }
                "#},
            ),
            // The referenced type lives in a sibling file, so this only
            // works if the whole directory loads.
            ("types.go", "package proto\n\ntype Pet struct {\n\tName string\n}\n"),
        ]);

        let targets = crate::parse(dir.join("api.go")).unwrap();
        assert_eq!(targets.len(), 1);
        let schema = targets[0].schema.as_ref().unwrap();
        assert!(schema.get_type("Pet").is_some());

        fs::remove_dir_all(dir.parent().unwrap()).ok();
    }
}
