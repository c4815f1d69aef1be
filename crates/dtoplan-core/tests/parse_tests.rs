use dtoplan_core::parse;
use dtoplan_core::parse::parameter::{ParameterLocation, ParameterOrRef};
use dtoplan_core::parse::response::ResponseOrRef;
use dtoplan_core::parse::schema::{SchemaOrRef, TypeSet};
use dtoplan_core::parse::security::SecuritySchemeType;

const TICKETING: &str = include_str!("fixtures/ticketing.yaml");
const ORG_CHART: &str = include_str!("fixtures/org-chart.yaml");

#[test]
fn parse_ticketing_yaml() {
    let spec = parse::from_yaml(TICKETING).expect("should parse ticketing.yaml");
    assert_eq!(spec.openapi, "3.0.3");
    assert_eq!(spec.info.title, "Ticketing API");
    assert_eq!(spec.paths.len(), 6);
    assert_eq!(
        spec.tag_description("orders"),
        Some("Order placement and tracking")
    );

    let components = spec.components.as_ref().expect("should have components");
    let names: Vec<_> = components.schemas.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        [
            "ErrorDto",
            "TicketStatus",
            "Ticket",
            "OrderStatus",
            "OrderItem",
            "OrderV1",
            "Node"
        ]
    );
    assert!(components.security_schemes.contains_key("bearerAuth"));
}

#[test]
fn parse_path_level_parameters_and_refs() {
    let spec = parse::from_yaml(TICKETING).unwrap();
    let item = spec
        .paths
        .get("tickets/{ticketId}/attachments/{attachmentId}/content")
        .expect("should have attachment content path");
    match &item.parameters[0] {
        ParameterOrRef::Parameter(p) => {
            assert_eq!(p.name, "ticketId");
            assert_eq!(p.location, ParameterLocation::Path);
        }
        _ => panic!("expected inline path parameter"),
    }

    let list = spec.paths["/tickets"].get.as_ref().unwrap();
    assert!(matches!(list.parameters[1], ParameterOrRef::Ref { .. }));
    assert!(matches!(
        list.responses.get("default"),
        Some(ResponseOrRef::Ref { .. })
    ));
}

#[test]
fn parse_vendor_extensions() {
    let spec = parse::from_yaml(TICKETING).unwrap();
    let schemas = &spec.components.as_ref().unwrap().schemas;

    let SchemaOrRef::Schema(order) = &schemas["OrderV1"] else {
        panic!("expected inline schema");
    };
    assert_eq!(order.ext().string("x-model-subdir"), Some("orders"));

    let get_order = spec.paths["/orders/{orderId}"].get.as_ref().unwrap();
    assert_eq!(get_order.deprecated, Some(true));
    assert_eq!(
        get_order.ext().string("x-deprecation-message"),
        Some("use the v2 orders endpoint")
    );
}

#[test]
fn parse_31_type_arrays() {
    let spec = parse::from_yaml(ORG_CHART).expect("should parse 3.1 spec");
    assert_eq!(spec.openapi, "3.1.0");

    let SchemaOrRef::Schema(employee) = &spec.components.as_ref().unwrap().schemas["Employee"]
    else {
        panic!("expected inline schema");
    };
    let SchemaOrRef::Schema(name) = &employee.properties["name"] else {
        panic!("expected inline property");
    };
    let types = name.schema_type.as_ref().expect("should have a type");
    assert!(matches!(types, TypeSet::Multiple(_)));
    assert!(types.includes_null());
}

#[test]
fn parse_json() {
    let json = r#"{
        "openapi": "3.0.0",
        "info": { "title": "Minimal", "version": "1" },
        "paths": {},
        "components": { "schemas": { "Empty": { "type": "object" } } }
    }"#;
    let spec = parse::from_json(json).expect("should parse JSON");
    assert_eq!(spec.component_schemas().count(), 1);
}

#[test]
fn parse_invalid_version() {
    let yaml = r#"
openapi: "2.0.0"
info:
  title: Test
  version: "1.0"
paths: {}
"#;
    let err = parse::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("unsupported OpenAPI version"));
}

#[test]
fn parse_ignores_unplanned_keywords() {
    let yaml = r#"
openapi: 3.0.3
info: { title: Search, version: "1" }
servers:
  - url: https://api.example.test
paths:
  /search:
    summary: Search endpoints
    get:
      operationId: search
      parameters:
        - name: q
          in: query
          style: form
          explode: true
          example: shoes
          schema: { type: string }
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: { type: string }
              example: found
components:
  securitySchemes:
    apiKey:
      type: apiKey
      name: X-Api-Key
      in: header
      description: Issued per tenant
"#;
    let spec = parse::from_yaml(yaml).expect("should parse");
    let op = spec.paths["/search"].get.as_ref().unwrap();
    match &op.parameters[0] {
        ParameterOrRef::Parameter(p) => {
            assert_eq!(p.name, "q");
            assert!(p.ext().string("x-nullable").is_none());
        }
        _ => panic!("expected inline parameter"),
    }
    let components = spec.components.as_ref().unwrap();
    assert_eq!(
        components.security_schemes["apiKey"].scheme_type,
        SecuritySchemeType::ApiKey
    );
}
