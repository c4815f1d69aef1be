use dtoplan_core::config::{EmissionOrdering, PlanConfig, TypeOverride};
use dtoplan_core::error::PlanError;
use dtoplan_core::ir::{
    Annotation, EmissionPlan, FileContent, ImportPlan, ModelBody, NamedKind, ParameterLocation,
    Primitive, ReturnType, TypeExpr,
};
use dtoplan_core::parse;
use dtoplan_core::transform::{self, TypeRegistry};

const TICKETING: &str = include_str!("fixtures/ticketing.yaml");
const PATH_MISMATCH: &str = include_str!("fixtures/path-mismatch.yaml");
const ORG_CHART: &str = include_str!("fixtures/org-chart.yaml");

fn plan(yaml: &str, config: &PlanConfig) -> Result<EmissionPlan, PlanError> {
    let spec = parse::from_yaml(yaml).expect("fixture should parse");
    transform::plan_spec(&spec, config)
}

fn ticketing() -> EmissionPlan {
    plan(TICKETING, &PlanConfig::default()).expect("ticketing should plan")
}

#[test]
fn plan_ticketing_files() {
    let plan = ticketing();
    let names: Vec<_> = plan.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "ErrorDto",
            "TicketStatus",
            "TicketAssignee",
            "Ticket",
            "OrderStatus",
            "OrderItem",
            "OrderV1",
            "Node",
            "TicketsApi",
            "OrdersApi",
            "DefaultApi",
        ]
    );
    assert!(plan.cycle_groups.is_empty());
}

#[test]
fn plan_is_deterministic() {
    let first = serde_json::to_string(&ticketing()).unwrap();
    let second = serde_json::to_string(&ticketing()).unwrap();
    assert_eq!(first, second);

    let sequential = PlanConfig {
        parallel: false,
        ..PlanConfig::default()
    };
    let third = serde_json::to_string(&plan(TICKETING, &sequential).unwrap()).unwrap();
    assert_eq!(first, third);
}

#[test]
fn plan_mapping_is_referentially_transparent() {
    let spec = parse::from_yaml(TICKETING).unwrap();
    let config = PlanConfig::default();
    let registry = TypeRegistry::from_spec(&spec, &config).unwrap();
    let mapper = transform::TypeMapper::new(&registry, &config);
    let node = registry.get("OrderV1").unwrap();

    let a = mapper.map(node, transform::MapContext::required(), "OrderV1").unwrap();
    let b = mapper.map(node, transform::MapContext::required(), "OrderV1").unwrap();
    assert_eq!(a, b);
}

#[test]
fn plan_imports_precede_importers() {
    let plan = ticketing();
    for (position, file) in plan.files.iter().enumerate() {
        for import in file.imports.iter().filter(|i| i.defined_in.is_some()) {
            let defined_at = plan.position(&import.name).expect("import should be planned");
            assert!(
                defined_at < position,
                "{} imports {} which is emitted later",
                file.name,
                import.name
            );
        }
        assert!(file.forward_references.is_empty());
    }
}

#[test]
fn plan_error_dto_emitted_once() {
    let plan = ticketing();
    assert_eq!(plan.models().filter(|m| m.name == "ErrorDto").count(), 1);

    let importers: Vec<_> = plan
        .files
        .iter()
        .filter(|f| f.imports.iter().any(|i| i.name == "ErrorDto"))
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(importers, ["TicketsApi", "OrdersApi"]);
}

#[test]
fn plan_field_order_is_declaration_order() {
    let plan = ticketing();
    let order = plan.file("OrderV1").unwrap().as_model().unwrap();
    let fields: Vec<_> = order.fields().iter().map(|f| f.wire_name.as_str()).collect();
    assert_eq!(
        fields,
        ["id", "placedBy", "status", "createdTime", "items", "comment"]
    );
}

#[test]
fn plan_required_and_optional_fields() {
    let plan = ticketing();
    let order = plan.file("OrderV1").unwrap().as_model().unwrap();

    let comment = order.field("comment").unwrap();
    assert!(!comment.required);
    assert!(comment.mapped.optional);
    assert!(comment.default_value.is_none());
    assert!(comment.mapped.annotations.is_empty());

    let status = order.field("status").unwrap();
    assert!(status.required);
    assert!(!status.mapped.optional);
    assert_eq!(status.mapped.annotations, vec![Annotation::NotNull]);
    assert_eq!(
        status.mapped.expr,
        TypeExpr::Named {
            name: "OrderStatus".into(),
            schema: "OrderStatus".into(),
            named_kind: NamedKind::Enumeration,
        }
    );

    let created = order.field("createdTime").unwrap();
    assert_eq!(created.mapped.expr, TypeExpr::primitive(Primitive::Timestamp));
    assert!(created.mapped.has_annotation(|a| matches!(a, Annotation::DateFormat { .. })));

    let items = order.field("items").unwrap();
    assert!(items.mapped.has_annotation(|a| *a == Annotation::MinItems { value: 1 }));
    assert!(items.mapped.has_annotation(|a| *a == Annotation::Valid));
}

#[test]
fn plan_enum_round_trip() {
    let plan = ticketing();
    let status = plan.file("OrderStatus").unwrap().as_model().unwrap();
    let wire: Vec<_> = status
        .enum_wire_values()
        .expect("should be an enumeration")
        .into_iter()
        .cloned()
        .collect();
    assert_eq!(
        wire,
        [
            serde_json::json!("Created"),
            serde_json::json!("Processing"),
            serde_json::json!("Dispatched")
        ]
    );
    let ModelBody::Enumeration { variants, .. } = &status.body else {
        panic!("expected enumeration body");
    };
    let names: Vec<_> = variants.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["CREATED", "PROCESSING", "DISPATCHED"]);
}

#[test]
fn plan_self_referencing_node() {
    let plan = ticketing();
    let node = plan.file("Node").unwrap();
    let model = node.as_model().unwrap();
    assert!(model.requires_indirection);
    assert!(model.references.is_empty());
    assert!(node.imports.is_empty());

    let children = model.field("children").unwrap();
    let TypeExpr::List { item, unique } = &children.mapped.expr else {
        panic!("expected a list");
    };
    assert!(!unique);
    assert!(item.requires_indirection);
    assert!(!children.requires_indirection);
    assert!(matches!(&item.expr, TypeExpr::Named { schema, .. } if schema == "Node"));
}

#[test]
fn plan_model_subdir_and_external_imports() {
    let plan = ticketing();
    let order = plan.file("OrderV1").unwrap();
    assert_eq!(order.module_path, "model/orders");
    assert_eq!(order.output_path, "model/orders/OrderV1");
    assert_eq!(
        order.imports,
        [
            ImportPlan {
                name: "OrderItem".into(),
                qualified: "generated.model.OrderItem".into(),
                defined_in: Some("model/OrderItem".into()),
                same_module: false,
            },
            ImportPlan {
                name: "OrderStatus".into(),
                qualified: "generated.model.OrderStatus".into(),
                defined_in: Some("model/OrderStatus".into()),
                same_module: false,
            },
        ]
    );

    let api = plan.file("OrdersApi").unwrap();
    assert!(
        api.imports
            .iter()
            .any(|i| i.qualified == "generated.model.orders.OrderV1")
    );

    let item = plan.file("OrderItem").unwrap();
    assert_eq!(item.imports[0].qualified, "com.acme.json.MoneySerializer");
    assert_eq!(item.imports[0].name, "MoneySerializer");
    let price = item.as_model().unwrap().field("unitPrice").unwrap();
    assert_eq!(price.mapped.expr, TypeExpr::primitive(Primitive::Decimal));
}

#[test]
fn plan_inline_object_promoted() {
    let plan = ticketing();
    let ticket = plan.file("Ticket").unwrap();
    let assignee = ticket.as_model().unwrap().field("assignee").unwrap();
    assert!(matches!(
        &assignee.mapped.expr,
        TypeExpr::Named { name, .. } if name == "TicketAssignee"
    ));
    assert!(ticket.imports.iter().all(|i| i.same_module));

    let labels = ticket.as_model().unwrap().field("labels").unwrap();
    assert!(matches!(labels.mapped.expr, TypeExpr::List { unique: true, .. }));

    let metadata = ticket.as_model().unwrap().field("metadata").unwrap();
    assert!(matches!(metadata.mapped.expr, TypeExpr::Map { .. }));
}

#[test]
fn plan_path_parameter_consistency() {
    let plan = ticketing();
    let tickets = plan.file("TicketsApi").unwrap().as_interface().unwrap();
    assert_eq!(tickets.description.as_deref(), Some("Support tickets and their attachments"));

    let op = tickets
        .operations
        .iter()
        .find(|o| o.operation_id == "getAttachmentContent")
        .unwrap();
    let params: Vec<_> = op
        .parameters
        .iter()
        .map(|p| (p.wire_name.as_str(), p.location))
        .collect();
    assert_eq!(
        params,
        [
            ("ticketId", ParameterLocation::Path),
            ("attachmentId", ParameterLocation::Path),
            ("acceptLanguage", ParameterLocation::Header),
        ]
    );
    assert_eq!(
        op.return_type,
        ReturnType::Typed {
            mapped: op.responses[0].contents[0].mapped.clone().unwrap()
        }
    );
}

#[test]
fn plan_path_parameter_mismatch() {
    let err = plan(PATH_MISMATCH, &PlanConfig::default()).unwrap_err();
    assert_eq!(
        err,
        PlanError::PathParameterMismatch {
            operation_id: "getAttachmentContent".into(),
            path: "tickets/{ticketId}/attachments/{attachmentId}/content".into(),
            missing: vec!["attachmentId".into()],
            undeclared: vec![],
        }
    );
    assert!(err.to_string().contains("attachmentId"));
}

#[test]
fn plan_operations_and_security() {
    let plan = ticketing();
    let interfaces: Vec<_> = plan.interfaces().collect();

    let list = &interfaces[0].operations[0];
    assert_eq!(list.operation_id, "listTickets");
    assert_eq!(list.security.len(), 1);
    assert_eq!(list.security[0].scheme, "bearerAuth");
    let page_size = list.parameter("pageSize").unwrap();
    assert_eq!(page_size.default_value, Some(serde_json::json!(20)));
    assert!(page_size.mapped.optional);
    let statuses: Vec<_> = list.responses.iter().map(|r| r.status.as_str()).collect();
    assert_eq!(statuses, ["200", "default"]);

    let upload = &interfaces[0].operations[3];
    assert_eq!(upload.return_type, ReturnType::Void);
    let form: Vec<_> = upload
        .parameters
        .iter()
        .map(|p| (p.wire_name.as_str(), p.location))
        .collect();
    assert_eq!(
        form,
        [
            ("ticketId", ParameterLocation::Path),
            ("file", ParameterLocation::FormField),
            ("description", ParameterLocation::FormField),
        ]
    );

    let get_order = &interfaces[1].operations[1];
    let deprecation = get_order.deprecated.as_ref().expect("should be deprecated");
    assert_eq!(deprecation.message.as_deref(), Some("use the v2 orders endpoint"));

    let categories = &interfaces[2];
    assert_eq!(categories.name, "DefaultApi");
    assert!(categories.operations[0].security.is_empty());
}

#[test]
fn plan_cycle_tolerant_ordering() {
    let plan = plan(ORG_CHART, &PlanConfig::default()).unwrap();
    let names: Vec<_> = plan.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["Department", "Employee", "Company", "CompaniesApi"]);
    assert_eq!(
        plan.cycle_groups,
        [vec!["Department".to_string(), "Employee".to_string()]]
    );
    assert_eq!(plan.files[0].forward_references, ["Employee"]);

    let FileContent::Model(department) = &plan.files[0].content else {
        panic!("expected a model");
    };
    assert!(department.requires_indirection);
    assert!(department.field("manager").unwrap().requires_indirection);

    let FileContent::Model(employee) = &plan.files[1].content else {
        panic!("expected a model");
    };
    assert!(employee.field("name").unwrap().mapped.optional);
}

#[test]
fn plan_strict_ordering_rejects_cycles() {
    let config = PlanConfig {
        ordering: EmissionOrdering::Strict,
        ..PlanConfig::default()
    };
    let err = plan(ORG_CHART, &config).unwrap_err();
    assert_eq!(
        err,
        PlanError::CyclicReferenceUnsupported {
            names: vec!["Department".into(), "Employee".into()]
        }
    );

    // A self-reference alone is not an import cycle.
    assert!(plan(TICKETING, &config).is_ok());
}

#[test]
fn plan_unresolved_reference() {
    let yaml = r#"
openapi: 3.0.3
info: { title: Broken, version: "1" }
paths: {}
components:
  schemas:
    Order:
      type: object
      properties:
        customer:
          $ref: '#/components/schemas/Customer'
"#;
    assert_eq!(
        plan(yaml, &PlanConfig::default()).unwrap_err(),
        PlanError::UnresolvedReference {
            reference: "Customer".into(),
            referenced_from: "Order".into(),
        }
    );
}

const INHERITANCE: &str = r#"
openapi: 3.0.3
info: { title: Inheritance, version: "1" }
paths: {}
components:
  schemas:
    Base:
      type: object
      properties:
        id: { type: string }
    BaseRef:
      $ref: '#/components/schemas/Base'
    Derived:
      allOf:
        - $ref: '#/components/schemas/BaseRef'
        - type: object
          properties:
            extra: { type: integer }
"#;

#[test]
fn plan_all_of_parent_through_alias() {
    let plan = plan(INHERITANCE, &PlanConfig::default()).unwrap();
    let names: Vec<_> = plan.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["Base", "Derived"]);

    let derived = plan.file("Derived").unwrap();
    let FileContent::Model(model) = &derived.content else {
        panic!("Derived should be a model");
    };
    assert_eq!(model.supertypes, ["Base"]);
    assert_eq!(
        derived.imports.iter().map(|i| i.qualified.as_str()).collect::<Vec<_>>(),
        ["generated.model.Base"]
    );
}

#[test]
fn plan_all_of_parent_overridden() {
    let mut config = PlanConfig::default();
    config.type_overrides.insert(
        "Base".into(),
        TypeOverride {
            type_name: "ExtBase".into(),
            import: Some("com.acme.ExtBase".into()),
        },
    );
    let plan = plan(INHERITANCE, &config).unwrap();
    let names: Vec<_> = plan.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["Derived"]);

    let derived = &plan.files[0];
    let FileContent::Model(model) = &derived.content else {
        panic!("Derived should be a model");
    };
    assert_eq!(model.supertypes, ["ExtBase"]);
    assert!(model.references.is_empty());
    assert_eq!(
        derived.imports,
        [ImportPlan {
            name: "ExtBase".into(),
            qualified: "com.acme.ExtBase".into(),
            defined_in: None,
            same_module: false,
        }]
    );
}

#[test]
fn plan_imports_with_same_simple_name() {
    let yaml = r#"
openapi: 3.0.3
info: { title: Crm, version: "1" }
paths:
  /customers:
    get:
      operationId: listCustomers
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: { $ref: '#/components/schemas/Customer' }
    post:
      operationId: importCustomer
      requestBody:
        content:
          application/json:
            schema: { $ref: '#/components/schemas/customer' }
      responses:
        "204": { description: imported }
components:
  schemas:
    Customer:
      type: object
      properties:
        id: { type: string }
    customer:
      type: object
      x-model-subdir: crm
      properties:
        externalId: { type: string }
"#;
    assert_eq!(
        plan(yaml, &PlanConfig::default()).unwrap_err(),
        PlanError::NameCollision {
            name: "Customer in api/DefaultApi".into(),
            first: "generated.model.Customer".into(),
            second: "generated.model.crm.Customer".into(),
        }
    );
}
