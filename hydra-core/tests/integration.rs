//! End-to-end scenarios against the in-memory adapter.

use chrono::{TimeZone, Utc};
use hydra_core::{
    Adapter, AdapterError, Client, ClientConfig, ClientError, CollectionOptions, Context,
    FieldValue, Filters, HydrationState, MemoryAdapter, Method, MetadataRegistry,
    ParsedResponse, Request, ResourceId, ResourceType, Response, RouteResolver, resource,
};
use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};
use std::rc::Rc;
use std::time::Duration;

#[resource(class = "Universe", route = "/universes")]
pub struct Universe {
    name: String,
}

#[resource(class = "Thing", route = "/things")]
pub struct Thing {
    name: String,
    count: i64,
    ratio: Option<f64>,
    tags: Vec<String>,
    universe: Option<Universe>,
    #[field(rename = "createdAt", read_only)]
    created_at: Option<chrono::DateTime<Utc>>,
}

#[resource(class = "Sport", route = "/sports", cache(ttl = 600, public, warmup))]
pub struct Sport {
    name: String,
}

fn thing_doc(id: i64) -> Value {
    json!({
        "@context": "/contexts/Thing",
        "@id": format!("/things/{id}"),
        "@type": "Thing",
        "id": id,
        "name": format!("thing {id}"),
        "count": id,
        "ratio": 0.5,
        "tags": ["a", "b"],
        "universe": "/universes/3",
        "createdAt": "2024-03-01T10:00:00+00:00"
    })
}

fn universe_doc(id: i64) -> Value {
    json!({"@id": format!("/universes/{id}"), "@type": "Universe", "id": id, "name": format!("universe {id}")})
}

fn sports_page() -> Value {
    json!({
        "@type": "hydra:Collection",
        "hydra:totalItems": 2,
        "hydra:member": [
            {"@id": "/sports/1", "@type": "Sport", "id": 1, "name": "Running"},
            {"@id": "/sports/2", "@type": "Sport", "id": 2, "name": "Cycling"}
        ]
    })
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn registry() -> MetadataRegistry {
    MetadataRegistry::new()
        .with_type::<Thing>()
        .with_type::<Universe>()
}

fn client_with(
    adapter: MemoryAdapter,
    metadata: MetadataRegistry,
    config: ClientConfig,
) -> (Client, Rc<MemoryAdapter>) {
    let adapter = Rc::new(adapter);
    let resolver = RouteResolver::new()
        .with_type::<Thing>()
        .with_type::<Universe>()
        .with_type::<Sport>();
    let context = Context::new(Rc::clone(&adapter), resolver, metadata);
    (Client::with_config(context, config), adapter)
}

fn client_for(adapter: MemoryAdapter) -> (Client, Rc<MemoryAdapter>) {
    client_with(adapter, registry(), ClientConfig::default())
}

fn things() -> MemoryAdapter {
    MemoryAdapter::new()
        .with_document("/things/1", thing_doc(1))
        .with_document("/things/2", thing_doc(2))
        .with_document("/universes/3", universe_doc(3))
}

#[test]
fn lookup_update_delete_scenario() {
    let (client, adapter) = client_for(things());

    let first = client.get_by_reference("/things/1", false).unwrap();
    let second = client.get_by_reference("/things/1", false).unwrap();
    assert_eq!(first, second);
    assert_eq!(adapter.request_count(), 0);
    assert_eq!(first.hydration_state(), HydrationState::Identified);

    let thing: Thing = first.clone().into_typed().unwrap();
    assert_eq!(thing.count().unwrap(), Some(1));
    assert_eq!(adapter.count(Method::Get), 1);
    assert!(first.is_hydrated());

    thing.set_count(2).unwrap();
    assert_eq!(first.edited_fields().unwrap(), ["count"]);
    client.put(thing.resource()).unwrap();

    let put = adapter.last_request().unwrap();
    assert_eq!(put.method, Method::Put);
    assert_eq!(put.target.as_str(), "/things/1");
    assert_eq!(String::from_utf8(put.body.unwrap()).unwrap(), r#"{"count":2}"#);
    assert_eq!(first.remote_value("count"), Some(json!(2)));

    let before = adapter.request_count();
    client.put(thing.resource()).unwrap();
    assert_eq!(adapter.request_count(), before);

    client.delete(thing.resource()).unwrap();
    assert_eq!(adapter.last_request().unwrap().method, Method::Delete);
    assert!(adapter.document("/things/1").is_none());

    let fresh = client.get_by_reference("/things/1", false).unwrap();
    assert_ne!(fresh, first);
    assert_eq!(fresh.hydration_state(), HydrationState::Identified);
}

#[test]
fn lookup_by_class_and_id() {
    let (client, adapter) = client_for(things());
    let by_id = client.get_by_class_and_id("Thing", 2, false).unwrap();
    let by_reference = client
        .get_by_class_and_id("Thing", "/things/2", false)
        .unwrap();
    assert_eq!(by_id, by_reference);
    assert_eq!(by_id.id(), Some(ResourceId::Integer(2)));
    assert_eq!(adapter.request_count(), 0);

    let hydrated = client.get_by_class_and_id("Thing", 1, true).unwrap();
    assert!(hydrated.is_hydrated());
    assert_eq!(adapter.count(Method::Get), 1);
}

#[test]
fn unknown_class_is_a_configuration_error() {
    let (client, _) = client_with(things(), MetadataRegistry::new(), ClientConfig::default());
    let err = client.get_by_reference("/things/1", false).unwrap_err();
    assert!(matches!(err, ClientError::Configuration(_)));
}

#[test]
fn refresh_merge_rules() {
    let (client, _) = client_for(things());
    let thing = client.get_by_reference("/things/1", true).unwrap();

    thing
        .refresh(&object(json!({"count": 5, "name": "renamed"})), false)
        .unwrap();
    assert_eq!(thing.get("count").unwrap(), FieldValue::Integer(1));
    assert_eq!(thing.get("name").unwrap().as_str(), Some("thing 1"));

    thing
        .refresh(&object(json!({"count": 5, "name": "renamed"})), true)
        .unwrap();
    assert_eq!(thing.get("count").unwrap(), FieldValue::Integer(5));
    assert_eq!(thing.get("name").unwrap().as_str(), Some("renamed"));
    assert!(thing.edited_fields().unwrap().is_empty());
}

#[test]
fn partial_data_only_fills_missing_fields() {
    let (client, adapter) = client_for(things());
    let thing = client.get_by_reference("/things/1", false).unwrap();

    thing
        .hydrate_from(&object(json!({"@id": "/things/1", "name": "partial"})))
        .unwrap();
    assert_eq!(thing.hydration_state(), HydrationState::Partial);
    assert_eq!(thing.get("name").unwrap().as_str(), Some("partial"));
    assert_eq!(adapter.request_count(), 0);

    // Reading an unloaded field fetches, loaded ones are kept.
    assert_eq!(thing.get("count").unwrap(), FieldValue::Integer(1));
    assert_eq!(adapter.count(Method::Get), 1);
    assert_eq!(thing.get("name").unwrap().as_str(), Some("partial"));
}

#[test]
fn hydrate_is_idempotent() {
    let (client, adapter) = client_for(things());
    let thing = client.get_by_reference("/things/1", false).unwrap();
    thing.hydrate().unwrap();
    thing.hydrate().unwrap();
    thing.get("tags").unwrap();
    assert_eq!(adapter.count(Method::Get), 1);
    assert_eq!(thing.hydration_state(), HydrationState::Full);
}

#[test]
fn diff_is_minimal() {
    let (client, _) = client_for(things());
    let thing: Thing = client.get(1).unwrap();
    thing.resource().hydrate().unwrap();
    assert!(thing.resource().edited_fields().unwrap().is_empty());

    thing.set_tags(vec!["b".to_string(), "a".to_string()]).unwrap();
    assert!(thing.resource().edited_fields().unwrap().is_empty());

    thing.set_ratio(Some(0.5)).unwrap();
    thing.set_count(1).unwrap();
    assert!(thing.resource().edited_fields().unwrap().is_empty());

    thing.set_name("other".to_string()).unwrap();
    assert_eq!(thing.resource().edited_fields().unwrap(), ["name"]);

    thing.set_tags(vec!["a".to_string(), "c".to_string()]).unwrap();
    assert_eq!(thing.resource().edited_fields().unwrap(), ["name", "tags"]);
}

#[test]
fn put_sends_references_as_iris() {
    let adapter = things().with_document("/universes/4", universe_doc(4));
    let (client, adapter) = client_for(adapter);
    let thing: Thing = client.get(1).unwrap();
    let universe: Universe = client.get(4).unwrap();

    thing.set_universe(Some(universe)).unwrap();
    client.put(thing.resource()).unwrap();

    let body = adapter.last_request().unwrap().json_body().unwrap();
    assert_eq!(body, json!({"universe": "/universes/4"}));
}

#[test]
fn put_requires_registration() {
    let (client, adapter) = client_for(things());
    let unsaved = client.create("Thing").unwrap();
    unsaved.set("count", 3).unwrap();
    let err = client.put(&unsaved).unwrap_err();
    assert!(err.is_precondition());

    let (other, _) = client_for(things());
    let foreign = other.get_by_reference("/things/1", false).unwrap();
    assert!(client.put(&foreign).unwrap_err().is_precondition());
    assert_eq!(adapter.count(Method::Put), 0);
}

#[test]
fn undeclared_fields_are_rejected() {
    let (client, adapter) = client_for(things());
    let thing = client.get_by_reference("/things/1", false).unwrap();
    assert!(thing.get("colour").unwrap_err().is_precondition());
    assert!(thing.set("colour", "red").unwrap_err().is_precondition());
    assert_eq!(adapter.request_count(), 0);
}

#[test]
fn writes_are_coerced() {
    let (client, _) = client_for(things());
    let thing = client.get_by_reference("/things/1", false).unwrap();

    thing.set("count", "12").unwrap();
    assert_eq!(thing.get("count").unwrap(), FieldValue::Integer(12));

    thing.set("ratio", 2).unwrap();
    assert_eq!(thing.get("ratio").unwrap(), FieldValue::Float(2.0));

    thing.set("createdAt", "2024-05-01 08:30:00").unwrap();
    let typed: Thing = thing.clone().into_typed().unwrap();
    assert_eq!(
        typed.created_at().unwrap(),
        Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap())
    );

    let err = thing.set("count", "many").unwrap_err();
    assert!(matches!(err, ClientError::Coercion { ref field, .. } if field == "count"));
    let err = thing.set("tags", "a").unwrap_err();
    assert!(matches!(err, ClientError::Coercion { ref field, .. } if field == "tags"));

    thing.set("tags", FieldValue::Null).unwrap();
    assert!(thing.get("tags").unwrap().is_null());
}

#[test]
fn writes_hydrate_unloaded_fields_first() {
    let (client, adapter) = client_for(things());
    let thing: Thing = client.get(1).unwrap();
    thing.set_name("renamed".to_string()).unwrap();
    assert_eq!(adapter.count(Method::Get), 1);
    assert_eq!(thing.count().unwrap(), Some(1));
    assert_eq!(thing.name().unwrap().as_deref(), Some("renamed"));
    assert_eq!(thing.resource().edited_fields().unwrap(), ["name"]);
}

#[test]
fn references_resolve_through_identity_map() {
    let (client, adapter) = client_for(things());
    let thing: Thing = client.get(1).unwrap();
    let universe = thing.universe().unwrap().unwrap();
    assert_eq!(universe, client.get::<Universe>(3).unwrap());
    assert_eq!(adapter.count(Method::Get), 1);

    assert_eq!(universe.name().unwrap().as_deref(), Some("universe 3"));
    assert_eq!(adapter.count(Method::Get), 2);

    let other: Thing = client.get(2).unwrap();
    assert_eq!(other.universe().unwrap(), Some(universe));
}

#[test]
fn embedded_objects_hydrate_nested_resources() {
    let mut document = thing_doc(5);
    document["universe"] = json!({"@id": "/universes/9", "@type": "Universe", "id": 9, "name": "Embedded"});
    let (client, adapter) = client_for(MemoryAdapter::new().with_document("/things/5", document));

    let thing: Thing = client.get(5).unwrap();
    let universe = thing.universe().unwrap().unwrap();
    assert_eq!(universe.id(), Some(ResourceId::Integer(9)));
    assert_eq!(universe.name().unwrap().as_deref(), Some("Embedded"));
    assert_eq!(adapter.count(Method::Get), 1);
    assert!(thing.resource().edited_fields().unwrap().is_empty());
}

#[test]
fn auto_hydrate_can_be_disabled() {
    let (client, adapter) = client_for(things());
    let thing = client.get_by_reference("/things/1", false).unwrap();
    thing.set_auto_hydrate(false);
    assert!(thing.get("count").unwrap().is_null());
    assert_eq!(thing.get("id").unwrap(), FieldValue::Integer(1));
    assert_eq!(adapter.request_count(), 0);
}

#[test]
fn collection_follows_next_links() {
    let adapter = things()
        .with_document(
            "/things",
            json!({
                "@type": "hydra:Collection",
                "hydra:totalItems": 3,
                "hydra:member": [thing_doc(1), thing_doc(2)],
                "hydra:view": {"@id": "/things?page=1", "hydra:next": "/things?page=2"}
            }),
        )
        .with_document(
            "/things?page=2",
            json!({
                "@type": "hydra:Collection",
                "hydra:member": [thing_doc(3)],
                "hydra:view": {"@id": "/things?page=2"}
            }),
        );
    let (client, adapter) = client_for(adapter);

    let collection = client
        .get_collection("Thing", &Filters::new(), CollectionOptions::default())
        .unwrap();
    assert_eq!(adapter.request_count(), 0);

    let items: Vec<_> = collection.map(Result::unwrap).collect();
    let ids: Vec<_> = items.iter().filter_map(|item| item.id()).collect();
    assert_eq!(ids, [ResourceId::Integer(1), ResourceId::Integer(2), ResourceId::Integer(3)]);
    assert_eq!(adapter.count(Method::Get), 2);
    assert!(adapter.requests().iter().all(|request| request.execution_cache));

    assert_eq!(items[0], client.get_by_reference("/things/1", false).unwrap());
    assert_eq!(items[2].get("name").unwrap().as_str(), Some("thing 3"));
    assert_eq!(adapter.count(Method::Get), 2);
}

#[test]
fn last_page_yields_exactly_its_items() {
    let adapter = MemoryAdapter::new().with_document(
        "/things?page=7",
        json!({"@type": "hydra:Collection", "hydra:member": [thing_doc(7)], "hydra:totalItems": 1}),
    );
    let (client, adapter) = client_for(adapter);
    let mut collection = client
        .get_collection_from(Some("Thing"), "/things?page=7", CollectionOptions::default())
        .unwrap();
    assert!(collection.next().unwrap().is_ok());
    assert!(collection.next().is_none());
    assert!(collection.next().is_none());
    assert_eq!(collection.total_items(), Some(1));
    assert_eq!(adapter.request_count(), 1);
}

#[test]
fn looping_next_link_stops_at_page_limit() {
    let adapter = MemoryAdapter::new().with_document(
        "/loop",
        json!({
            "@type": "hydra:Collection",
            "hydra:member": [{"@id": "/things/1", "@type": "Thing", "id": 1}],
            "hydra:view": {"hydra:next": "/loop"}
        }),
    );
    let (client, adapter) = client_for(adapter);
    let collection = client
        .get_collection_from(Some("Thing"), "/loop", CollectionOptions::default())
        .unwrap()
        .with_page_limit(3);

    let results: Vec<_> = collection.collect();
    assert_eq!(results.len(), 4);
    assert!(results[..3].iter().all(Result::is_ok));
    assert!(results[3].as_ref().unwrap_err().is_protocol());
    assert_eq!(adapter.count(Method::Get), 3);
}

#[test]
fn page_limit_from_config() {
    let adapter = MemoryAdapter::new().with_document(
        "/loop",
        json!({"@type": "hydra:Collection", "hydra:member": [], "hydra:view": {"hydra:next": "/loop"}}),
    );
    let config = ClientConfig::from_toml("page_limit = 2").unwrap();
    let (client, adapter) = client_with(adapter, registry(), config);
    let err = client
        .get_collection_from(None, "/loop", CollectionOptions::default().load_all())
        .unwrap_err();
    assert!(err.is_protocol());
    assert_eq!(adapter.count(Method::Get), 2);
}

#[test]
fn load_all_fetches_up_front() {
    let adapter = things()
        .with_document(
            "/things?active=true",
            json!({
                "@type": "hydra:Collection",
                "hydra:member": [thing_doc(1)],
                "hydra:view": {"hydra:next": "/things?active=true&page=2"}
            }),
        )
        .with_document(
            "/things?active=true&page=2",
            json!({"@type": "hydra:Collection", "hydra:member": [thing_doc(2)]}),
        );
    let (client, adapter) = client_for(adapter);
    let filters = Filters::new().with("active", true);

    let collection = client
        .get_collection(
            "Thing",
            &filters,
            CollectionOptions::default().load_all().without_auto_hydrate(),
        )
        .unwrap();
    assert_eq!(adapter.count(Method::Get), 2);
    assert_eq!(adapter.requests()[0].target.as_str(), "/things?active=true");

    let items: Vec<_> = collection.map(Result::unwrap).collect();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|item| !item.auto_hydrate()));
    assert_eq!(adapter.count(Method::Get), 2);

    let typed: Vec<Thing> = client
        .find::<Thing>(&filters)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(typed[1].name().unwrap().as_deref(), Some("thing 2"));
}

#[test]
fn non_json_responses_are_protocol_errors() {
    let adapter = MemoryAdapter::new()
        .with_raw("/things/9", "text/html", b"<html></html>".to_vec())
        .with_raw("/things", "text/html", b"<html></html>".to_vec());
    let (client, _) = client_for(adapter);

    let thing: Thing = client.get(9).unwrap();
    assert!(thing.count().unwrap_err().is_protocol());

    let mut collection = client
        .get_collection("Thing", &Filters::new(), CollectionOptions::default())
        .unwrap();
    assert!(collection.next().unwrap().unwrap_err().is_protocol());
    assert!(collection.next().is_none());
}

#[test]
fn create_with_post() {
    let (client, adapter) = client_for(things().with_next_id(40));
    let universe: Universe = client.get(3).unwrap();

    let thing: Thing = client.create_typed().unwrap();
    assert_eq!(thing.resource().hydration_state(), HydrationState::Uninitialized);
    thing.set_name("new".to_string()).unwrap();
    thing.set_count(3).unwrap();
    thing.set_universe(Some(universe)).unwrap();
    assert_eq!(adapter.request_count(), 0);

    client.post(thing.resource()).unwrap();
    let post = adapter.last_request().unwrap();
    assert_eq!(post.method, Method::Post);
    assert_eq!(post.target.as_str(), "/things");
    assert_eq!(
        post.json_body().unwrap(),
        json!({"name": "new", "count": 3, "universe": "/universes/3"})
    );

    assert_eq!(thing.id(), Some(ResourceId::Integer(40)));
    assert!(client.contains(thing.resource()));
    assert_eq!(client.get::<Thing>(40).unwrap(), thing);
    assert!(thing.resource().edited_fields().unwrap().is_empty());
}

#[test]
fn delete_requires_identity() {
    let (client, adapter) = client_for(things());
    let unsaved = client.create("Thing").unwrap();
    assert!(client.delete(&unsaved).unwrap_err().is_precondition());

    client.get_by_reference("/things/2", false).unwrap();
    let known = client.len();
    client.delete_by_id("Thing", 2).unwrap();
    assert_eq!(client.len(), known - 1);
    assert_eq!(adapter.last_request().unwrap().target.as_str(), "/things/2");

    let err = client.delete_by_id("Thing", 2).unwrap_err();
    assert!(matches!(err, ClientError::Adapter(ref e) if e.status() == Some(404)));
}

#[test]
fn response_parsing() {
    let (client, adapter) = client_for(things());

    let raw = Response::raw(200, "text/plain", b"ok".to_vec());
    assert!(client.parse_response(raw).unwrap().is_none());
    let untyped = Response::json(200, json!({"id": 1}));
    assert!(client.parse_response(untyped).unwrap().is_none());

    let anonymous = Response::json(200, json!({"@type": "Thing", "name": "?"}));
    assert!(client.parse_response(anonymous).unwrap_err().is_protocol());

    let object = Response::json(200, json!({"@type": "Thing", "@id": "/things/1", "id": 1, "count": 9}));
    let Some(ParsedResponse::Resource(thing)) = client.parse_response(object).unwrap() else {
        panic!("expected a resource");
    };
    assert_eq!(thing, client.get_by_reference("/things/1", false).unwrap());
    assert_eq!(thing.get("count").unwrap(), FieldValue::Integer(9));

    let page = json!({
        "@type": "hydra:Collection",
        "hydra:totalItems": 2,
        "hydra:member": ["/things/1", thing_doc(2)]
    });
    let Some(ParsedResponse::Collection(collection)) =
        client.parse_response(Response::json(200, page)).unwrap()
    else {
        panic!("expected a collection");
    };
    assert_eq!(collection.total_items(), Some(2));
    assert!(!collection.has_next_page());
    let items: Vec<_> = collection.map(Result::unwrap).collect();
    assert_eq!(items[0], thing);
    assert_eq!(adapter.request_count(), 0);
}

#[test]
fn warm_up_runs_once_on_first_use() {
    let adapter = things().with_document("/sports", sports_page());
    let metadata = registry().with_type::<Sport>();
    let (client, adapter) = client_with(adapter, metadata, ClientConfig::default());
    assert!(!client.is_warmed_up());

    client.get_by_reference("/things/1", false).unwrap();
    assert!(client.is_warmed_up());
    assert_eq!(adapter.warm_ups(), 1);

    let fetch = adapter.requests().into_iter().next().unwrap();
    assert_eq!(fetch.target.as_str(), "/sports");
    assert!(!fetch.execution_cache);
    assert_eq!(fetch.cache.map(|hints| hints.ttl), Some(Duration::from_secs(600)));

    client.cache_warm_up().unwrap();
    client.get_collection("Thing", &Filters::new(), CollectionOptions::default()).unwrap();
    assert_eq!(adapter.warm_ups(), 1);
    assert_eq!(adapter.count(Method::Get), 1);

    let cycling: Sport = client.get(2).unwrap();
    assert_eq!(cycling.name().unwrap().as_deref(), Some("Cycling"));
    assert_eq!(adapter.count(Method::Get), 1);
}

#[test]
fn warm_up_feeds_cached_responses() {
    let adapter = MemoryAdapter::new()
        .with_warm_responses("Sport", vec![Response::json(200, sports_page())]);
    let metadata = registry().with_type::<Sport>();
    let config = ClientConfig::from_toml("warm_up_on_first_use = false").unwrap();
    let (client, adapter) = client_with(adapter, metadata, config);

    client.get_by_reference("/sports/1", false).unwrap();
    assert_eq!(adapter.warm_ups(), 0);

    client.cache_warm_up().unwrap();
    client.cache_warm_up().unwrap();
    assert_eq!(adapter.warm_ups(), 1);
    assert_eq!(client.len(), 2);
    assert_eq!(adapter.request_count(), 0);

    let running: Sport = client.get(1).unwrap();
    assert_eq!(running.name().unwrap().as_deref(), Some("Running"));
    assert_eq!(adapter.request_count(), 0);
}

#[test]
fn resources_outlive_their_client() {
    let thing = {
        let (client, _) = client_for(things());
        client.get_by_reference("/things/1", false).unwrap()
    };
    assert!(matches!(thing.get("count"), Err(ClientError::Detached(_))));
    assert_eq!(thing.id(), Some(ResourceId::Integer(1)));
}

#[test]
fn typed_metadata() {
    let metadata = Thing::metadata();
    assert_eq!(metadata.class(), "Thing");
    let names: Vec<_> = metadata.fields().map(|(name, _)| name).collect();
    assert_eq!(names, ["name", "count", "ratio", "tags", "universe", "createdAt"]);
    assert!(metadata.field("tags").is_some_and(|d| d.array));
    assert!(metadata.field("createdAt").is_some_and(|d| !d.writable));
    assert_eq!(
        metadata.field("universe").and_then(|d| d.reference_class()),
        Some("Universe")
    );
    assert!(Sport::metadata().cache().is_warmup_eligible());
    assert_eq!(Thing::ROUTE, "/things");
}

/// Serves reads from the wrapped adapter and rejects every write.
struct ReadOnlyApi(MemoryAdapter);

impl Adapter for ReadOnlyApi {
    fn call(&self, request: Request) -> Result<Response, AdapterError> {
        match request.method {
            Method::Get => self.0.call(request),
            method => Err(AdapterError::Status {
                status: 503,
                message: format!("{method} {} rejected", request.target),
            }),
        }
    }
}

fn read_only_client(adapter: MemoryAdapter) -> Client {
    let resolver = RouteResolver::new()
        .with_type::<Thing>()
        .with_type::<Universe>();
    Client::new(Context::new(ReadOnlyApi(adapter), resolver, registry()))
}

#[test]
fn leading_zero_ids_address_their_own_resource() {
    let adapter = MemoryAdapter::new().with_document(
        "/universes/007",
        json!({"@id": "/universes/007", "@type": "Universe", "id": "007", "name": "Bond"}),
    );
    let (client, adapter) = client_for(adapter);

    let universe = client.get_by_class_and_id("Universe", "007", false).unwrap();
    assert_eq!(universe.iri().unwrap().as_str(), "/universes/007");
    assert_eq!(universe.get("name").unwrap().as_str(), Some("Bond"));
    assert_eq!(universe.id(), Some(ResourceId::String("007".into())));
    assert_eq!(adapter.last_request().unwrap().target.as_str(), "/universes/007");

    assert_eq!(client.get_by_reference("/universes/007", false).unwrap(), universe);
    assert_ne!(client.get_by_class_and_id("Universe", 7, false).unwrap(), universe);
}

#[test]
fn read_only_edits_send_nothing() {
    let (client, adapter) = client_for(things());
    let thing: Thing = client.get(1).unwrap();

    thing
        .set_created_at(Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()))
        .unwrap();
    client.put(thing.resource()).unwrap();
    assert_eq!(adapter.count(Method::Put), 0);

    thing.set_count(2).unwrap();
    client.put(thing.resource()).unwrap();
    let put = adapter.last_request().unwrap();
    assert_eq!(put.method, Method::Put);
    assert_eq!(put.json_body().unwrap(), json!({"count": 2}));
}

#[test]
fn bad_member_keeps_the_rest_of_its_page() {
    let adapter = things().with_document(
        "/mixed",
        json!({
            "@type": "hydra:Collection",
            "hydra:member": ["/things/1", "/nowhere/9", "/things/2"],
            "hydra:view": {"hydra:next": "/mixed?page=2"}
        }),
    );
    let (client, adapter) = client_for(adapter);
    let results: Vec<_> = client
        .get_collection_from(Some("Thing"), "/mixed", CollectionOptions::default())
        .unwrap()
        .collect();

    assert_eq!(results.len(), 3);
    assert_eq!(
        results[0].as_ref().unwrap(),
        &client.get_by_reference("/things/1", false).unwrap()
    );
    assert_eq!(
        results[1].as_ref().unwrap(),
        &client.get_by_reference("/things/2", false).unwrap()
    );
    assert!(matches!(results[2], Err(ClientError::InvalidReference(_))));
    assert_eq!(adapter.request_count(), 1);
}

#[test]
fn collection_auto_hydrate_applies_to_shared_instances() {
    let adapter = things().with_document(
        "/things",
        json!({"@type": "hydra:Collection", "hydra:member": ["/things/1"]}),
    );
    let (client, _) = client_for(adapter);
    let earlier = client.get_by_reference("/things/1", false).unwrap();
    assert!(earlier.auto_hydrate());

    let items: Vec<_> = client
        .get_collection(
            "Thing",
            &Filters::new(),
            CollectionOptions::default().without_auto_hydrate(),
        )
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(items, [earlier.clone()]);
    assert!(!earlier.auto_hydrate());
}

#[test]
fn failed_update_keeps_the_snapshot() {
    let client = read_only_client(things());
    let thing: Thing = client.get(1).unwrap();
    thing.set_count(2).unwrap();

    let err = client.put(thing.resource()).unwrap_err();
    assert!(matches!(err, ClientError::Adapter(ref e) if e.status() == Some(503)));
    assert_eq!(thing.resource().remote_value("count"), Some(json!(1)));
    assert_eq!(thing.count().unwrap(), Some(2));
    assert_eq!(thing.resource().edited_fields().unwrap(), ["count"]);
}

#[test]
fn failed_create_leaves_the_resource_unregistered() {
    let client = read_only_client(things());
    let thing: Thing = client.create_typed().unwrap();
    thing.set_name("new".to_string()).unwrap();

    assert!(client.post(thing.resource()).is_err());
    assert_eq!(thing.id(), None);
    assert_eq!(thing.resource().hydration_state(), HydrationState::Uninitialized);
    assert!(!client.contains(thing.resource()));
    assert!(client.is_empty());
}
