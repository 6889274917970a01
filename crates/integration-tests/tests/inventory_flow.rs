//! End-to-end catalogue and checkout flows against `PostgreSQL`.
//!
//! These tests require `DATABASE_URL` pointing at a disposable database.
//! Run with: cargo test -p stockroom-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};
use stockroom_core::Role;
use stockroom_integration_tests::{TestApp, unique};

/// Creates a sized tee (S: 5, M: 1) and returns `(product_id, small_id, medium_id)`.
async fn create_sized_tee(app: &TestApp, admin: &str) -> (String, String, String) {
    let body = json!({
        "name": unique("Tee"),
        "basePrice": "20.00",
        "options": [{"name": "Size", "values": ["S", "M"]}],
        "variants": [
            {"price": "20.00", "stock": 5, "selections": [{"option": "Size", "value": "S"}]},
            {"price": "22.00", "stock": 1, "selections": [{"option": "Size", "value": "M"}]},
        ],
    });
    let created = app.post("/api/products", Some(admin), &body).await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let product_id = created.data()["id"].as_str().unwrap().to_owned();

    let detail = app.get(&format!("/api/products/{product_id}"), None).await;
    let variant_for = |size: &str| -> String {
        detail.data()["variants"]
            .as_array()
            .unwrap()
            .iter()
            .find(|v| v["selections"][0]["value"] == json!(size))
            .and_then(|v| v["id"].as_str())
            .unwrap()
            .to_owned()
    };
    let small = variant_for("S");
    let medium = variant_for("M");
    (product_id, small, medium)
}

async fn create_simple_product(app: &TestApp, admin: &str, stock: i32) -> String {
    let body = json!({
        "name": unique("Mug"),
        "basePrice": "9.50",
        "sku": unique("MUG").replace(' ', "-"),
        "baseStock": stock,
    });
    let created = app.post("/api/products", Some(admin), &body).await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    created.data()["id"].as_str().unwrap().to_owned()
}

async fn variant_stock(app: &TestApp, product_id: &str, variant_id: &str) -> i64 {
    let detail = app.get(&format!("/api/products/{product_id}"), None).await;
    detail.data()["variants"]
        .as_array()
        .unwrap()
        .iter()
        .find(|v| v["id"] == json!(variant_id))
        .and_then(|v| v["stock"].as_i64())
        .unwrap()
}

async fn base_stock(app: &TestApp, product_id: &str) -> Value {
    let detail = app.get(&format!("/api/products/{product_id}"), None).await;
    detail.data()["baseStock"].clone()
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_variant_order_deducts_stock() {
    let app = TestApp::with_database().await;
    let (_, admin) = app.create_user(Role::Admin).await;
    let (_, buyer) = app.create_user(Role::User).await;
    let (product_id, small, _) = create_sized_tee(&app, &admin).await;

    let order = json!({"items": [{"id": small, "type": "variant", "quantity": 2}]});
    let placed = app.post("/api/orders", Some(&buyer), &order).await;

    assert_eq!(placed.status, StatusCode::CREATED, "{}", placed.body);
    assert_eq!(placed.data()["itemCount"], json!(2));
    assert_eq!(variant_stock(&app, &product_id, &small).await, 3);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_short_stock_rejects_the_whole_order() {
    let app = TestApp::with_database().await;
    let (_, admin) = app.create_user(Role::Admin).await;
    let (_, buyer) = app.create_user(Role::User).await;
    let (product_id, small, medium) = create_sized_tee(&app, &admin).await;

    let order = json!({"items": [
        {"id": small, "type": "variant", "quantity": 1},
        {"id": medium, "type": "variant", "quantity": 2},
    ]});
    let rejected = app.post("/api/orders", Some(&buyer), &order).await;

    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(variant_stock(&app, &product_id, &small).await, 5);
    assert_eq!(variant_stock(&app, &product_id, &medium).await, 1);

    let mine = app.get("/api/orders", Some(&buyer)).await;
    assert_eq!(mine.data(), &json!([]));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_bundle_order_deducts_every_component() {
    let app = TestApp::with_database().await;
    let (_, admin) = app.create_user(Role::Admin).await;
    let (_, buyer) = app.create_user(Role::User).await;
    let (tee_id, small, _) = create_sized_tee(&app, &admin).await;
    let mug_id = create_simple_product(&app, &admin, 3).await;

    let bundle = json!({
        "name": unique("Kit"),
        "price": "25.00",
        "products": [
            {"productId": mug_id, "quantity": 1},
            {"productId": tee_id, "variants": [{"variantId": small, "quantity": 2}]},
        ],
    });
    let created = app.post("/api/bundles", Some(&admin), &bundle).await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let bundle_id = created.data()["id"].as_str().unwrap().to_owned();

    let order = json!({"items": [{"id": bundle_id, "type": "bundle", "quantity": 2}]});
    let placed = app.post("/api/orders", Some(&buyer), &order).await;

    assert_eq!(placed.status, StatusCode::CREATED, "{}", placed.body);
    assert_eq!(base_stock(&app, &mug_id).await, json!(1));
    assert_eq!(variant_stock(&app, &tee_id, &small).await, 1);

    let again = app.post("/api/orders", Some(&buyer), &order).await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(base_stock(&app, &mug_id).await, json!(1));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_product_in_active_bundle_cannot_be_deleted() {
    let app = TestApp::with_database().await;
    let (_, admin) = app.create_user(Role::Admin).await;
    let mug_id = create_simple_product(&app, &admin, 3).await;

    let bundle = json!({
        "name": unique("Kit"),
        "price": "12.00",
        "products": [{"productId": mug_id, "quantity": 1}],
    });
    let created = app.post("/api/bundles", Some(&admin), &bundle).await;
    let bundle_id = created.data()["id"].as_str().unwrap().to_owned();

    let blocked = app
        .send(Method::DELETE, &format!("/api/products/{mug_id}"), Some(&admin), None)
        .await;
    assert_eq!(blocked.status, StatusCode::BAD_REQUEST);

    let removed = app
        .send(Method::DELETE, &format!("/api/bundles/{bundle_id}"), Some(&admin), None)
        .await;
    assert_eq!(removed.status, StatusCode::OK);
    let twice = app
        .send(Method::DELETE, &format!("/api/bundles/{bundle_id}"), Some(&admin), None)
        .await;
    assert_eq!(twice.status, StatusCode::BAD_REQUEST);

    let deleted = app
        .send(Method::DELETE, &format!("/api/products/{mug_id}"), Some(&admin), None)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    let gone = app.get(&format!("/api/products/{mug_id}"), None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_orders_are_private_to_their_owner() {
    let app = TestApp::with_database().await;
    let (_, admin) = app.create_user(Role::Admin).await;
    let (_, buyer) = app.create_user(Role::User).await;
    let (_, stranger) = app.create_user(Role::User).await;
    let mug_id = create_simple_product(&app, &admin, 3).await;

    let order = json!({"items": [{"id": mug_id, "type": "Product", "quantity": 1}]});
    let placed = app.post("/api/orders", Some(&buyer), &order).await;
    let order_id = placed.data()["orderId"].as_str().unwrap().to_owned();
    let uri = format!("/api/orders/{order_id}");

    assert_eq!(app.get(&uri, Some(&buyer)).await.status, StatusCode::OK);
    assert_eq!(app.get(&uri, Some(&stranger)).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&uri, Some(&admin)).await.status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_duplicate_product_name_is_reported_on_the_field() {
    let app = TestApp::with_database().await;
    let (_, admin) = app.create_user(Role::Admin).await;
    let name = unique("Poster");
    let body = json!({"name": name, "basePrice": "5.00", "baseStock": 1});

    let first = app.post("/api/products", Some(&admin), &body).await;
    assert_eq!(first.status, StatusCode::CREATED);

    let upper = json!({"name": name.to_uppercase(), "basePrice": "5.00", "baseStock": 1});
    let second = app.post("/api/products", Some(&admin), &upper).await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.error_fields(), vec!["request.name"]);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_duplicate_variant_sku_is_reported_on_the_field() {
    let app = TestApp::with_database().await;
    let (_, admin) = app.create_user(Role::Admin).await;
    let sku = unique("CAP").replace(' ', "-");
    let product = |sku: &str| {
        json!({
            "name": unique("Cap"),
            "basePrice": "15.00",
            "options": [{"name": "Size", "values": ["One"]}],
            "variants": [
                {"sku": sku, "price": "15.00", "stock": 2, "selections": [{"option": "Size", "value": "One"}]},
            ],
        })
    };

    let first = app.post("/api/products", Some(&admin), &product(&sku)).await;
    assert_eq!(first.status, StatusCode::CREATED, "{}", first.body);

    let second = app
        .post("/api/products", Some(&admin), &product(&sku.to_lowercase()))
        .await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST, "{}", second.body);
    assert_eq!(second.error_fields(), vec!["variants[0].sku"]);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_created_bundle_reads_back() {
    let app = TestApp::with_database().await;
    let (_, admin) = app.create_user(Role::Admin).await;
    let (tee_id, small, _) = create_sized_tee(&app, &admin).await;
    let mug_id = create_simple_product(&app, &admin, 3).await;
    let name = unique("Kit");

    let bundle = json!({
        "name": name,
        "description": "Mug and two small tees",
        "price": "40.00",
        "products": [
            {"productId": mug_id, "quantity": 1},
            {"productId": tee_id, "variants": [{"variantId": small, "quantity": 2}]},
        ],
    });
    let created = app.post("/api/bundles", Some(&admin), &bundle).await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let bundle_id = created.data()["id"].as_str().unwrap().to_owned();

    let fetched = app.get(&format!("/api/bundles/{bundle_id}"), None).await;
    assert_eq!(fetched.status, StatusCode::OK, "{}", fetched.body);
    let data = fetched.data();
    assert_eq!(data["id"], json!(bundle_id));
    assert_eq!(data["name"], json!(name));
    assert_eq!(data["description"], json!("Mug and two small tees"));
    // min(3 / 1, 5 / 2)
    assert_eq!(data["availableBundles"], json!(2));

    let lines = data["products"].as_array().unwrap();
    assert_eq!(lines.len(), 2);
    let line = |id: &str| lines.iter().find(|l| l["productId"] == json!(id)).unwrap();
    assert_eq!(line(&mug_id)["quantity"], json!(1));
    let tee_variants = line(&tee_id)["variants"].as_array().unwrap();
    assert_eq!(tee_variants.len(), 1);
    assert_eq!(tee_variants[0]["variantId"], json!(small));
    assert_eq!(tee_variants[0]["quantity"], json!(2));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_repeated_bundle_update_is_idempotent() {
    let app = TestApp::with_database().await;
    let (_, admin) = app.create_user(Role::Admin).await;
    let (tee_id, small, medium) = create_sized_tee(&app, &admin).await;
    let mug_id = create_simple_product(&app, &admin, 3).await;
    let name = unique("Kit");

    let created = app
        .post(
            "/api/bundles",
            Some(&admin),
            &json!({
                "name": name,
                "price": "25.00",
                "products": [{"productId": mug_id, "quantity": 1}],
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let uri = format!("/api/bundles/{}", created.data()["id"].as_str().unwrap());

    let update = json!({
        "name": name,
        "price": "30.00",
        "products": [
            {"productId": mug_id, "quantity": 2},
            {"productId": tee_id, "variants": [
                {"variantId": small, "quantity": 1},
                {"variantId": medium, "quantity": 1},
            ]},
        ],
    });
    let first = app.send(Method::PUT, &uri, Some(&admin), Some(&update)).await;
    assert_eq!(first.status, StatusCode::OK, "{}", first.body);
    let second = app.send(Method::PUT, &uri, Some(&admin), Some(&update)).await;
    assert_eq!(second.status, StatusCode::OK, "{}", second.body);

    for key in ["id", "name", "price", "availableBundles", "products"] {
        assert_eq!(first.data()[key], second.data()[key], "{key} changed");
    }
    let fetched = app.get(&uri, None).await;
    assert_eq!(fetched.data()["products"], first.data()["products"]);
    // M has one in stock
    assert_eq!(fetched.data()["availableBundles"], json!(1));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_bundle_shortfall_undoes_earlier_lines() {
    let app = TestApp::with_database().await;
    let (_, admin) = app.create_user(Role::Admin).await;
    let (_, buyer) = app.create_user(Role::User).await;
    let (tee_id, small, _) = create_sized_tee(&app, &admin).await;
    let mug_id = create_simple_product(&app, &admin, 3).await;

    let bundle = json!({
        "name": unique("Kit"),
        "price": "25.00",
        "products": [
            {"productId": mug_id, "quantity": 1},
            {"productId": tee_id, "variants": [{"variantId": small, "quantity": 2}]},
        ],
    });
    let created = app.post("/api/bundles", Some(&admin), &bundle).await;
    let bundle_id = created.data()["id"].as_str().unwrap().to_owned();

    // The mug and tee lines fit; the bundle then needs two more small tees
    // than the order has left.
    let order = json!({"items": [
        {"id": mug_id, "type": "product", "quantity": 2},
        {"id": small, "type": "variant", "quantity": 4},
        {"id": bundle_id, "type": "bundle", "quantity": 1},
    ]});
    let rejected = app.post("/api/orders", Some(&buyer), &order).await;

    assert_eq!(rejected.status, StatusCode::BAD_REQUEST, "{}", rejected.body);
    assert_eq!(base_stock(&app, &mug_id).await, json!(3));
    assert_eq!(variant_stock(&app, &tee_id, &small).await, 5);
    let mine = app.get("/api/orders", Some(&buyer)).await;
    assert_eq!(mine.data(), &json!([]));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_orders_for_the_last_unit() {
    let app = TestApp::with_database().await;
    let (_, admin) = app.create_user(Role::Admin).await;
    let (_, first_buyer) = app.create_user(Role::User).await;
    let (_, second_buyer) = app.create_user(Role::User).await;
    let (product_id, _, medium) = create_sized_tee(&app, &admin).await;

    let order = json!({"items": [{"id": medium, "type": "variant", "quantity": 1}]});
    let (a, b) = tokio::join!(
        app.post("/api/orders", Some(&first_buyer), &order),
        app.post("/api/orders", Some(&second_buyer), &order),
    );

    let mut statuses = [a.status, b.status];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::BAD_REQUEST]);
    assert_eq!(variant_stock(&app, &product_id, &medium).await, 0);
}
