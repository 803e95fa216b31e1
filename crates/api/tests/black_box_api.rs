use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use storeops_api::app::{build_app, services::AppServices};

struct TestServer {
    base_url: String,
    actor: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let services = AppServices::in_memory();
        services
            .loyalty
            .ensure_default_program(Decimal::ONE)
            .expect("default program");

        // Same router as prod, bound to an ephemeral port.
        let app = build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            actor: Uuid::now_v7().to_string(),
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = self
            .client
            .request(method, self.url(path))
            .header("x-actor-id", &self.actor);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await.expect("request failed");
        let status = res.status();
        let text = res.text().await.unwrap();
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        (status, body)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, Some(body)).await
    }

    async fn patch(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::PATCH, path, Some(body)).await
    }

    /// Creates a DRAFT transfer of two units; returns its path.
    async fn draft_transfer(&self, from: &str, to: &str, product: &str) -> String {
        let (status, transfer) = self
            .post(
                "/transfers",
                json!({
                    "fromLocationId": from,
                    "toLocationId": to,
                    "items": [{"productId": product, "quantity": 2}],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{transfer}");
        format!("/transfers/{}", transfer["id"].as_str().unwrap())
    }

    async fn location(&self, code: &str, kind: &str) -> String {
        let (status, body) = self
            .post("/locations", json!({"code": code, "name": code, "type": kind}))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    /// Opening balance via a direct ADD; returns the inventory record id.
    async fn stock(&self, product: &str, location: &str, quantity: i64) -> String {
        let (status, body) = self
            .post(
                "/inventory/receive",
                json!({
                    "productId": product,
                    "locationId": location,
                    "quantity": quantity,
                    "costPrice": "4.00",
                    "retailPrice": "10.00",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn quantity(&self, record: &str) -> i64 {
        let (status, body) = self.get(&format!("/inventory/items/{record}")).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["quantity"].as_i64().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn product() -> String {
    Uuid::now_v7().to_string()
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().expect("decimal as string").parse().unwrap()
}

fn checkout_body(store: &str, product: &str, record: &str, quantity: i64) -> Value {
    let total = format!("{}.00", quantity * 10);
    json!({
        "storeId": store,
        "items": [{
            "productId": product,
            "inventoryItemId": record,
            "quantity": quantity,
            "unitPrice": "10.00",
            "discountAmount": "0",
        }],
        "subtotalAmount": total,
        "taxAmount": "0",
        "discountAmount": "0",
        "totalAmount": total,
        "paymentMethod": "cash",
        "amountPaid": total,
    })
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_an_actor() {
    let server = TestServer::spawn().await;

    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.client.get(server.url("/locations")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let res = server
        .client
        .get(server.url("/locations"))
        .header("x-actor-id", "not-a-uuid")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn checkout_decrements_stock_and_records_the_sale() {
    let server = TestServer::spawn().await;
    let store = server.location("S1", "STORE").await;
    let product = product();
    let record = server.stock(&product, &store, 10).await;

    let (status, body) = server.post("/checkout", checkout_body(&store, &product, &record, 4)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["sale"]["paymentStatus"], "PAID");
    assert!(body["sale"]["receiptNumber"].as_str().unwrap().starts_with('S'));
    assert_eq!(body["movements"][0]["delta"], -4);
    assert_eq!(body["movements"][0]["reason"], "SALE");
    assert_eq!(server.quantity(&record).await, 6);

    let sale_id = body["sale"]["id"].as_str().unwrap();
    let (status, sale) = server.get(&format!("/sales/{sale_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&sale["totalAmount"]), Decimal::new(40, 0));
}

#[tokio::test]
async fn checkout_beyond_stock_is_rejected_without_side_effects() {
    let server = TestServer::spawn().await;
    let store = server.location("S1", "STORE").await;
    let product = product();
    let record = server.stock(&product, &store, 3).await;

    let (status, body) = server.post("/checkout", checkout_body(&store, &product, &record, 5)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_stock");

    assert_eq!(server.quantity(&record).await, 3);
    let (_, history) = server.get(&format!("/inventory/items/{record}/movements")).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn manual_adjustments_follow_the_delta_rules() {
    let server = TestServer::spawn().await;
    let warehouse = server.location("W1", "WAREHOUSE").await;
    let record = server.stock(&product(), &warehouse, 5).await;
    let path = format!("/inventory/items/{record}/adjust");

    let (status, body) = server
        .post(&path, json!({"adjustmentType": "set", "quantity": 12, "reason": "recount"}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["movement"]["delta"], 7);
    assert_eq!(body["item"]["quantity"], 12);

    let (status, body) = server
        .post(&path, json!({"adjustmentType": "remove", "quantity": 13}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_stock");

    let (status, body) = server
        .post(&path, json!({"adjustmentType": "add", "quantity": -1}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = server
        .post("/inventory/items/nope/adjust", json!({"adjustmentType": "add", "quantity": 1}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server.get(&format!("/inventory/items/{}", Uuid::now_v7())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn transfer_ships_and_receives_through_the_api() {
    let server = TestServer::spawn().await;
    let warehouse = server.location("W1", "WAREHOUSE").await;
    let store = server.location("S1", "STORE").await;
    let product = product();
    let source = server.stock(&product, &warehouse, 20).await;

    let (status, transfer) = server
        .post(
            "/transfers",
            json!({
                "fromLocationId": warehouse,
                "toLocationId": store,
                "items": [{"productId": product, "quantity": 8}],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{transfer}");
    assert_eq!(transfer["status"], "DRAFT");
    let id = transfer["id"].as_str().unwrap().to_string();
    let path = format!("/transfers/{id}");

    // Shipping a draft is not a legal transition.
    let (status, body) = server.post(&format!("{path}/process"), json!({"action": "ship"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_state_transition");

    for next in ["PENDING", "APPROVED"] {
        let (status, body) = server
            .send(reqwest::Method::PATCH, &path, Some(json!({"status": next})))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], next);
    }

    let (status, body) = server
        .post(
            &format!("{path}/process"),
            json!({"action": "ship", "shippingMethod": "van", "trackingNumber": "T-1"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["transfer"]["status"], "IN_TRANSIT");
    assert_eq!(body["transfer"]["trackingNumber"], "T-1");
    assert_eq!(server.quantity(&source).await, 12);

    let (status, body) = server.post(&format!("{path}/process"), json!({"action": "receive"})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["transfer"]["status"], "COMPLETED");
    let target = body["movements"][0]["inventoryItemId"].as_str().unwrap().to_string();
    assert_eq!(server.quantity(&target).await, 8);

    let (status, body) = server.send(reqwest::Method::DELETE, &path, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn audit_counts_report_progress_and_reconcile_sets_stock() {
    let server = TestServer::spawn().await;
    let warehouse = server.location("W1", "WAREHOUSE").await;
    let first = product();
    let second = product();
    let first_record = server.stock(&first, &warehouse, 20).await;
    server.stock(&second, &warehouse, 5).await;

    let (status, audit) = server
        .post(
            "/audits",
            json!({"warehouseId": warehouse, "productIds": [first, second]}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{audit}");
    let id = audit["id"].as_str().unwrap().to_string();

    let (status, audit) = server.post(&format!("/audits/{id}/start"), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{audit}");
    assert_eq!(audit["status"], "IN_PROGRESS");
    let items = audit["items"].as_array().unwrap();
    let item_for = |product: &str| {
        items
            .iter()
            .find(|i| i["productId"] == product)
            .map(|i| i["id"].as_u64().unwrap())
            .unwrap()
    };
    let first_item = item_for(&first);
    let second_item = item_for(&second);

    let (status, body) = server
        .send(
            reqwest::Method::PUT,
            &format!("/audits/{id}/items"),
            Some(json!({"items": [
                {"id": first_item, "actualQuantity": 18, "notes": "two missing"},
                {"id": second_item, "actualQuantity": 5},
            ]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["completed"], false);
    assert_eq!(body["progress"]["percentage"], 50);
    assert_eq!(body["progress"]["discrepancyItems"], 1);
    let counted = body["items"].as_array().unwrap();
    assert!(counted.iter().any(|i| i["discrepancy"] == -2 && i["status"] == "DISCREPANCY"));

    // Counting does not touch the ledger.
    assert_eq!(server.quantity(&first_record).await, 20);

    let (status, body) = server
        .post(&format!("/audits/{id}/items/{first_item}/reconcile"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["completed"], true);
    assert_eq!(body["movement"]["movementType"], "SET");
    assert_eq!(server.quantity(&first_record).await, 18);

    let (_, audit) = server.get(&format!("/audits/{id}")).await;
    assert_eq!(audit["status"], "COMPLETED");
    assert_eq!(audit["progress"]["percentage"], 100);
}

#[tokio::test]
async fn purchase_order_over_receipt_is_rejected() {
    let server = TestServer::spawn().await;
    let warehouse = server.location("W1", "WAREHOUSE").await;
    let product = product();

    let (status, order) = server
        .post(
            "/purchase-orders",
            json!({
                "supplierId": Uuid::now_v7(),
                "warehouseId": warehouse,
                "items": [{"productId": product, "quantity": 8, "unitPrice": "2.50"}],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(decimal(&order["totalAmount"]), Decimal::new(20, 0));
    let id = order["id"].as_str().unwrap().to_string();

    let (status, _) = server.post(&format!("/purchase-orders/{id}/place"), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let receive = format!("/purchase-orders/{id}/receive");
    let (status, body) = server.post(&receive, json!({"items": [{"id": 1, "quantity": 6}]})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["purchaseOrder"]["status"], "PARTIAL");
    let record = body["movements"][0]["inventoryItemId"].as_str().unwrap().to_string();
    assert_eq!(server.quantity(&record).await, 6);

    let (status, body) = server.post(&receive, json!({"items": [{"id": 1, "quantity": 3}]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "over_receipt");
    assert_eq!(server.quantity(&record).await, 6);

    let (status, body) = server.post(&receive, json!({"items": [{"id": 1, "quantity": 2}]})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["purchaseOrder"]["status"], "RECEIVED");
}

#[tokio::test]
async fn loyalty_points_are_earned_redeemed_and_reversed() {
    let server = TestServer::spawn().await;
    let store = server.location("S1", "STORE").await;
    let product = product();
    let record = server.stock(&product, &store, 10).await;
    let customer = Uuid::now_v7().to_string();

    let mut body = checkout_body(&store, &product, &record, 3);
    body["customerId"] = json!(customer);
    let (status, sale) = server.post("/checkout", body).await;
    assert_eq!(status, StatusCode::CREATED, "{sale}");
    assert_eq!(sale["loyalty"]["loyaltyPoints"], 30);

    let (status, body) = server
        .post(
            &format!("/loyalty/accounts/{customer}/transactions"),
            json!({"type": "EARN", "points": 5}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let mut redeem = checkout_body(&store, &product, &record, 1);
    redeem["customerId"] = json!(customer);
    redeem["applyLoyaltyPoints"] = json!(true);
    redeem["loyaltyPointsUsed"] = json!(500);
    let (status, body) = server.post("/checkout", redeem).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_loyalty_points");
    assert_eq!(server.quantity(&record).await, 7);

    let sale_id = sale["sale"]["id"].as_str().unwrap();
    let (status, body) = server
        .post(
            &format!("/sales/{sale_id}/returns"),
            json!({"items": [{"lineNo": 1, "quantity": 1}], "reason": "wrong size"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(decimal(&body["saleReturn"]["refundAmount"]), Decimal::new(10, 0));
    assert_eq!(body["saleReturn"]["pointsReversed"], 10);
    assert_eq!(server.quantity(&record).await, 8);

    let (status, account) = server.get(&format!("/loyalty/accounts/{customer}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(account["loyaltyPoints"], 20);
    let sum: i64 = account["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["points"].as_i64().unwrap())
        .sum();
    assert_eq!(sum, 20);
}

#[tokio::test]
async fn reservations_and_quarantine_limit_what_checkout_can_sell() {
    let server = TestServer::spawn().await;
    let store = server.location("S1", "STORE").await;
    let product = product();
    let record = server.stock(&product, &store, 5).await;
    let item = format!("/inventory/items/{record}");

    let (status, body) = server.post(&format!("{item}/reserve"), json!({"quantity": 4})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["reservedQuantity"], 4);
    assert_eq!(body["availableQuantity"], 1);

    let (status, body) = server.post(&format!("{item}/reserve"), json!({"quantity": 2})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_stock");

    let (status, body) = server.post("/checkout", checkout_body(&store, &product, &record, 2)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(server.quantity(&record).await, 5);

    let (status, body) = server
        .post(&format!("{item}/release-reservation"), json!({"quantity": 4}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["availableQuantity"], 5);

    let (status, body) = server
        .post(&format!("{item}/quarantine"), json!({"reason": "supplier recall"}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "QUARANTINE");
    let (status, body) = server.post("/checkout", checkout_body(&store, &product, &record, 1)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_stock");

    let (status, body) = server.post(&format!("{item}/release-quarantine"), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "AVAILABLE");
    let (status, body) = server.post("/checkout", checkout_body(&store, &product, &record, 2)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(server.quantity(&record).await, 3);

    let (status, body) = server
        .post(&format!("{item}/condition"), json!({"condition": "DAMAGED"}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["condition"], "DAMAGED");
    let (status, body) = server.post("/checkout", checkout_body(&store, &product, &record, 1)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_stock");
}

#[tokio::test]
async fn transfer_transitions_outside_the_table_are_rejected() {
    let server = TestServer::spawn().await;
    let warehouse = server.location("W1", "WAREHOUSE").await;
    let store = server.location("S1", "STORE").await;
    let product = product();
    server.stock(&product, &warehouse, 10).await;

    // Reject is only reachable from PENDING.
    let path = server.draft_transfer(&warehouse, &store, &product).await;
    let (status, body) = server.patch(&path, json!({"status": "REJECTED", "reason": "no"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_state_transition");

    // Delete is only legal in DRAFT; cancel is not legal once approved.
    let (status, _) = server.patch(&path, json!({"status": "PENDING"})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = server.send(reqwest::Method::DELETE, &path, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_state_transition");
    let (status, _) = server.patch(&path, json!({"status": "APPROVED"})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = server.patch(&path, json!({"status": "CANCELLED"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_state_transition");
    let (status, body) = server.patch(&path, json!({"status": "REJECTED"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_state_transition");

    // A cancelled draft is terminal.
    let path = server.draft_transfer(&warehouse, &store, &product).await;
    let (status, body) = server.patch(&path, json!({"status": "CANCELLED", "reason": "dup"})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "CANCELLED");
    let (status, body) = server.patch(&path, json!({"status": "PENDING"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_state_transition");

    // Deleting a draft removes it.
    let path = server.draft_transfer(&warehouse, &store, &product).await;
    let (status, _) = server.send(reqwest::Method::DELETE, &path, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = server.get(&path).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn returns_beyond_the_sold_quantity_are_rejected() {
    let server = TestServer::spawn().await;
    let store = server.location("S1", "STORE").await;
    let product = product();
    let record = server.stock(&product, &store, 10).await;

    let (status, sale) = server.post("/checkout", checkout_body(&store, &product, &record, 2)).await;
    assert_eq!(status, StatusCode::CREATED, "{sale}");
    let returns = format!("/sales/{}/returns", sale["sale"]["id"].as_str().unwrap());

    let (status, body) = server
        .post(&returns, json!({"items": [{"lineNo": 1, "quantity": 3}], "reason": "too many"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(server.quantity(&record).await, 8);

    let (status, _) = server
        .post(&returns, json!({"items": [{"lineNo": 1, "quantity": 2}], "reason": "unwanted"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = server
        .post(&returns, json!({"items": [{"lineNo": 1, "quantity": 1}], "reason": "again"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(server.quantity(&record).await, 10);
}
