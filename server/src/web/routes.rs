// marketplace/src/web/routes.rs

use actix_web::{web, HttpResponse};

use crate::web::handlers::address_handlers::{
  create_address_handler, delete_address_handler, get_address_handler, list_addresses_handler, update_address_handler,
  AddressParent, CustomerAddresses, SellerAddresses,
};
use crate::web::handlers::{
  auth_handlers, cart_handlers, category_handlers, customer_handlers, order_handlers, payment_handlers, product_handlers,
  seller_handlers, user_handlers, webhook_handlers,
};

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// `/{username}/addresses[/{id}]` under a customer or seller scope.
fn address_routes<P: AddressParent + 'static>(cfg: &mut web::ServiceConfig) {
  cfg
    .service(
      web::resource("/{username}/addresses")
        .route(web::get().to(list_addresses_handler::<P>))
        .route(web::post().to(create_address_handler::<P>)),
    )
    .service(
      web::resource("/{username}/addresses/{address_id}")
        .route(web::get().to(get_address_handler::<P>))
        .route(web::put().to(update_address_handler::<P>))
        .route(web::patch().to(update_address_handler::<P>))
        .route(web::delete().to(delete_address_handler::<P>)),
    );
}

// Fixed segments (`me`, `orders`, ...) are registered ahead of `{username}`.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(web::scope("/auth").route("/signin", web::post().to(auth_handlers::signin_handler)))
      .service(
        web::scope("/users")
          .service(
            web::resource("")
              .route(web::get().to(user_handlers::list_users_handler))
              .route(web::post().to(user_handlers::create_user_handler)),
          )
          .route("/me", web::get().to(user_handlers::me_handler))
          .service(
            web::resource("/{username}")
              .route(web::get().to(user_handlers::get_user_handler))
              .route(web::put().to(user_handlers::update_user_handler))
              .route(web::patch().to(user_handlers::update_user_handler))
              .route(web::delete().to(user_handlers::delete_user_handler)),
          ),
      )
      .service(
        web::scope("/customers")
          .service(
            web::resource("")
              .route(web::get().to(customer_handlers::list_customers_handler))
              .route(web::post().to(customer_handlers::create_customer_handler)),
          )
          .route("/me", web::get().to(customer_handlers::customer_me_handler))
          .route("/orders", web::get().to(customer_handlers::customer_orders_handler))
          .configure(address_routes::<CustomerAddresses>)
          .service(
            web::resource("/{username}")
              .route(web::get().to(customer_handlers::get_customer_handler))
              .route(web::put().to(customer_handlers::update_customer_handler))
              .route(web::patch().to(customer_handlers::update_customer_handler))
              .route(web::delete().to(customer_handlers::delete_customer_handler)),
          ),
      )
      .service(
        web::scope("/sellers")
          .service(
            web::resource("")
              .route(web::get().to(seller_handlers::list_sellers_handler))
              .route(web::post().to(seller_handlers::create_seller_handler)),
          )
          .route("/me", web::get().to(seller_handlers::seller_me_handler))
          .route("/orders", web::get().to(seller_handlers::seller_orders_handler))
          .route("/total-earnings", web::get().to(seller_handlers::total_earnings_handler))
          .route("/product-earnings", web::get().to(seller_handlers::product_earnings_handler))
          .route(
            "/order-items/update-status",
            web::patch().to(seller_handlers::update_order_item_status_handler),
          )
          .configure(address_routes::<SellerAddresses>)
          .service(
            web::resource("/{username}")
              .route(web::get().to(seller_handlers::get_seller_handler))
              .route(web::put().to(seller_handlers::update_seller_handler))
              .route(web::patch().to(seller_handlers::update_seller_handler))
              .route(web::delete().to(seller_handlers::delete_seller_handler)),
          ),
      )
      .service(
        web::scope("/products")
          .service(
            web::resource("")
              .route(web::get().to(product_handlers::list_products_handler))
              .route(web::post().to(product_handlers::create_product_handler)),
          )
          .route("/my_products", web::get().to(product_handlers::my_products_handler))
          .service(
            web::resource("/{product_id}")
              .route(web::get().to(product_handlers::get_product_handler))
              .route(web::put().to(product_handlers::update_product_handler))
              .route(web::patch().to(product_handlers::update_product_handler))
              .route(web::delete().to(product_handlers::delete_product_handler)),
          )
          .route("/{product_id}/images", web::post().to(product_handlers::add_product_image_handler))
          .route(
            "/{product_id}/images/{image_id}",
            web::delete().to(product_handlers::delete_product_image_handler),
          ),
      )
      .service(
        web::scope("/categories")
          .service(
            web::resource("")
              .route(web::get().to(category_handlers::list_categories_handler))
              .route(web::post().to(category_handlers::create_category_handler)),
          )
          .service(
            web::resource("/{category_id}")
              .route(web::get().to(category_handlers::get_category_handler))
              .route(web::put().to(category_handlers::update_category_handler))
              .route(web::patch().to(category_handlers::update_category_handler))
              .route(web::delete().to(category_handlers::delete_category_handler)),
          ),
      )
      .service(
        web::scope("/cart")
          .route("", web::get().to(cart_handlers::view_cart_handler))
          .route("/add_to_cart", web::post().to(cart_handlers::add_to_cart_handler))
          .route("/update_quantity", web::patch().to(cart_handlers::update_quantity_handler))
          .route("/remove_item", web::delete().to(cart_handlers::remove_item_handler)),
      )
      .service(
        web::scope("/orders")
          .service(
            web::resource("")
              .route(web::get().to(order_handlers::list_orders_handler))
              .route(web::post().to(order_handlers::place_order_handler)),
          )
          .service(
            web::resource("/{order_id}")
              .route(web::get().to(order_handlers::get_order_handler))
              .route(web::delete().to(order_handlers::delete_order_handler)),
          )
          .route("/{order_id}/checkout", web::post().to(order_handlers::checkout_order_handler)),
      )
      .service(
        web::scope("/payments")
          .route(
            "/create-payment-intent",
            web::post().to(payment_handlers::create_payment_intent_handler),
          )
          .route("/confirm-payment", web::post().to(payment_handlers::confirm_payment_handler))
          .route(
            "/order/{order_id}/payment-status",
            web::get().to(payment_handlers::payment_status_handler),
          )
          .route("/process-refund", web::post().to(payment_handlers::process_refund_handler))
          .route("/webhook", web::post().to(webhook_handlers::payment_webhook_handler)),
      ),
  );
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use crate::errors::AppError;
  use crate::pipelines::register_all_pipelines;
  use crate::services::payments::mock::MockGateway;
  use crate::state::AppState;
  use actix_web::http::StatusCode;
  use actix_web::{test, App};
  use hmac::{Hmac, Mac};
  use sha2::Sha256;
  use marketflow::Flows;
  use sqlx::postgres::PgPoolOptions;
  use std::sync::Arc;

  const WEBHOOK_SECRET: &str = "whsec_route_test";

  fn test_state() -> AppState {
    state_with_webhook_secret(Some(WEBHOOK_SECRET))
  }

  // The pool never connects: every request here is answered before a query runs.
  fn state_with_webhook_secret(webhook_secret: Option<&str>) -> AppState {
    let config = AppConfig::from_lookup(|name| match name {
      "DATABASE_URL" => Some("postgres://marketplace@localhost/unused".to_string()),
      "SESSION_SECRET" => Some("route-test-secret".to_string()),
      "STRIPE_WEBHOOK_SECRET" => webhook_secret.map(str::to_string),
      _ => None,
    })
    .unwrap();
    let db_pool = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
    let flows = Arc::new(Flows::<AppError>::new());
    let state = AppState {
      db_pool,
      flows: flows.clone(),
      config: Arc::new(config),
      gateway: Arc::new(MockGateway::new()),
    };
    register_all_pipelines(&flows, &state);
    state
  }

  #[actix_web::test]
  async fn health_check_responds_ok() {
    let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure_app_routes)).await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[actix_web::test]
  async fn cart_requires_a_bearer_token() {
    let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure_app_routes)).await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/cart").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[actix_web::test]
  async fn forged_token_is_rejected() {
    let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure_app_routes)).await;
    let req = test::TestRequest::get()
      .uri("/api/v1/orders")
      .insert_header(("Authorization", "Bearer not-a-real-token"))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[actix_web::test]
  async fn webhook_with_bad_signature_is_rejected() {
    let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure_app_routes)).await;
    let req = test::TestRequest::post()
      .uri("/api/v1/payments/webhook")
      .insert_header(("Stripe-Signature", "t=1,v1=deadbeef"))
      .set_payload(r#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{}}}"#)
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[actix_web::test]
  async fn webhook_without_signature_is_rejected() {
    let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure_app_routes)).await;
    let req = test::TestRequest::post()
      .uri("/api/v1/payments/webhook")
      .set_payload("{}")
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  const CUSTOMER_EVENT: &str = r#"{"id":"evt_c1","type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;

  fn signature_for(payload: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
  }

  #[actix_web::test]
  async fn signed_event_without_an_order_is_acknowledged() {
    let app = test::init_service(App::new().app_data(web::Data::new(test_state())).configure(configure_app_routes)).await;
    let req = test::TestRequest::post()
      .uri("/api/v1/payments/webhook")
      .insert_header(("Stripe-Signature", signature_for(CUSTOMER_EVENT, chrono::Utc::now().timestamp())))
      .set_payload(CUSTOMER_EVENT)
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, serde_json::json!({ "received": true }));
  }

  #[actix_web::test]
  async fn mock_gateway_accepts_unsigned_events_when_no_secret_is_set() {
    let state = state_with_webhook_secret(None);
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;
    let req = test::TestRequest::post()
      .uri("/api/v1/payments/webhook")
      .set_payload(CUSTOMER_EVENT)
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["received"], true);
  }

  #[actix_web::test]
  async fn unsigned_garbage_is_rejected_even_for_the_mock_gateway() {
    let state = state_with_webhook_secret(None);
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure_app_routes)).await;
    let req = test::TestRequest::post()
      .uri("/api/v1/payments/webhook")
      .set_payload("not json")
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }
}
