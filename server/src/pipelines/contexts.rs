// marketplace/src/pipelines/contexts.rs

//! Context structs the pipelines run against. Handlers receive them wrapped
//! in `marketflow::Shared`.

use crate::models::{Cart, CartItem, CartLine, Customer, Order, OrderItem, Product, Role, Seller, SellerPayout, User};
use crate::services::payments::{PaymentIntent, Refund};
use crate::services::pricing::OrderQuote;
use crate::services::webhook::GatewayEvent;
use crate::state::AppState;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Profile row created next to the user during registration.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AccountProfile {
  Customer(Customer),
  Seller(Seller),
}

#[derive(Clone)]
pub struct RegisterAccountCtx {
  pub app_state: AppState,
  /// `None` registers a bare user without a customer or seller profile.
  pub role: Option<Role>,
  pub username: String,
  pub password: String,
  pub name: String,
  pub phone_number: String,
  pub profile_picture: Option<String>,
  pub date_of_birth: Option<NaiveDate>,
  pub shop_name: String,
  pub shop_description: String,
  pub stripe_account_id: Option<String>,
  pub created_user: Option<User>,
  pub profile: Option<AccountProfile>,
}

impl RegisterAccountCtx {
  pub fn new(app_state: AppState, role: Option<Role>, username: String, password: String) -> Self {
    Self {
      app_state,
      role,
      username,
      password,
      name: String::new(),
      phone_number: String::new(),
      profile_picture: None,
      date_of_birth: None,
      shop_name: String::new(),
      shop_description: String::new(),
      stripe_account_id: None,
      created_user: None,
      profile: None,
    }
  }
}

#[derive(Clone)]
pub struct SigninCtx {
  pub app_state: AppState,
  pub username: String,
  pub password: String,
  pub user: Option<User>,
  pub session_token: Option<String>,
}

#[derive(Clone)]
pub struct AddToCartCtx {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub customer: Option<Customer>,
  pub product: Option<Product>,
  pub cart: Option<Cart>,
  pub cart_item: Option<CartItem>,
}

#[derive(Clone)]
pub struct PlaceOrderCtx {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub shipping_address_id: Option<Uuid>,
  pub customer: Option<Customer>,
  pub cart: Option<Cart>,
  pub lines: Vec<CartLine>,
  pub quote: Option<OrderQuote>,
  pub order: Option<Order>,
  pub items: Vec<OrderItem>,
}

#[derive(Clone)]
pub struct CreatePaymentIntentCtx {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub order_id: Uuid,
  pub order: Option<Order>,
  pub intent: Option<PaymentIntent>,
}

#[derive(Clone)]
pub struct ConfirmPaymentCtx {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub payment_intent_id: String,
  pub intent: Option<PaymentIntent>,
  pub order: Option<Order>,
  pub succeeded: bool,
}

#[derive(Clone)]
pub struct RefundPaymentCtx {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub is_staff: bool,
  pub order_id: Uuid,
  /// `None` refunds the whole order.
  pub amount: Option<Decimal>,
  pub order: Option<Order>,
  pub refund: Option<Refund>,
}

#[derive(Clone)]
pub struct PaymentWebhookCtx {
  pub app_state: AppState,
  pub raw_payload: actix_web::web::Bytes,
  pub signature_header: Option<String>,
  pub event: Option<GatewayEvent>,
  pub order: Option<Order>,
  /// Set once the order's payment has been marked succeeded by this delivery.
  pub payment_captured: bool,
  pub payouts: Vec<SellerPayout>,
}

impl PaymentWebhookCtx {
  pub fn new(app_state: AppState, raw_payload: actix_web::web::Bytes, signature_header: Option<String>) -> Self {
    Self {
      app_state,
      raw_payload,
      signature_header,
      event: None,
      order: None,
      payment_captured: false,
      payouts: Vec::new(),
    }
  }
}
