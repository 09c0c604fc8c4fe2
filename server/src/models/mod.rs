// marketplace/src/models/mod.rs

//! Database entities and the status enums stored alongside them.

/// Declares a Postgres enum mirrored as a Rust enum that serializes,
/// parses and displays as its snake_case wire name.
macro_rules! pg_status {
  ($(#[$meta:meta])* $name:ident, $pg_type:literal { $($variant:ident => $wire:literal),+ $(,)? }) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::Type)]
    #[sqlx(type_name = $pg_type, rename_all = "snake_case")]
    #[serde(rename_all = "snake_case")]
    pub enum $name {
      $($variant),+
    }

    impl $name {
      pub fn as_str(self) -> &'static str {
        match self {
          $($name::$variant => $wire),+
        }
      }
    }

    impl std::fmt::Display for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
      }
    }

    impl std::str::FromStr for $name {
      type Err = crate::errors::AppError;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
          $($wire => Ok($name::$variant),)+
          other => Err(crate::errors::AppError::Validation(format!(
            "Invalid {} '{}'. Expected one of: {}",
            stringify!($name),
            other,
            [$($wire),+].join(", ")
          ))),
        }
      }
    }
  };
}

pub mod address;
pub mod cart;
pub mod category;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod user;

pub use address::Address;
pub use cart::{Cart, CartItem, CartLine};
pub use category::Category;
pub use order::{Order, OrderStatus, PaymentStatus};
pub use order_item::{OrderItem, SellerStatus};
pub use payment::{Payment, PayoutStatus, SellerPayout};
pub use product::{Product, ProductImage};
pub use user::{Customer, Role, Seller, User};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn statuses_parse_from_their_wire_names() {
    assert_eq!("processing".parse::<OrderStatus>().unwrap(), OrderStatus::Processing);
    assert_eq!("cancelled".parse::<PaymentStatus>().unwrap(), PaymentStatus::Cancelled);
    assert_eq!("shipped".parse::<SellerStatus>().unwrap(), SellerStatus::Shipped);
    assert_eq!(PayoutStatus::Failed.to_string(), "failed");
  }

  #[test]
  fn order_and_payment_cancellation_spellings_differ() {
    assert!("cancelled".parse::<OrderStatus>().is_err());
    assert!("canceled".parse::<PaymentStatus>().is_err());
    assert_eq!(OrderStatus::Canceled.as_str(), "canceled");
  }

  #[test]
  fn unknown_seller_status_lists_allowed_values() {
    let err = "lost".parse::<SellerStatus>().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("pending, processing, shipped, delivered, canceled"));
  }

  #[test]
  fn statuses_serialize_as_snake_case() {
    assert_eq!(serde_json::to_string(&PaymentStatus::Succeeded).unwrap(), "\"succeeded\"");
    let parsed: SellerStatus = serde_json::from_str("\"delivered\"").unwrap();
    assert_eq!(parsed, SellerStatus::Delivered);
  }
}
