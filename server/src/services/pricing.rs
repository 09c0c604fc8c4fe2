// marketplace/src/services/pricing.rs

//! Order totals, platform commission and seller payout amounts.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::CartLine;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedLine {
  pub product_id: Uuid,
  pub seller_id: Uuid,
  pub quantity: i32,
  pub unit_price: Decimal,
  pub line_total: Decimal,
  pub commission: Decimal,
  pub seller_payout: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderQuote {
  pub lines: Vec<PricedLine>,
  /// Sum of line totals. This is the amount charged.
  pub total_amount: Decimal,
  pub platform_commission: Decimal,
}

fn round_cents(value: Decimal) -> Decimal {
  value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn price_line(unit_price: Decimal, quantity: i32, commission_rate: Decimal) -> Result<(Decimal, Decimal), AppError> {
  if quantity <= 0 {
    return Err(AppError::Validation("Quantity must be a positive number.".to_string()));
  }
  if unit_price.is_sign_negative() {
    return Err(AppError::Validation("Price cannot be negative.".to_string()));
  }
  let line_total = round_cents(unit_price * Decimal::from(quantity));
  let commission = round_cents(line_total * commission_rate);
  Ok((line_total, commission))
}

pub fn price_cart(lines: &[CartLine], commission_rate: Decimal) -> Result<OrderQuote, AppError> {
  if lines.is_empty() {
    return Err(AppError::Validation("Cart is empty.".to_string()));
  }

  let mut priced = Vec::with_capacity(lines.len());
  let mut total_amount = Decimal::ZERO;
  let mut platform_commission = Decimal::ZERO;
  for line in lines {
    let (line_total, commission) = price_line(line.price, line.quantity, commission_rate)?;
    total_amount += line_total;
    platform_commission += commission;
    priced.push(PricedLine {
      product_id: line.product_id,
      seller_id: line.seller_id,
      quantity: line.quantity,
      unit_price: line.price,
      line_total,
      commission,
      seller_payout: line_total - commission,
    });
  }

  Ok(OrderQuote {
    lines: priced,
    total_amount,
    platform_commission,
  })
}

/// Converts a currency amount to integer minor units (cents).
pub fn to_minor_units(amount: Decimal) -> Result<i64, AppError> {
  if amount.is_sign_negative() {
    return Err(AppError::Validation("Amount cannot be negative.".to_string()));
  }
  (amount * Decimal::ONE_HUNDRED)
    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    .to_i64()
    .ok_or_else(|| AppError::Validation(format!("Amount {} is out of range.", amount)))
}

pub fn from_minor_units(minor: i64) -> Decimal {
  Decimal::new(minor, 2)
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  fn line(price: Decimal, quantity: i32, seller_id: Uuid) -> CartLine {
    CartLine {
      cart_item_id: Uuid::new_v4(),
      product_id: Uuid::new_v4(),
      product_name: "Widget".into(),
      seller_id,
      price,
      quantity,
    }
  }

  #[test]
  fn total_is_sum_of_price_times_quantity() {
    let seller = Uuid::new_v4();
    let quote = price_cart(&[line(dec!(19.99), 2, seller), line(dec!(5.00), 1, seller)], Decimal::ZERO).unwrap();
    assert_eq!(quote.total_amount, dec!(44.98));
    assert_eq!(quote.platform_commission, Decimal::ZERO);
    assert_eq!(quote.lines[0].seller_payout, dec!(39.98));
  }

  #[test]
  fn commission_is_rounded_per_line_and_subtracted_from_payout() {
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let quote = price_cart(&[line(dec!(10.05), 1, a), line(dec!(33.33), 3, b)], dec!(0.10)).unwrap();
    // 10.05 * 0.10 = 1.005 -> 1.01; 99.99 * 0.10 = 9.999 -> 10.00
    assert_eq!(quote.lines[0].commission, dec!(1.01));
    assert_eq!(quote.lines[0].seller_payout, dec!(9.04));
    assert_eq!(quote.lines[1].line_total, dec!(99.99));
    assert_eq!(quote.lines[1].commission, dec!(10.00));
    assert_eq!(quote.platform_commission, dec!(11.01));
    assert_eq!(quote.total_amount, dec!(110.04));
    let payouts: Decimal = quote.lines.iter().map(|l| l.seller_payout).sum();
    assert_eq!(payouts + quote.platform_commission, quote.total_amount);
  }

  #[test]
  fn empty_cart_is_rejected() {
    let err = price_cart(&[], Decimal::ZERO).unwrap_err();
    assert!(matches!(err, AppError::Validation(m) if m == "Cart is empty."));
  }

  #[test]
  fn non_positive_quantity_is_rejected() {
    assert!(price_cart(&[line(dec!(1), 0, Uuid::new_v4())], Decimal::ZERO).is_err());
  }

  #[test]
  fn minor_units_conversion() {
    assert_eq!(to_minor_units(dec!(44.98)).unwrap(), 4498);
    assert_eq!(to_minor_units(dec!(0.005)).unwrap(), 1);
    assert_eq!(to_minor_units(dec!(12)).unwrap(), 1200);
    assert!(to_minor_units(dec!(-1)).is_err());
    assert_eq!(from_minor_units(4498), dec!(44.98));
  }
}
