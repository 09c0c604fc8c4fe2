// marketplace/src/services/payouts.rs

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{OrderItem, Seller};
use crate::services::payments::TransferRequest;
use crate::services::pricing::to_minor_units;

/// A transfer owed to one seller for one order item.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutPlan {
  pub order_item_id: Uuid,
  pub seller_id: Uuid,
  pub destination: String,
  pub amount: Decimal,
  pub amount_minor: i64,
  pub idempotency_key: String,
}

impl PayoutPlan {
  pub fn transfer_request(&self, currency: &str, transfer_group: &str) -> TransferRequest {
    TransferRequest {
      amount_minor: self.amount_minor,
      currency: currency.to_string(),
      destination: self.destination.clone(),
      transfer_group: transfer_group.to_string(),
      metadata: BTreeMap::from([
        ("order_item_id".to_string(), self.order_item_id.to_string()),
        ("seller_id".to_string(), self.seller_id.to_string()),
      ]),
      idempotency_key: self.idempotency_key.clone(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  AlreadyPaid,
  NoConnectedAccount,
  NothingOwed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayoutDecision {
  Transfer(PayoutPlan),
  Skip { order_item_id: Uuid, reason: SkipReason },
}

pub fn idempotency_key(order_item_id: Uuid) -> String {
  format!("payout-{}", order_item_id)
}

/// Decides, per order item, whether a transfer should be made.
pub fn plan_payouts(items: &[OrderItem], sellers: &[Seller]) -> Vec<PayoutDecision> {
  let accounts: HashMap<Uuid, &str> = sellers
    .iter()
    .filter_map(|s| s.stripe_account_id.as_deref().filter(|a| !a.is_empty()).map(|a| (s.id, a)))
    .collect();

  items
    .iter()
    .map(|item| {
      let skip = |reason| PayoutDecision::Skip {
        order_item_id: item.id,
        reason,
      };
      if item.is_paid_out() {
        return skip(SkipReason::AlreadyPaid);
      }
      let Some(destination) = accounts.get(&item.seller_id) else {
        return skip(SkipReason::NoConnectedAccount);
      };
      match to_minor_units(item.seller_payout_amount) {
        Ok(minor) if minor > 0 => PayoutDecision::Transfer(PayoutPlan {
          order_item_id: item.id,
          seller_id: item.seller_id,
          destination: destination.to_string(),
          amount: item.seller_payout_amount,
          amount_minor: minor,
          idempotency_key: idempotency_key(item.id),
        }),
        _ => skip(SkipReason::NothingOwed),
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::SellerStatus;
  use chrono::Utc;
  use rust_decimal_macros::dec;

  fn seller(account: Option<&str>) -> Seller {
    Seller {
      id: Uuid::new_v4(),
      user_id: Uuid::new_v4(),
      shop_name: "shop".into(),
      shop_description: String::new(),
      stripe_account_id: account.map(str::to_string),
    }
  }

  fn item(seller_id: Uuid, payout: Decimal, transfer_id: &str) -> OrderItem {
    OrderItem {
      id: Uuid::new_v4(),
      order_id: Uuid::new_v4(),
      product_id: Uuid::new_v4(),
      seller_id,
      quantity: 1,
      price_at_time: payout,
      seller_status: SellerStatus::Processing,
      stripe_transfer_id: transfer_id.into(),
      seller_payout_amount: payout,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn plans_a_transfer_for_each_unpaid_item_with_an_account() {
    let s = seller(Some("acct_1"));
    let it = item(s.id, dec!(12.34), "");
    let decisions = plan_payouts(std::slice::from_ref(&it), &[s.clone()]);
    match &decisions[..] {
      [PayoutDecision::Transfer(plan)] => {
        assert_eq!(plan.amount_minor, 1234);
        assert_eq!(plan.destination, "acct_1");
        assert_eq!(plan.idempotency_key, format!("payout-{}", it.id));
        let request = plan.transfer_request("usd", "ORD-1");
        assert_eq!(request.transfer_group, "ORD-1");
        assert_eq!(request.metadata.get("seller_id"), Some(&s.id.to_string()));
      }
      other => panic!("unexpected decisions {:?}", other),
    }
  }

  #[test]
  fn skips_paid_unlinked_and_zero_items() {
    let linked = seller(Some("acct_1"));
    let unlinked = seller(None);
    let blank = seller(Some(""));
    let items = vec![
      item(linked.id, dec!(5), "tr_done"),
      item(unlinked.id, dec!(5), ""),
      item(blank.id, dec!(5), ""),
      item(linked.id, dec!(0), ""),
    ];
    let reasons: Vec<SkipReason> = plan_payouts(&items, &[linked, unlinked, blank])
      .into_iter()
      .map(|d| match d {
        PayoutDecision::Skip { reason, .. } => reason,
        PayoutDecision::Transfer(p) => panic!("unexpected transfer {:?}", p),
      })
      .collect();
    assert_eq!(
      reasons,
      vec![
        SkipReason::AlreadyPaid,
        SkipReason::NoConnectedAccount,
        SkipReason::NoConnectedAccount,
        SkipReason::NothingOwed
      ]
    );
  }
}
