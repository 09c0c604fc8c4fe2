// marketplace/src/web/handlers/product_handlers.rs

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::require_seller;
use crate::db::{
  self,
  catalog::{ProductFields, ProductFilter, ProductQuery},
};
use crate::errors::AppError;
use crate::models::product::ProductDetail;
use crate::models::Product;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug, Default)]
pub struct ProductPayload {
  pub name: Option<String>,
  pub description: Option<String>,
  pub price: Option<Decimal>,
  pub available_quantity: Option<i32>,
  pub categories: Option<Vec<Uuid>>,
  /// Image paths or URLs.
  pub images: Option<Vec<String>>,
}

#[derive(Deserialize, Debug)]
pub struct ImagePayload {
  pub image: String,
}

impl ProductPayload {
  fn validate(&self, creating: bool) -> Result<(), AppError> {
    match self.name.as_deref().map(str::trim) {
      Some("") => return Err(AppError::Validation("Product name cannot be blank.".to_string())),
      None if creating => return Err(AppError::Validation("Product name is required.".to_string())),
      _ => {}
    }
    match self.price {
      Some(price) if price.is_sign_negative() => {
        return Err(AppError::Validation("Price cannot be negative.".to_string()))
      }
      None if creating => return Err(AppError::Validation("Price is required.".to_string())),
      _ => {}
    }
    if self.available_quantity.is_some_and(|q| q < 0) {
      return Err(AppError::Validation("available_quantity cannot be negative.".to_string()));
    }
    if creating {
      let has_image = self.images.iter().flatten().any(|i| !i.trim().is_empty());
      if !has_image {
        return Err(AppError::Validation("At least one image is required.".to_string()));
      }
    }
    Ok(())
  }

  fn fields(&self) -> ProductFields {
    ProductFields {
      name: self.name.as_ref().map(|n| n.trim().to_string()),
      description: self.description.clone(),
      price: self.price,
      available_quantity: self.available_quantity,
    }
  }
}

/// Loads a product the caller's seller profile owns: 404 when missing, 403 otherwise.
async fn owned_product(app_state: &AppState, auth: AuthenticatedUser, product_id: Uuid) -> Result<Product, AppError> {
  let product = db::catalog::fetch_product(&app_state.db_pool, product_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Product with ID {} not found.", product_id)))?;
  let seller = require_seller(app_state, auth.user_id).await?;
  if product.seller_id != seller.id {
    warn!(%product_id, seller_id = %seller.id, "Seller attempted to modify another seller's product.");
    return Err(AppError::Forbidden("You do not own this product.".to_string()));
  }
  Ok(product)
}

async fn load_detail(app_state: &AppState, product_id: Uuid) -> Result<ProductDetail, AppError> {
  db::catalog::fetch_product_detail(&app_state.db_pool, product_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Product with ID {} not found.", product_id)))
}

#[instrument(name = "handler::list_products", skip(app_state, query_params))]
pub async fn list_products_handler(
  app_state: web::Data<AppState>,
  query_params: web::Query<ProductQuery>,
) -> Result<HttpResponse, AppError> {
  let filter = ProductFilter::from_query(&query_params)?;
  let page = db::catalog::search_products(&app_state.db_pool, &filter).await?;
  info!(count = page.count, page = page.page, "Products listed.");
  Ok(HttpResponse::Ok().json(page))
}

#[instrument(name = "handler::my_products", skip(app_state))]
pub async fn my_products_handler(
  app_state: web::Data<AppState>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let seller = require_seller(&app_state, auth.user_id).await?;
  let page = db::catalog::search_products(&app_state.db_pool, &ProductFilter::for_seller(seller.id)).await?;
  Ok(HttpResponse::Ok().json(page.results))
}

#[instrument(name = "handler::get_product", skip(app_state, path), fields(product_id = %path.as_ref()))]
pub async fn get_product_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(load_detail(&app_state, path.into_inner()).await?))
}

#[instrument(name = "handler::create_product", skip(app_state, req_payload))]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<ProductPayload>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let seller = require_seller(&app_state, auth.user_id).await?;
  let payload = req_payload.into_inner();
  payload.validate(true)?;

  let mut tx = app_state.db_pool.begin().await?;
  let product = db::catalog::insert_product(&mut *tx, seller.id, &payload.fields()).await?;
  if let Some(categories) = payload.categories.as_deref().filter(|c| !c.is_empty()) {
    db::catalog::set_product_categories(&mut *tx, product.id, categories).await?;
  }
  for image in payload.images.iter().flatten().map(|i| i.trim()).filter(|i| !i.is_empty()) {
    db::catalog::insert_image(&mut *tx, product.id, image).await?;
  }
  tx.commit().await?;

  info!(product_id = %product.id, seller_id = %seller.id, "Product created.");
  Ok(HttpResponse::Created().json(load_detail(&app_state, product.id).await?))
}

/// Serves both PUT and PATCH; omitted fields keep their values and a given
/// `categories` list replaces the current set.
#[instrument(name = "handler::update_product", skip(app_state, req_payload))]
pub async fn update_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  req_payload: web::Json<ProductPayload>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let product = owned_product(&app_state, auth, path.into_inner()).await?;
  let payload = req_payload.into_inner();
  payload.validate(false)?;

  let mut tx = app_state.db_pool.begin().await?;
  db::catalog::update_product(&mut *tx, product.id, &payload.fields()).await?;
  if let Some(categories) = payload.categories.as_deref() {
    db::catalog::set_product_categories(&mut *tx, product.id, categories).await?;
  }
  tx.commit().await?;

  info!(product_id = %product.id, "Product updated.");
  Ok(HttpResponse::Ok().json(load_detail(&app_state, product.id).await?))
}

#[instrument(name = "handler::delete_product", skip(app_state))]
pub async fn delete_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let product = owned_product(&app_state, auth, path.into_inner()).await?;
  db::catalog::delete_product(&app_state.db_pool, product.id).await?;
  info!(product_id = %product.id, "Product deleted.");
  Ok(HttpResponse::NoContent().finish())
}

#[instrument(name = "handler::add_product_image", skip(app_state, req_payload))]
pub async fn add_product_image_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  req_payload: web::Json<ImagePayload>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let product = owned_product(&app_state, auth, path.into_inner()).await?;
  let image = req_payload.image.trim();
  if image.is_empty() {
    return Err(AppError::Validation("image cannot be blank.".to_string()));
  }
  let stored = db::catalog::insert_image(&app_state.db_pool, product.id, image).await?;
  Ok(HttpResponse::Created().json(stored))
}

#[instrument(name = "handler::delete_product_image", skip(app_state))]
pub async fn delete_product_image_handler(
  app_state: web::Data<AppState>,
  path: web::Path<(Uuid, Uuid)>,
  auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let (product_id, image_id) = path.into_inner();
  let product = owned_product(&app_state, auth, product_id).await?;
  if db::catalog::delete_image(&app_state.db_pool, product.id, image_id).await? == 0 {
    return Err(AppError::NotFound("Image not found.".to_string()));
  }
  Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  fn creatable() -> ProductPayload {
    ProductPayload {
      name: Some("Lamp".into()),
      price: Some(dec!(19.99)),
      available_quantity: Some(3),
      images: Some(vec!["products/lamp.jpg".into()]),
      ..Default::default()
    }
  }

  #[test]
  fn creation_requires_name_price_and_an_image() {
    assert!(creatable().validate(true).is_ok());
    assert!(ProductPayload { images: Some(vec![" ".into()]), ..creatable() }.validate(true).is_err());
    assert!(ProductPayload { name: None, ..creatable() }.validate(true).is_err());
    assert!(ProductPayload { price: None, ..creatable() }.validate(true).is_err());
  }

  #[test]
  fn partial_updates_only_check_supplied_fields() {
    assert!(ProductPayload::default().validate(false).is_ok());
    let negative = ProductPayload {
      price: Some(dec!(-1)),
      ..Default::default()
    };
    assert!(matches!(negative.validate(false), Err(AppError::Validation(_))));
    let blank = ProductPayload {
      name: Some("  ".into()),
      ..Default::default()
    };
    assert!(blank.validate(false).is_err());
  }
}
