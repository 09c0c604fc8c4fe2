// marketplace/src/db/catalog.rs

//! Categories, products, product images and the product search query.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::product::ProductDetail;
use crate::models::{Category, Product, ProductImage};

const PRODUCT_COLUMNS: &str =
  "p.id, p.seller_id, p.name, p.description, p.price, p.available_quantity, p.created_at, p.updated_at";

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

// --- Categories ---

pub async fn list_categories(db: impl PgExecutor<'_>) -> Result<Vec<Category>> {
  let rows = sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
    .fetch_all(db)
    .await?;
  Ok(rows)
}

pub async fn fetch_category(db: impl PgExecutor<'_>, category_id: Uuid) -> Result<Option<Category>> {
  let row = sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = $1")
    .bind(category_id)
    .fetch_optional(db)
    .await?;
  Ok(row)
}

pub async fn insert_category(db: impl PgExecutor<'_>, name: &str) -> Result<Category> {
  let row = sqlx::query_as::<_, Category>("INSERT INTO categories (id, name) VALUES ($1, $2) RETURNING id, name")
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(db)
    .await?;
  Ok(row)
}

pub async fn rename_category(db: impl PgExecutor<'_>, category_id: Uuid, name: &str) -> Result<Option<Category>> {
  let row = sqlx::query_as::<_, Category>("UPDATE categories SET name = $2 WHERE id = $1 RETURNING id, name")
    .bind(category_id)
    .bind(name)
    .fetch_optional(db)
    .await?;
  Ok(row)
}

pub async fn delete_category(db: impl PgExecutor<'_>, category_id: Uuid) -> Result<u64> {
  let result = sqlx::query("DELETE FROM categories WHERE id = $1")
    .bind(category_id)
    .execute(db)
    .await?;
  Ok(result.rows_affected())
}

// --- Product search ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductOrdering {
  #[default]
  Newest,
  Oldest,
  PriceAsc,
  PriceDesc,
}

impl ProductOrdering {
  pub fn parse(raw: &str) -> Result<Self> {
    match raw {
      "price" => Ok(ProductOrdering::PriceAsc),
      "-price" => Ok(ProductOrdering::PriceDesc),
      "created_at" => Ok(ProductOrdering::Oldest),
      "-created_at" => Ok(ProductOrdering::Newest),
      other => Err(AppError::Validation(format!(
        "Invalid ordering '{}'. Use price, -price, created_at or -created_at.",
        other
      ))),
    }
  }

  fn sql(self) -> &'static str {
    match self {
      ProductOrdering::Newest => " ORDER BY p.created_at DESC, p.id",
      ProductOrdering::Oldest => " ORDER BY p.created_at ASC, p.id",
      ProductOrdering::PriceAsc => " ORDER BY p.price ASC, p.id",
      ProductOrdering::PriceDesc => " ORDER BY p.price DESC, p.id",
    }
  }
}

/// Validated product search parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductFilter {
  pub name_contains: Option<String>,
  pub min_price: Option<Decimal>,
  pub max_price: Option<Decimal>,
  pub category_ids: Vec<Uuid>,
  pub seller_id: Option<Uuid>,
  pub ordering: ProductOrdering,
  pub page: i64,
  pub page_size: i64,
}

/// Raw query-string parameters, as they arrive.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ProductQuery {
  pub name: Option<String>,
  pub min_price: Option<String>,
  pub max_price: Option<String>,
  /// Comma separated category ids.
  pub categories: Option<String>,
  pub ordering: Option<String>,
  pub page: Option<i64>,
  pub page_size: Option<i64>,
}

fn parse_price(field: &str, raw: &str) -> Result<Decimal> {
  let value: Decimal = raw
    .trim()
    .parse()
    .map_err(|_| AppError::Validation(format!("{} must be a decimal number.", field)))?;
  if value.is_sign_negative() {
    return Err(AppError::Validation(format!("{} cannot be negative.", field)));
  }
  Ok(value)
}

impl ProductFilter {
  pub fn from_query(query: &ProductQuery) -> Result<Self> {
    let name_contains = query
      .name
      .as_deref()
      .map(str::trim)
      .filter(|n| !n.is_empty())
      .map(str::to_string);
    let min_price = query.min_price.as_deref().map(|raw| parse_price("min_price", raw)).transpose()?;
    let max_price = query.max_price.as_deref().map(|raw| parse_price("max_price", raw)).transpose()?;
    if let (Some(min), Some(max)) = (min_price, max_price) {
      if min > max {
        return Err(AppError::Validation("min_price cannot exceed max_price.".to_string()));
      }
    }

    let category_ids = match query.categories.as_deref() {
      Some(raw) => raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
          Uuid::parse_str(part).map_err(|_| AppError::Validation(format!("Invalid category id '{}'.", part)))
        })
        .collect::<Result<Vec<_>>>()?,
      None => Vec::new(),
    };

    let ordering = match query.ordering.as_deref() {
      Some(raw) if !raw.is_empty() => ProductOrdering::parse(raw)?,
      _ => ProductOrdering::default(),
    };

    let page = query.page.unwrap_or(1);
    if page < 1 {
      return Err(AppError::Validation("page must be 1 or greater.".to_string()));
    }
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    if (page - 1).checked_mul(page_size).is_none() {
      return Err(AppError::Validation(format!("page {} is out of range.", page)));
    }

    Ok(Self {
      name_contains,
      min_price,
      max_price,
      category_ids,
      seller_id: None,
      ordering,
      page,
      page_size,
    })
  }

  pub fn for_seller(seller_id: Uuid) -> Self {
    Self {
      seller_id: Some(seller_id),
      page: 1,
      page_size: MAX_PAGE_SIZE,
      ..Default::default()
    }
  }

  fn offset(&self) -> i64 {
    (self.page - 1).saturating_mul(self.page_size)
  }

  fn push_conditions(&self, qb: &mut QueryBuilder<'_, Postgres>) {
    qb.push(" WHERE TRUE");
    if let Some(name) = &self.name_contains {
      qb.push(" AND p.name ILIKE ").push_bind(format!("%{}%", name.replace('%', "\\%").replace('_', "\\_")));
    }
    if let Some(min) = self.min_price {
      qb.push(" AND p.price >= ").push_bind(min);
    }
    if let Some(max) = self.max_price {
      qb.push(" AND p.price <= ").push_bind(max);
    }
    if let Some(seller_id) = self.seller_id {
      qb.push(" AND p.seller_id = ").push_bind(seller_id);
    }
    if !self.category_ids.is_empty() {
      qb.push(" AND EXISTS (SELECT 1 FROM product_categories pc WHERE pc.product_id = p.id AND pc.category_id = ANY(")
        .push_bind(self.category_ids.clone())
        .push("))");
    }
  }
}

#[derive(Debug, serde::Serialize)]
pub struct ProductPage {
  pub count: i64,
  pub page: i64,
  pub page_size: i64,
  pub results: Vec<ProductDetail>,
}

pub async fn search_products(pool: &PgPool, filter: &ProductFilter) -> Result<ProductPage> {
  let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
  filter.push_conditions(&mut count_qb);
  let count: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

  let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products p"));
  filter.push_conditions(&mut qb);
  qb.push(filter.ordering.sql());
  qb.push(" LIMIT ").push_bind(filter.page_size);
  qb.push(" OFFSET ").push_bind(filter.offset());
  let products: Vec<Product> = qb.build_query_as::<Product>().fetch_all(pool).await?;

  Ok(ProductPage {
    count,
    page: filter.page,
    page_size: filter.page_size,
    results: with_details(pool, products).await?,
  })
}

// --- Products ---

pub async fn fetch_product(db: impl PgExecutor<'_>, product_id: Uuid) -> Result<Option<Product>> {
  let row = sqlx::query_as::<_, Product>(&format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"))
    .bind(product_id)
    .fetch_optional(db)
    .await?;
  Ok(row)
}

pub async fn fetch_product_detail(pool: &PgPool, product_id: Uuid) -> Result<Option<ProductDetail>> {
  let Some(product) = fetch_product(pool, product_id).await? else {
    return Ok(None);
  };
  Ok(with_details(pool, vec![product]).await?.pop())
}

/// Attaches categories and images to each product, preserving order.
pub async fn with_details(pool: &PgPool, products: Vec<Product>) -> Result<Vec<ProductDetail>> {
  if products.is_empty() {
    return Ok(Vec::new());
  }
  let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();

  let category_rows: Vec<(Uuid, Uuid, String)> = sqlx::query_as(
    "SELECT pc.product_id, c.id, c.name FROM product_categories pc \
     JOIN categories c ON c.id = pc.category_id WHERE pc.product_id = ANY($1) ORDER BY c.name",
  )
  .bind(&ids)
  .fetch_all(pool)
  .await?;
  let images: Vec<ProductImage> =
    sqlx::query_as("SELECT id, product_id, image FROM product_images WHERE product_id = ANY($1) ORDER BY id")
      .bind(&ids)
      .fetch_all(pool)
      .await?;

  let mut categories_by_product: HashMap<Uuid, Vec<Category>> = HashMap::new();
  for (product_id, id, name) in category_rows {
    categories_by_product.entry(product_id).or_default().push(Category { id, name });
  }
  let mut images_by_product: HashMap<Uuid, Vec<ProductImage>> = HashMap::new();
  for image in images {
    images_by_product.entry(image.product_id).or_default().push(image);
  }

  Ok(
    products
      .into_iter()
      .map(|product| ProductDetail {
        categories: categories_by_product.remove(&product.id).unwrap_or_default(),
        images: images_by_product.remove(&product.id).unwrap_or_default(),
        product,
      })
      .collect(),
  )
}

#[derive(Debug, Default)]
pub struct ProductFields {
  pub name: Option<String>,
  pub description: Option<String>,
  pub price: Option<Decimal>,
  pub available_quantity: Option<i32>,
}

pub async fn insert_product(db: impl PgExecutor<'_>, seller_id: Uuid, fields: &ProductFields) -> Result<Product> {
  let row = sqlx::query_as::<_, Product>(
    "INSERT INTO products (id, seller_id, name, description, price, available_quantity) \
     VALUES ($1, $2, $3, $4, $5, $6) \
     RETURNING id, seller_id, name, description, price, available_quantity, created_at, updated_at",
  )
  .bind(Uuid::new_v4())
  .bind(seller_id)
  .bind(fields.name.as_deref().unwrap_or_default())
  .bind(fields.description.as_deref().unwrap_or_default())
  .bind(fields.price.unwrap_or_default())
  .bind(fields.available_quantity.unwrap_or_default())
  .fetch_one(db)
  .await?;
  Ok(row)
}

pub async fn update_product(db: impl PgExecutor<'_>, product_id: Uuid, fields: &ProductFields) -> Result<Product> {
  let row = sqlx::query_as::<_, Product>(
    "UPDATE products SET \
       name = COALESCE($2, name), description = COALESCE($3, description), \
       price = COALESCE($4, price), available_quantity = COALESCE($5, available_quantity), \
       updated_at = NOW() \
     WHERE id = $1 \
     RETURNING id, seller_id, name, description, price, available_quantity, created_at, updated_at",
  )
  .bind(product_id)
  .bind(fields.name.as_deref())
  .bind(fields.description.as_deref())
  .bind(fields.price)
  .bind(fields.available_quantity)
  .fetch_one(db)
  .await?;
  Ok(row)
}

pub async fn delete_product(db: impl PgExecutor<'_>, product_id: Uuid) -> Result<u64> {
  let result = sqlx::query("DELETE FROM products WHERE id = $1")
    .bind(product_id)
    .execute(db)
    .await?;
  Ok(result.rows_affected())
}

/// Replaces the product's category set. Unknown category ids are rejected.
pub async fn set_product_categories(
  conn: &mut sqlx::PgConnection,
  product_id: Uuid,
  category_ids: &[Uuid],
) -> Result<()> {
  let known: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ANY($1)")
    .bind(category_ids)
    .fetch_one(&mut *conn)
    .await?;
  let mut distinct = category_ids.to_vec();
  distinct.sort();
  distinct.dedup();
  if known != distinct.len() as i64 {
    return Err(AppError::Validation("One or more categories do not exist.".to_string()));
  }

  sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
    .bind(product_id)
    .execute(&mut *conn)
    .await?;
  sqlx::query("INSERT INTO product_categories (product_id, category_id) SELECT $1, UNNEST($2::uuid[])")
    .bind(product_id)
    .bind(&distinct)
    .execute(&mut *conn)
    .await?;
  Ok(())
}

pub async fn insert_image(db: impl PgExecutor<'_>, product_id: Uuid, image: &str) -> Result<ProductImage> {
  let row = sqlx::query_as::<_, ProductImage>(
    "INSERT INTO product_images (id, product_id, image) VALUES ($1, $2, $3) RETURNING id, product_id, image",
  )
  .bind(Uuid::new_v4())
  .bind(product_id)
  .bind(image)
  .fetch_one(db)
  .await?;
  Ok(row)
}

pub async fn delete_image(db: impl PgExecutor<'_>, product_id: Uuid, image_id: Uuid) -> Result<u64> {
  let result = sqlx::query("DELETE FROM product_images WHERE id = $1 AND product_id = $2")
    .bind(image_id)
    .bind(product_id)
    .execute(db)
    .await?;
  Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  #[test]
  fn empty_query_uses_defaults() {
    let filter = ProductFilter::from_query(&ProductQuery::default()).unwrap();
    assert_eq!(filter.page, 1);
    assert_eq!(filter.page_size, DEFAULT_PAGE_SIZE);
    assert_eq!(filter.ordering, ProductOrdering::Newest);
    assert!(filter.category_ids.is_empty());
  }

  #[test]
  fn parses_prices_categories_and_ordering() {
    let cat = Uuid::new_v4();
    let query = ProductQuery {
      name: Some("  lamp ".into()),
      min_price: Some("10".into()),
      max_price: Some("99.50".into()),
      categories: Some(format!("{cat}, ")),
      ordering: Some("-price".into()),
      page: Some(3),
      page_size: Some(500),
    };
    let filter = ProductFilter::from_query(&query).unwrap();
    assert_eq!(filter.name_contains.as_deref(), Some("lamp"));
    assert_eq!(filter.min_price, Some(dec!(10)));
    assert_eq!(filter.max_price, Some(dec!(99.50)));
    assert_eq!(filter.category_ids, vec![cat]);
    assert_eq!(filter.ordering, ProductOrdering::PriceDesc);
    assert_eq!(filter.page_size, MAX_PAGE_SIZE);
    assert_eq!(filter.offset(), 200);
  }

  #[test]
  fn page_past_the_offset_range_is_rejected() {
    let query = ProductQuery {
      page: Some(i64::MAX),
      ..Default::default()
    };
    assert!(matches!(ProductFilter::from_query(&query), Err(AppError::Validation(_))));

    let last = ProductQuery {
      page: Some(i64::MAX / MAX_PAGE_SIZE),
      page_size: Some(MAX_PAGE_SIZE),
      ..Default::default()
    };
    let filter = ProductFilter::from_query(&last).unwrap();
    assert!(filter.offset() > 0);
  }

  #[test]
  fn rejects_unknown_ordering_and_inverted_price_range() {
    let bad_order = ProductQuery {
      ordering: Some("name".into()),
      ..Default::default()
    };
    assert!(matches!(ProductFilter::from_query(&bad_order), Err(AppError::Validation(_))));

    let inverted = ProductQuery {
      min_price: Some("50".into()),
      max_price: Some("5".into()),
      ..Default::default()
    };
    assert!(ProductFilter::from_query(&inverted).is_err());
  }

  #[test]
  fn rejects_malformed_category_ids_and_negative_prices() {
    let bad_cat = ProductQuery {
      categories: Some("not-a-uuid".into()),
      ..Default::default()
    };
    assert!(ProductFilter::from_query(&bad_cat).is_err());

    let negative = ProductQuery {
      min_price: Some("-1".into()),
      ..Default::default()
    };
    assert!(ProductFilter::from_query(&negative).is_err());
  }

  #[test]
  fn search_sql_includes_only_requested_conditions() {
    let filter = ProductFilter {
      name_contains: Some("mug".into()),
      category_ids: vec![Uuid::new_v4()],
      page: 1,
      page_size: 10,
      ..Default::default()
    };
    let mut qb = QueryBuilder::<Postgres>::new("SELECT p.id FROM products p");
    filter.push_conditions(&mut qb);
    let sql = qb.sql();
    assert!(sql.contains("p.name ILIKE $1"));
    assert!(sql.contains("pc.category_id = ANY($2)"));
    assert!(!sql.contains("p.price >="));
  }
}
