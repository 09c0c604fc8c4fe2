// marketplace/src/pipelines/signup_pipeline.rs

use crate::db::{self, users::NewUser};
use crate::errors::AppError;
use crate::models::user::DEFAULT_PROFILE_PICTURE;
use crate::models::Role;
use crate::pipelines::contexts::{AccountProfile, RegisterAccountCtx};
use crate::services::auth_service;
use crate::state::AppState;
use marketflow::{Control, Flows, Pipeline, Shared};
use std::sync::Arc;
use tracing::{event, info, warn, Level};

/// Registers the account registration pipeline (users, customers and sellers).
pub fn register_signup_pipeline(flows: &Arc<Flows<AppError>>, _app_state: &AppState) {
  let mut p = Pipeline::<RegisterAccountCtx, AppError>::new(&[
    ("validate_account_input", false, None),
    ("check_username_available", false, None),
    ("create_account", false, None),
  ]);

  p.on("validate_account_input", |ctx: Shared<RegisterAccountCtx>| {
    Box::pin(async move {
      let (username, password, role, shop_name) = {
        let guard = ctx.read();
        (guard.username.trim().to_string(), guard.password.clone(), guard.role, guard.shop_name.clone())
      };

      event!(Level::DEBUG, %username, role = ?role, "Validating registration input.");
      if username.is_empty() {
        return Err(AppError::Validation("Username is required.".to_string()));
      }
      if username.chars().any(char::is_whitespace) {
        return Err(AppError::Validation("Username may not contain spaces.".to_string()));
      }
      auth_service::validate_new_password(&password)?;
      if role == Some(Role::Seller) && shop_name.trim().is_empty() {
        return Err(AppError::Validation("Shop name is required for sellers.".to_string()));
      }

      ctx.write().username = username;
      Ok::<_, AppError>(Control::Continue)
    })
  });

  p.on("check_username_available", |ctx: Shared<RegisterAccountCtx>| {
    Box::pin(async move {
      let (username, pool) = {
        let guard = ctx.read();
        (guard.username.clone(), guard.app_state.db_pool.clone())
      };

      if db::users::username_taken(&pool, &username).await? {
        warn!(%username, "Registration attempted with a taken username.");
        return Err(AppError::Conflict("A user with that username already exists.".to_string()));
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  // User row, profile row and (for customers) the empty cart commit together.
  p.on("create_account", |ctx: Shared<RegisterAccountCtx>| {
    Box::pin(async move {
      let data = ctx.read().clone();
      let password_hash = auth_service::hash_password(&data.password)?;

      let mut tx = data.app_state.db_pool.begin().await?;
      let user = db::users::insert(
        &mut *tx,
        NewUser {
          username: &data.username,
          password_hash: &password_hash,
          name: &data.name,
          phone_number: &data.phone_number,
          profile_picture: data.profile_picture.as_deref().unwrap_or(DEFAULT_PROFILE_PICTURE),
        },
      )
      .await?;

      let profile = match data.role {
        None => None,
        Some(Role::Customer) => {
          let customer = db::users::insert_customer(&mut *tx, user.id, data.date_of_birth).await?;
          db::carts::get_or_create(&mut *tx, customer.id).await?;
          Some(AccountProfile::Customer(customer))
        }
        Some(Role::Seller) => {
          let seller = db::users::insert_seller(
            &mut *tx,
            user.id,
            data.shop_name.trim(),
            &data.shop_description,
            data.stripe_account_id.as_deref().filter(|a| !a.is_empty()),
          )
          .await?;
          Some(AccountProfile::Seller(seller))
        }
      };
      tx.commit().await?;

      info!(user_id = %user.id, username = %user.username, role = data.role.map_or("user", Role::label), "Account created.");
      {
        let mut guard = ctx.write();
        guard.password.clear();
        guard.created_user = Some(user);
        guard.profile = profile;
      }
      Ok::<_, AppError>(Control::Continue)
    })
  });

  flows.register(p);
  info!("Sign-up pipeline registered.");
}
