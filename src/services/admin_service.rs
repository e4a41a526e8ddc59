use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{AdminOrderDto, AdminOrderList, OrderCustomer},
    dto::users::{AdminUserDto, AdminUserList},
    entity::{
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Order,
    response::{ApiResponse, Meta},
    routes::admin::UpdateOrderStatusRequest,
    routes::params::{OrderListQuery, SortOrder},
    services::order_service::{load_order_items, order_from_entity, parse_order_status},
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    _user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<AdminOrderList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(parse_order_status(status)?));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let customers = load_customers(state, orders.iter().map(|o| o.user_id).collect()).await?;
    let mut items_by_order =
        load_order_items(&state.orm, orders.iter().map(|o| o.id).collect()).await?;

    let orders = orders
        .into_iter()
        .map(|order| {
            let items = items_by_order.remove(&order.id).unwrap_or_default();
            let customer = customers.get(&order.user_id).cloned().map(Into::into);
            AdminOrderDto {
                order: order_from_entity(order),
                customer,
                items,
            }
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        AdminOrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order_admin(
    state: &AppState,
    _user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<AdminOrderDto>> {
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let customers = load_customers(state, vec![order.user_id]).await?;
    let customer = customers.get(&order.user_id).cloned().map(Into::into);

    let mut items_by_order = load_order_items(&state.orm, vec![order.id]).await?;
    let items = items_by_order.remove(&order.id).unwrap_or_default();

    let data = AdminOrderDto {
        order: order_from_entity(order),
        customer,
        items,
    };
    Ok(ApiResponse::success(
        "Order found",
        data,
        Some(Meta::empty()),
    ))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    // Membership in the status set is validated; transitions are not.
    let status = parse_order_status(&payload.status)?;

    let existing = Orders::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let mut active: OrderActive = existing.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": payload.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub async fn list_users(state: &AppState, _user: &AuthUser) -> AppResult<ApiResponse<AdminUserList>> {
    let items = sqlx::query_as::<_, AdminUserDto>(
        r#"
        SELECT u.id, u.email, u.name, u.role, u.created_at,
               COUNT(o.id) AS order_count
        FROM users u
        LEFT JOIN orders o ON o.user_id = u.id
        GROUP BY u.id
        ORDER BY u.created_at DESC
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Users",
        AdminUserList { items },
        Some(Meta::empty()),
    ))
}

#[derive(Clone)]
struct Customer {
    email: String,
    name: Option<String>,
}

impl From<Customer> for OrderCustomer {
    fn from(customer: Customer) -> Self {
        OrderCustomer {
            email: customer.email,
            name: customer.name,
        }
    }
}

async fn load_customers(
    state: &AppState,
    user_ids: Vec<Uuid>,
) -> AppResult<HashMap<Uuid, Customer>> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users = Users::find()
        .filter(UserCol::Id.is_in(user_ids))
        .all(&state.orm)
        .await?;
    Ok(users
        .into_iter()
        .map(|u| {
            (
                u.id,
                Customer {
                    email: u.email,
                    name: u.name,
                },
            )
        })
        .collect())
}
