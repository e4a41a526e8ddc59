use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::OrmConn,
    dto::orders::{CheckoutRequest, CheckoutResponse, OrderItemDto, OrderList, OrderWithItems},
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::{Column as CartCol, Entity as Carts},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
            OrderStatus,
        },
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Order,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::product_service::product_from_entity,
    state::AppState,
};

/// Convert a cart snapshot into a persisted order.
///
/// Prices are read live, the payment intent is created for the rounded
/// total, and then order + items + cart clear commit in one transaction.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    if payload.items.iter().any(|item| item.quantity <= 0) {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".into(),
        ));
    }
    let required = [
        &payload.full_name,
        &payload.email,
        &payload.address,
        &payload.city,
        &payload.country,
        &payload.postal_code,
    ];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(AppError::BadRequest("Missing required field".into()));
    }

    let ids: Vec<Uuid> = payload.items.iter().map(|item| item.product_id).collect();
    let products: HashMap<Uuid, _> = Products::find()
        .filter(ProdCol::Id.is_in(ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    // All-or-nothing on product resolution: one unknown id fails the
    // whole checkout before anything is charged or written.
    let mut total = Decimal::ZERO;
    let mut lines: Vec<(Uuid, i32, Decimal)> = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        let product = products
            .get(&item.product_id)
            .ok_or_else(|| AppError::BadRequest("Product not found".into()))?;
        total += product.price * Decimal::from(item.quantity);
        lines.push((product.id, item.quantity, product.price));
    }

    let amount = crate::payments::to_minor_units(total)
        .ok_or_else(|| AppError::BadRequest("Order total out of range".into()))?;
    let intent = state
        .payments
        .create_intent(amount, "usd", user.user_id)
        .await?;

    let order = match persist_order(&state.orm, user, &payload, &lines, total, &intent.id).await {
        Ok(order) => order,
        Err(err) => {
            // The intent already exists at the processor; it is left
            // orphaned and surfaced here for out-of-band reconciliation.
            tracing::warn!(
                payment_intent_id = %intent.id,
                error = %err,
                "order persistence failed; payment intent left orphaned"
            );
            return Err(err);
        }
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "payment_intent_id": intent.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Checkout success",
        CheckoutResponse {
            order_id: order.id,
            client_secret: intent.client_secret,
        },
        Some(Meta::empty()),
    ))
}

async fn persist_order(
    orm: &OrmConn,
    user: &AuthUser,
    payload: &CheckoutRequest,
    lines: &[(Uuid, i32, Decimal)],
    total: Decimal,
    intent_id: &str,
) -> AppResult<OrderModel> {
    let txn = orm.begin().await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total: Set(total),
        status: Set(OrderStatus::Pending),
        payment_intent_id: Set(intent_id.to_string()),
        shipping_address: Set(payload.address.clone()),
        shipping_city: Set(payload.city.clone()),
        shipping_country: Set(payload.country.clone()),
        shipping_postal_code: Set(payload.postal_code.clone()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    for (product_id, quantity, price) in lines {
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(*product_id),
            quantity: Set(*quantity),
            price: Set(*price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
    }

    // clear cart
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&txn)
        .await?;
    if let Some(cart) = cart {
        CartItems::delete_many()
            .filter(CartItemCol::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    Ok(order)
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(parse_order_status(status)?));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
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

    let mut items_by_order =
        load_order_items(&state.orm, orders.iter().map(|o| o.id).collect()).await?;
    let orders = orders
        .into_iter()
        .map(|order| {
            let items = items_by_order.remove(&order.id).unwrap_or_default();
            OrderWithItems {
                order: order_from_entity(order),
                items,
            }
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let mut items_by_order = load_order_items(&state.orm, vec![order.id]).await?;
    let items = items_by_order.remove(&order.id).unwrap_or_default();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Load order lines for a set of orders, each with its live product
/// attached (None once the product has been deleted).
pub(crate) async fn load_order_items<C: ConnectionTrait>(
    conn: &C,
    order_ids: Vec<Uuid>,
) -> AppResult<HashMap<Uuid, Vec<OrderItemDto>>> {
    let mut grouped: HashMap<Uuid, Vec<OrderItemDto>> = HashMap::new();
    if order_ids.is_empty() {
        return Ok(grouped);
    }

    let rows = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids))
        .find_also_related(Products)
        .all(conn)
        .await?;

    for (item, product) in rows {
        grouped.entry(item.order_id).or_default().push(OrderItemDto {
            id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.price,
            product: product.map(product_from_entity),
        });
    }

    Ok(grouped)
}

pub(crate) fn parse_order_status(status: &str) -> AppResult<OrderStatus> {
    OrderStatus::try_from_value(&status.to_owned())
        .map_err(|_| AppError::BadRequest("Invalid order status".into()))
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        total: model.total,
        status: model.status,
        payment_intent_id: model.payment_intent_id,
        shipping_address: model.shipping_address,
        shipping_city: model.shipping_city,
        shipping_country: model.shipping_country,
        shipping_postal_code: model.shipping_postal_code,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
