use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::UserSession;
use crate::config::LoyaltyConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    AddToCartRequest, CartLine, CartView, CheckoutRequest, CreateStoreItemRequest, ItemListQuery,
    LoyaltyTransactionType, Order, OrderDetail, OrderItem, OrderListQuery, OrderStatus, Page,
    StoreItem, UpdateCartRequest, UpdateOrderStatusRequest, UpdateStoreItemRequest,
    subtotal_cents,
};
use crate::services::loyalty_service::LoyaltyService;

const ITEM_COLUMNS: &str = "id, name, description, category, price_cents, stock_quantity, \
     image_url, is_active, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, member_id, status, subtotal_cents, discount_cents, total_cents, \
     points_redeemed, points_earned, created_at, updated_at";
const CART_SELECT: &str = "SELECT c.item_id, i.name, i.price_cents AS unit_price_cents, \
     c.quantity, i.stock_quantity, i.is_active \
     FROM cart_items c JOIN store_items i ON i.id = c.item_id";

/// Money and points for one checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub points_redeemed: i64,
    pub points_earned: i64,
}

/// Price a cart. One point is worth one cent when redeemed, and
/// `points_per_dollar` points are earned per whole dollar actually paid.
pub fn price_order(
    lines: &[CartLine],
    points_requested: i64,
    balance: i64,
    points_per_dollar: i64,
) -> AppResult<PricedOrder> {
    if points_requested < 0 {
        return Err(AppError::validation("points_to_redeem cannot be negative"));
    }
    if points_requested > balance {
        return Err(AppError::validation("Insufficient loyalty points"));
    }

    let subtotal_cents = subtotal_cents(lines)?;
    let points_redeemed = points_requested.min(subtotal_cents);
    let discount_cents = points_redeemed;
    let total_cents = subtotal_cents - discount_cents;
    let points_earned = (total_cents / 100) * points_per_dollar;

    Ok(PricedOrder {
        subtotal_cents,
        discount_cents,
        total_cents,
        points_redeemed,
        points_earned,
    })
}

#[derive(Clone)]
pub struct StoreService {
    db: PgPool,
    loyalty: LoyaltyConfig,
}

impl StoreService {
    pub fn new(db: PgPool, loyalty: LoyaltyConfig) -> Self {
        Self { db, loyalty }
    }

    // Catalogue

    pub async fn list_items(&self, query: &ItemListQuery) -> AppResult<Vec<StoreItem>> {
        let page = Page::from_params(query.limit, query.offset)?;

        let items = sqlx::query_as::<_, StoreItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM store_items
             WHERE is_active AND ($1::text IS NULL OR category = $1)
             ORDER BY category, name
             LIMIT $2 OFFSET $3"
        ))
        .bind(&query.category)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    pub async fn get_item(&self, item_id: Uuid) -> AppResult<StoreItem> {
        sqlx::query_as::<_, StoreItem>(&format!("SELECT {ITEM_COLUMNS} FROM store_items WHERE id = $1"))
            .bind(item_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Store item {item_id} not found")))
    }

    pub async fn create_item(&self, request: CreateStoreItemRequest) -> AppResult<StoreItem> {
        request.validate()?;

        let item = sqlx::query_as::<_, StoreItem>(&format!(
            "INSERT INTO store_items (name, description, category, price_cents, stock_quantity, image_url)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(request.name.trim())
        .bind(&request.description)
        .bind(request.category.trim())
        .bind(request.price_cents)
        .bind(request.stock_quantity)
        .bind(&request.image_url)
        .fetch_one(&self.db)
        .await?;

        info!(item_id = %item.id, name = %item.name, "created store item");
        Ok(item)
    }

    pub async fn update_item(&self, item_id: Uuid, request: UpdateStoreItemRequest) -> AppResult<StoreItem> {
        request.validate()?;

        sqlx::query_as::<_, StoreItem>(&format!(
            "UPDATE store_items
             SET name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 category = COALESCE($4, category),
                 price_cents = COALESCE($5, price_cents),
                 stock_quantity = COALESCE($6, stock_quantity),
                 image_url = COALESCE($7, image_url),
                 is_active = COALESCE($8, is_active),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(item_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.description)
        .bind(request.category.as_deref().map(str::trim))
        .bind(request.price_cents)
        .bind(request.stock_quantity)
        .bind(&request.image_url)
        .bind(request.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Store item {item_id} not found")))
    }

    pub async fn deactivate_item(&self, item_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("UPDATE store_items SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(item_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Store item {item_id} not found")));
        }
        Ok(())
    }

    // Cart

    pub async fn cart(&self, member_id: Uuid) -> AppResult<CartView> {
        let lines = sqlx::query_as::<_, CartLine>(&format!(
            "{CART_SELECT} WHERE c.member_id = $1 ORDER BY c.created_at"
        ))
        .bind(member_id)
        .fetch_all(&self.db)
        .await?;

        CartView::new(lines)
    }

    pub async fn add_to_cart(&self, member_id: Uuid, request: AddToCartRequest) -> AppResult<CartView> {
        request.validate()?;

        let item = self.get_item(request.item_id).await?;
        if !item.is_active {
            return Err(AppError::validation(format!("{} is not available", item.name)));
        }

        let in_cart: i32 = sqlx::query_scalar(
            "SELECT quantity FROM cart_items WHERE member_id = $1 AND item_id = $2",
        )
        .bind(member_id)
        .bind(item.id)
        .fetch_optional(&self.db)
        .await?
        .unwrap_or(0);

        if in_cart + request.quantity > item.stock_quantity {
            return Err(AppError::conflict(format!(
                "Only {} of {} in stock",
                item.stock_quantity, item.name
            )));
        }

        sqlx::query(
            "INSERT INTO cart_items (member_id, item_id, quantity)
             VALUES ($1, $2, $3)
             ON CONFLICT (member_id, item_id)
             DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW()",
        )
        .bind(member_id)
        .bind(item.id)
        .bind(request.quantity)
        .execute(&self.db)
        .await?;

        self.cart(member_id).await
    }

    pub async fn update_cart_line(
        &self,
        member_id: Uuid,
        item_id: Uuid,
        request: UpdateCartRequest,
    ) -> AppResult<CartView> {
        request.validate()?;

        if request.quantity == 0 {
            return self.remove_from_cart(member_id, item_id).await;
        }

        let item = self.get_item(item_id).await?;
        if request.quantity > item.stock_quantity {
            return Err(AppError::conflict(format!(
                "Only {} of {} in stock",
                item.stock_quantity, item.name
            )));
        }

        let result = sqlx::query(
            "UPDATE cart_items SET quantity = $3, updated_at = NOW()
             WHERE member_id = $1 AND item_id = $2",
        )
        .bind(member_id)
        .bind(item_id)
        .bind(request.quantity)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Item is not in your cart"));
        }

        self.cart(member_id).await
    }

    pub async fn remove_from_cart(&self, member_id: Uuid, item_id: Uuid) -> AppResult<CartView> {
        let result = sqlx::query("DELETE FROM cart_items WHERE member_id = $1 AND item_id = $2")
            .bind(member_id)
            .bind(item_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Item is not in your cart"));
        }

        self.cart(member_id).await
    }

    // Orders

    /// Turn the cart into an order in one transaction
    pub async fn checkout(&self, member_id: Uuid, request: CheckoutRequest) -> AppResult<OrderDetail> {
        let mut tx = self.db.begin().await?;

        let lines = sqlx::query_as::<_, CartLine>(&format!(
            "{CART_SELECT} WHERE c.member_id = $1 ORDER BY c.item_id FOR UPDATE OF i"
        ))
        .bind(member_id)
        .fetch_all(&mut *tx)
        .await?;

        if lines.is_empty() {
            return Err(AppError::validation("Cart is empty"));
        }

        for line in &lines {
            if !line.is_active {
                return Err(AppError::conflict(format!("{} is no longer available", line.name)));
            }
            if line.quantity > line.stock_quantity {
                return Err(AppError::conflict(format!(
                    "Not enough stock for {} (requested {}, available {})",
                    line.name, line.quantity, line.stock_quantity
                )));
            }
        }

        let balance: i64 = sqlx::query_scalar(
            "SELECT loyalty_points FROM member_profiles WHERE user_id = $1 FOR UPDATE",
        )
        .bind(member_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Member profile not found"))?;

        let priced = price_order(
            &lines,
            request.points_to_redeem.unwrap_or(0),
            balance,
            self.loyalty.points_per_dollar,
        )?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders
                (member_id, subtotal_cents, discount_cents, total_cents, points_redeemed, points_earned)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(member_id)
        .bind(priced.subtotal_cents)
        .bind(priced.discount_cents)
        .bind(priced.total_cents)
        .bind(priced.points_redeemed)
        .bind(priced.points_earned)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = sqlx::query_as::<_, OrderItem>(
                "INSERT INTO order_items
                    (order_id, item_id, item_name, unit_price_cents, quantity, line_total_cents)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING id, order_id, item_id, item_name, unit_price_cents, quantity, line_total_cents",
            )
            .bind(order.id)
            .bind(line.item_id)
            .bind(&line.name)
            .bind(line.unit_price_cents)
            .bind(line.quantity)
            .bind(line.line_total_cents()?)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);

            sqlx::query(
                "UPDATE store_items SET stock_quantity = stock_quantity - $2, updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(line.item_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        if priced.points_redeemed > 0 {
            LoyaltyService::record(
                &mut *tx,
                member_id,
                -priced.points_redeemed,
                LoyaltyTransactionType::Redeemed,
                "Redeemed at store checkout",
                Some(order.id),
            )
            .await?;
        }
        if priced.points_earned > 0 {
            LoyaltyService::record(
                &mut *tx,
                member_id,
                priced.points_earned,
                LoyaltyTransactionType::Earned,
                "Store purchase",
                Some(order.id),
            )
            .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE member_id = $1")
            .bind(member_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            total_cents = order.total_cents,
            points_redeemed = order.points_redeemed,
            points_earned = order.points_earned,
            "order placed"
        );

        Ok(OrderDetail { order, items })
    }

    pub async fn member_orders(&self, member_id: Uuid) -> AppResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE member_id = $1 ORDER BY created_at DESC"
        ))
        .bind(member_id)
        .fetch_all(&self.db)
        .await?;

        Ok(orders)
    }

    pub async fn list_orders(&self, query: &OrderListQuery) -> AppResult<Vec<Order>> {
        let page = Page::from_params(query.limit, query.offset)?;

        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE ($1::order_status IS NULL OR status = $1)
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(query.status)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(orders)
    }

    pub async fn get_order(&self, actor: &UserSession, order_id: Uuid) -> AppResult<OrderDetail> {
        let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

        if order.member_id != actor.user_id && !actor.is_admin() {
            return Err(AppError::forbidden("You cannot view this order"));
        }

        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, item_id, item_name, unit_price_cents, quantity, line_total_cents
             FROM order_items WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        Ok(OrderDetail { order, items })
    }

    /// Move an order along its lifecycle; cancelling restores stock and points
    pub async fn update_status(&self, order_id: Uuid, request: UpdateOrderStatusRequest) -> AppResult<Order> {
        let mut tx = self.db.begin().await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

        order.status.ensure_transition(request.status)?;

        if request.status == OrderStatus::Cancelled {
            sqlx::query(
                "UPDATE store_items i
                 SET stock_quantity = i.stock_quantity + oi.quantity, updated_at = NOW()
                 FROM order_items oi
                 WHERE oi.order_id = $1 AND oi.item_id = i.id",
            )
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

            if order.points_redeemed > 0 {
                LoyaltyService::record(
                    &mut *tx,
                    order.member_id,
                    order.points_redeemed,
                    LoyaltyTransactionType::Adjusted,
                    "Refund for cancelled order",
                    Some(order.id),
                )
                .await?;
            }
            if order.points_earned > 0 {
                LoyaltyService::debit_capped(
                    &mut *tx,
                    order.member_id,
                    order.points_earned,
                    "Reversal for cancelled order",
                    Some(order.id),
                )
                .await?;
            }
        }

        let updated = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET status = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(request.status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(order_id = %order_id, from = ?order.status, to = ?updated.status, "order status changed");
        Ok(updated)
    }
}
