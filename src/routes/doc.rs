use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartItemDto, CartList, UpdateCartItemRequest},
        categories::{CategoryList, CategoryWithCount, CreateCategoryRequest},
        favorites::{AddFavoriteRequest, FavoriteProductList},
        orders::{
            AdminOrderDto, AdminOrderList, CheckoutItem, CheckoutRequest, CheckoutResponse,
            OrderCustomer, OrderItemDto, OrderList, OrderWithItems,
        },
        products,
        users::{AdminUserDto, AdminUserList, UpdateProfileRequest, UserProfile},
    },
    models::{CartItem, Category, Favorite, Order, OrderItem, OrderStatus, Product, User},
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, categories, checkout, favorites, health, orders, params, profile,
        products as product_routes,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        product_routes::list_products,
        product_routes::create_product,
        product_routes::get_product,
        product_routes::update_product,
        product_routes::delete_product,
        categories::list_categories,
        categories::create_category,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        checkout::checkout,
        orders::list_orders,
        orders::get_order,
        favorites::list_favorites,
        favorites::add_favorite,
        favorites::remove_favorite,
        profile::get_profile,
        profile::update_profile,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_users
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            CartItem,
            Favorite,
            Order,
            OrderItem,
            OrderStatus,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            products::CreateProductRequest,
            products::UpdateProductRequest,
            products::ProductList,
            CreateCategoryRequest,
            CategoryWithCount,
            CategoryList,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartItemDto,
            CartList,
            AddFavoriteRequest,
            FavoriteProductList,
            CheckoutItem,
            CheckoutRequest,
            CheckoutResponse,
            OrderItemDto,
            OrderWithItems,
            OrderList,
            OrderCustomer,
            AdminOrderDto,
            AdminOrderList,
            UserProfile,
            UpdateProfileRequest,
            AdminUserDto,
            AdminUserList,
            admin::UpdateOrderStatusRequest,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<products::ProductList>,
            ApiResponse<CartList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<AdminOrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Categories", description = "Category endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Checkout", description = "Checkout endpoint"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Favorites", description = "Favorite endpoints"),
        (name = "Profile", description = "Profile endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
