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
        auth::{LoginRequest, LoginResponse},
        cart::{AddToCartRequest, CartList},
        categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
        orders::{CreateOrderRequest, OrderList, OrderWithItems, UpdateOrderRequest},
        products::{
            CreateProductRequest, FilePayload, ProductList, ProductWithAssets,
            UpdateProductRequest,
        },
        reviews::{CreateReviewRequest, ReviewList},
        tags::{CreateTagRequest, TagList, UpdateTagRequest},
        users::{RegisterRequest, UpdateUserRequest, UserList},
    },
    models::{
        CartItem, Category, Order, OrderItem, Product, ProductFile, ProductImage, Review, Tag,
        User,
    },
    response::{ApiResponse, Meta},
    routes::{
        auth, cart, categories, health, orders, params, products as product_routes, reviews,
        tags, users,
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
        users::list_users,
        users::register,
        users::get_user,
        users::get_by_username,
        users::update_user,
        users::delete_user,
        product_routes::list_products,
        product_routes::search_products,
        product_routes::list_by_category,
        product_routes::get_product,
        product_routes::create_product,
        product_routes::update_product,
        product_routes::delete_product,
        product_routes::add_file,
        product_routes::remove_file,
        cart::get_cart,
        cart::add_to_cart,
        cart::remove_from_cart,
        cart::clear_cart,
        orders::list_by_user,
        orders::list_by_status,
        orders::create_order,
        orders::update_order,
        orders::delete_order,
        reviews::list_reviews,
        reviews::list_by_product,
        reviews::list_by_user,
        reviews::create_review,
        reviews::delete_review,
        categories::list_categories,
        categories::get_category,
        categories::get_by_slug,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        tags::list_tags,
        tags::get_tag,
        tags::get_by_slug,
        tags::create_tag,
        tags::update_tag,
        tags::delete_tag,
        tags::attach_tag,
        tags::detach_tag
    ),
    components(
        schemas(
            User,
            Product,
            ProductImage,
            ProductFile,
            Category,
            Tag,
            CartItem,
            Order,
            OrderItem,
            Review,
            LoginRequest,
            LoginResponse,
            RegisterRequest,
            UpdateUserRequest,
            UserList,
            CreateProductRequest,
            UpdateProductRequest,
            FilePayload,
            ProductWithAssets,
            ProductList,
            AddToCartRequest,
            CartList,
            CreateOrderRequest,
            UpdateOrderRequest,
            OrderWithItems,
            OrderList,
            CreateReviewRequest,
            ReviewList,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CategoryList,
            CreateTagRequest,
            UpdateTagRequest,
            TagList,
            params::Pagination,
            params::ProductQuery,
            params::SearchQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductWithAssets>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<UserList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Users", description = "User endpoints"),
        (name = "Products", description = "Product endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Reviews", description = "Review endpoints"),
        (name = "Categories", description = "Category endpoints"),
        (name = "Tags", description = "Tag endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
