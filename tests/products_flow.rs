use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Statement};
use webshop_api::{
    entity::product_files::{Column as FileCol, Entity as ProductFiles},
    config::AuthConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        cart::AddToCartRequest,
        categories::CreateCategoryRequest,
        products::{CreateProductRequest, FilePayload, ImagePayload, UpdateProductRequest},
        reviews::CreateReviewRequest,
        users::RegisterRequest,
    },
    error::AppError,
    middleware::auth::MaybeUser,
    services::{cart_service, category_service, product_service, review_service, user_service},
    state::AppState,
};

// Integration flow: create a product with images, patch it (images replaced,
// category cleared on omission), freeze cart prices, then cascade-delete.
#[tokio::test]
async fn product_lifecycle_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;
    let anonymous = MaybeUser(None);

    let category = category_service::create_category(
        &state,
        CreateCategoryRequest {
            name: "Lamps".into(),
            slug: "lamps".into(),
            parent_id: None,
        },
    )
    .await?
    .data
    .unwrap();

    // Create with two images, one without alt text.
    let created = product_service::create_product(
        &state,
        &anonymous,
        CreateProductRequest {
            title: "Moon Lamp".into(),
            description: Some("A lamp shaped like the moon".into()),
            price: 2500,
            currency: None,
            stock: 5,
            material: Some("PLA".into()),
            dimensions: None,
            weight: Some(300),
            main_image_url: None,
            category_id: Some(category.id),
            images: vec![
                ImagePayload {
                    image_url: "https://cdn.example.com/moon-1.jpg".into(),
                    alt_text: Some("Moon lamp lit".into()),
                    order_index: Some(1),
                },
                ImagePayload {
                    image_url: "https://cdn.example.com/moon-2.jpg".into(),
                    alt_text: None,
                    order_index: None,
                },
            ],
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(created.product.currency, "EUR");
    assert_eq!(created.product.category_id, Some(category.id));
    assert_eq!(created.images.len(), 2);
    assert!(
        created
            .images
            .iter()
            .any(|i| i.alt_text.as_deref() == Some("Moon Lamp - Image")),
        "expected defaulted alt text on the second image"
    );

    let product_id = created.product.id;

    // Patch without category_id: the category is cleared and the image set
    // replaced with the supplied list.
    let updated = product_service::update_product(
        &state,
        &anonymous,
        product_id,
        UpdateProductRequest {
            title: Some("  Moon Lamp XL  ".into()),
            price: Some(3000),
            images: vec![ImagePayload {
                image_url: "https://cdn.example.com/moon-xl.jpg".into(),
                alt_text: None,
                order_index: Some(0),
            }],
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(updated.product.title, "Moon Lamp XL");
    assert_eq!(updated.product.price, 3000);
    assert_eq!(updated.product.category_id, None);
    assert_eq!(updated.images.len(), 1);
    assert_eq!(
        updated.images[0].image_url,
        "https://cdn.example.com/moon-xl.jpg"
    );

    // Patch with no images at all leaves the product without images.
    let updated = product_service::update_product(
        &state,
        &anonymous,
        product_id,
        UpdateProductRequest::default(),
    )
    .await?
    .data
    .unwrap();
    assert!(updated.images.is_empty());
    assert_eq!(updated.product.category_id, None);

    // Downloadable files attach individually and come back with the product.
    let model_file = product_service::add_product_file(
        &state,
        &anonymous,
        product_id,
        FilePayload {
            file_url: "https://cdn.example.com/moon.stl".into(),
            file_type: Some("stl".into()),
            downloadable: true,
        },
    )
    .await?
    .data
    .unwrap();

    let manual = product_service::add_product_file(
        &state,
        &anonymous,
        product_id,
        FilePayload {
            file_url: "https://cdn.example.com/manual.pdf".into(),
            file_type: Some("pdf".into()),
            downloadable: false,
        },
    )
    .await?
    .data
    .unwrap();

    let err = product_service::add_product_file(
        &state,
        &anonymous,
        product_id,
        FilePayload {
            file_url: "   ".into(),
            file_type: None,
            downloadable: true,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let fetched = product_service::get_product(&state, product_id)
        .await?
        .data
        .unwrap();
    assert_eq!(fetched.files.len(), 2);
    assert!(fetched.files.iter().any(|f| f.id == model_file.id && f.downloadable));

    // Per-file removal; deleting it again is a 404.
    product_service::remove_product_file(&state, &anonymous, product_id, manual.id).await?;
    let err = product_service::remove_product_file(&state, &anonymous, product_id, manual.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // Cart prices are frozen at add time.
    let user = user_service::register_user(
        &state,
        RegisterRequest {
            username: "shopper".into(),
            email: "shopper@example.com".into(),
            password: "secret123".into(),
            role: None,
            name: None,
            phone: None,
        },
    )
    .await?
    .data
    .unwrap();

    let cart_item = cart_service::add_to_cart(
        &state,
        user.id,
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart_item.price_at_add, 3000);

    product_service::update_product(
        &state,
        &anonymous,
        product_id,
        UpdateProductRequest {
            price: Some(9999),
            ..Default::default()
        },
    )
    .await?;

    let cart = cart_service::list_cart(&state, user.id).await?.data.unwrap();
    assert_eq!(cart.items[0].price_at_add, 3000);

    review_service::create_review(
        &state,
        user.id,
        product_id,
        CreateReviewRequest {
            rating: 5,
            comment: Some("Great lamp".into()),
        },
    )
    .await?;

    // Delete cascades through files, cart items, and reviews.
    product_service::delete_product(&state, &anonymous, product_id).await?;

    let files = ProductFiles::find()
        .filter(FileCol::ProductId.eq(product_id))
        .all(&state.orm)
        .await?;
    assert!(files.is_empty());

    let cart = cart_service::list_cart(&state, user.id).await?.data.unwrap();
    assert!(cart.items.is_empty());

    let reviews = review_service::list_by_user(&state, user.id)
        .await?
        .data
        .unwrap();
    assert!(reviews.items.is_empty());

    let err = product_service::get_product(&state, product_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, cart_items, reviews, product_tags, product_images, product_files, audit_logs, products, tags, categories, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    let auth = AuthConfig {
        jwt_secret: "integration-test-secret-0123456789ab".into(),
        jwt_expiration_hours: 24,
    };

    Ok(AppState { pool, orm, auth })
}
