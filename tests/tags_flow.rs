use sea_orm::{ConnectionTrait, Statement};
use webshop_api::{
    config::AuthConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{products::CreateProductRequest, tags::CreateTagRequest},
    error::AppError,
    middleware::auth::MaybeUser,
    services::{product_service, tag_service},
    state::AppState,
};

// Integration flow: tag slugs are unique, attach is idempotent, detach of a
// missing association is a 404.
#[tokio::test]
async fn tag_attach_detach_flow() -> anyhow::Result<()> {
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

    let tag = tag_service::create_tag(
        &state,
        CreateTagRequest {
            name: "Glow".into(),
            slug: "glow".into(),
        },
    )
    .await?
    .data
    .unwrap();

    let err = tag_service::create_tag(
        &state,
        CreateTagRequest {
            name: "Glow again".into(),
            slug: "glow".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let found = tag_service::get_tag_by_slug(&state, "glow")
        .await?
        .data
        .unwrap();
    assert_eq!(found.id, tag.id);

    let product = product_service::create_product(
        &state,
        &MaybeUser(None),
        CreateProductRequest {
            title: "Night Light".into(),
            description: None,
            price: 1500,
            currency: None,
            stock: 3,
            material: None,
            dimensions: None,
            weight: None,
            main_image_url: None,
            category_id: None,
            images: vec![],
        },
    )
    .await?
    .data
    .unwrap();

    tag_service::attach_tag(&state, product.product.id, tag.id).await?;
    // Attaching twice is a no-op, not an error.
    tag_service::attach_tag(&state, product.product.id, tag.id).await?;

    tag_service::detach_tag(&state, product.product.id, tag.id).await?;
    let err = tag_service::detach_tag(&state, product.product.id, tag.id)
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
