pub mod audit_logs;
pub mod cart_items;
pub mod categories;
pub mod order_items;
pub mod orders;
pub mod product_files;
pub mod product_images;
pub mod product_tags;
pub mod products;
pub mod reviews;
pub mod tags;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use categories::Entity as Categories;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_files::Entity as ProductFiles;
pub use product_images::Entity as ProductImages;
pub use product_tags::Entity as ProductTags;
pub use products::Entity as Products;
pub use reviews::Entity as Reviews;
pub use tags::Entity as Tags;
pub use users::Entity as Users;
