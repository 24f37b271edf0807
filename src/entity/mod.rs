pub mod categories;
pub mod contacts;
pub mod order_items;
pub mod orders;
pub mod product_infos;
pub mod products;
pub mod shops;
pub mod users;

pub use categories::Entity as Categories;
pub use contacts::Entity as Contacts;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_infos::Entity as ProductInfos;
pub use products::Entity as Products;
pub use shops::Entity as Shops;
pub use users::Entity as Users;
