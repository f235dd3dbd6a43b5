/// Storefront entities module
pub mod cart_item;
pub mod customer;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;

// Re-export entities
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use customer::{Entity as Customer, Model as CustomerModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use payment::{Entity as Payment, Model as PaymentModel};
pub use product::{Entity as Product, Model as ProductModel};
