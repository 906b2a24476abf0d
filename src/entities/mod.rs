pub mod address;
pub mod cart;
pub mod cart_item;
pub mod category;
pub mod contact_message;
pub mod content_page;
pub mod coupon;
pub mod notification_log;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod product;
pub mod product_size;
pub mod review;
pub mod setting;
pub mod user;

// Re-export entities
pub use address::{Entity as Address, Model as AddressModel};
pub use cart::{CartStatus, Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use category::{Entity as Category, Model as CategoryModel};
pub use contact_message::{Entity as ContactMessage, Model as ContactMessageModel};
pub use content_page::{Entity as ContentPage, Model as ContentPageModel};
pub use coupon::{CouponType, Entity as Coupon, Model as CouponModel};
pub use notification_log::{
    Entity as NotificationLog, Model as NotificationLogModel, NotificationChannelKind,
    NotificationStatus,
};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, PaymentMethod, PaymentStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use payment::{Entity as Payment, GatewayPaymentStatus, Model as PaymentModel};
pub use product::{Entity as Product, Gender, Model as ProductModel};
pub use product_size::{Entity as ProductSize, Model as ProductSizeModel};
pub use review::{Entity as Review, Model as ReviewModel};
pub use setting::{Entity as Setting, Model as SettingModel};
pub use user::{Entity as User, Model as UserModel, UserRole};
