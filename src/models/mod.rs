pub mod category;
pub mod expense;
pub mod member;
pub mod timeline;
pub mod trip;
