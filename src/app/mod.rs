pub mod context;
pub mod factory;

pub use context::AppContext;
pub use factory::AppFactory;
