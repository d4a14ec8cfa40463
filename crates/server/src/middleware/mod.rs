pub mod model_loaders;

pub use model_loaders::{load_category_middleware, load_event_middleware};
