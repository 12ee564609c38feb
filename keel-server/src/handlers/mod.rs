mod function;
mod internal_error;
mod not_found;
mod real_last;

pub use function::{handler_fn, FunctionHandler};
pub use internal_error::InternalErrorHandler;
pub use not_found::NotFoundHandler;
pub use real_last::RealLastHandler;
