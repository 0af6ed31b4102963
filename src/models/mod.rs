mod article;
mod tag;

pub use article::Article;
pub use tag::{Coordinates, Location, Topic};
