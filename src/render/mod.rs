pub mod renderer;

pub use renderer::{RenderSource, SiteRenderer};
