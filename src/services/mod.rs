//! Service layer for the crawler.
//!
//! - Forum parsing capability (`ForumParser`, `XenForoParser`)
//! - Post extraction and rendering (`PostExtractor`)
//! - Category pagination (`CategoryPaginator`)
//! - Story resolution (`StoryResolver`)

mod extractor;
mod paginator;
mod parser;
pub mod render;
mod resolver;
mod xenforo;

pub use extractor::PostExtractor;
pub use paginator::CategoryPaginator;
pub use parser::{ForumParser, MessageFields, ReaderPage, RenderContext, StoryPage};
pub use resolver::StoryResolver;
pub use xenforo::{XenForoParser, parse_time};
