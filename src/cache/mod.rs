pub mod reply_cache;

pub use reply_cache::ReplyCache;
