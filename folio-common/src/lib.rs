pub mod model;
pub mod slug;
pub mod snowflake;
pub mod util;
