pub mod feed;
pub mod folder;
pub mod item;
pub mod tree;
pub mod user;

pub use feed::Feed;
pub use folder::Folder;
pub use item::{Item, MarkAction, ReducedItem};
pub use tree::TreeNode;
pub use user::User;
