//! Wire messages exchanged with clients.

pub mod notification;
pub mod upload;

pub use notification::{CLIPBOARD_TYPE, FileNotification};
pub use upload::{UploadHeader, UploadReceipt};
