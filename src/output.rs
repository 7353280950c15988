//! Output types returned by the table finder.

use serde::{Deserialize, Serialize};

/// A table-bearing page and the annotated image saved for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Table {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Store-relative path of the persisted image, `<md5>.<ext>`.
    pub img_path: String,
}

impl Table {
    pub fn new(page_num: usize, img_path: impl Into<String>) -> Self {
        Self {
            page_num,
            img_path: img_path.into(),
        }
    }
}
